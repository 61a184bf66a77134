//! In-memory identity/message directory.
//!
//! Backs the CLI and tests. A real bridge implements the ports over its
//! database instead.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        EventId, Identity, MessageLocation, RoomId, SpaceId, TgMessageId, TgUserId, UserMxid,
    },
    errors::Error,
    ports::{CrossNetworkMessageIndex, IdentityResolver},
    Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub users: Vec<Identity>,
    #[serde(default)]
    pub messages: Vec<MessageLocation>,
}

impl Directory {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "directory file does not exist".to_string(),
            });
        }
        let contents = fs::read_to_string(path)?;
        let dir = Self::from_json(&contents)?;
        tracing::info!(
            path = %path.display(),
            users = dir.users.len(),
            messages = dir.messages.len(),
            "loaded directory"
        );
        Ok(dir)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn find_user(&self, pred: impl Fn(&Identity) -> bool) -> Option<Identity> {
        self.users.iter().find(|u| pred(u)).cloned()
    }
}

impl IdentityResolver for Directory {
    fn by_profile_link(&self, mxid: &UserMxid) -> Option<Identity> {
        self.find_user(|u| u.matrix_id.as_ref() == Some(mxid))
    }

    fn by_handle(&self, handle: &str) -> Option<Identity> {
        // Telegram usernames are case-insensitive.
        self.find_user(|u| {
            u.username
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(handle))
        })
    }

    fn by_native_user_id(&self, id: TgUserId) -> Option<Identity> {
        self.find_user(|u| u.telegram_id == Some(id))
    }
}

impl CrossNetworkMessageIndex for Directory {
    fn lookup(&self, id: TgMessageId, space: SpaceId) -> Option<MessageLocation> {
        self.messages
            .iter()
            .find(|m| m.telegram_id == id && m.space == space)
            .cloned()
    }

    fn lookup_matrix(
        &self,
        event_id: &EventId,
        space: SpaceId,
        room_id: &RoomId,
    ) -> Option<MessageLocation> {
        self.messages
            .iter()
            .find(|m| &m.event_id == event_id && m.space == space && &m.room_id == room_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "users": [
            {"matrix_id": "@alice:example.org", "telegram_id": 10, "username": "Alice_TG"},
            {"matrix_id": "@bob:example.org", "display_name": "Bob"}
        ],
        "messages": [
            {"telegram_id": 5, "space": 100, "room_id": "!room:example.org", "event_id": "$ev5"},
            {"telegram_id": 5, "space": 200, "room_id": "!other:example.org", "event_id": "$ev5b"}
        ]
    }"#;

    #[test]
    fn resolves_users_by_every_key() {
        let dir = Directory::from_json(SAMPLE).unwrap();
        let alice = dir.by_handle("alice_tg").unwrap();
        assert_eq!(alice.telegram_id, Some(TgUserId(10)));
        assert_eq!(dir.by_native_user_id(TgUserId(10)), Some(alice.clone()));
        assert_eq!(
            dir.by_profile_link(&UserMxid("@alice:example.org".to_string())),
            Some(alice)
        );
        assert_eq!(
            dir.by_profile_link(&UserMxid("@bob:example.org".to_string()))
                .and_then(|b| b.display_name),
            Some("Bob".to_string())
        );
        assert_eq!(dir.by_handle("bob"), None);
    }

    #[test]
    fn message_lookup_respects_space() {
        let dir = Directory::from_json(SAMPLE).unwrap();
        let loc = dir.lookup(TgMessageId(5), SpaceId(200)).unwrap();
        assert_eq!(loc.event_id, EventId("$ev5b".to_string()));
        assert_eq!(dir.lookup(TgMessageId(5), SpaceId(300)), None);

        let back = dir
            .lookup_matrix(
                &EventId("$ev5".to_string()),
                SpaceId(100),
                &RoomId("!room:example.org".to_string()),
            )
            .unwrap();
        assert_eq!(back.telegram_id, TgMessageId(5));
        assert_eq!(
            dir.lookup_matrix(
                &EventId("$ev5".to_string()),
                SpaceId(100),
                &RoomId("!other:example.org".to_string()),
            ),
            None
        );
    }

    #[test]
    fn missing_file_is_invalid_path() {
        let err = Directory::load(Path::new("/nonexistent/mxtg-directory.json")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }
}
