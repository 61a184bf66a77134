use serde::{Deserialize, Serialize};

use crate::formatting::spans::SpanTable;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TgUserId(pub i64);

/// Telegram message id (numeric, only unique within a [`SpaceId`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TgMessageId(pub i32);

/// Telegram message-id space.
///
/// Channels and supergroups number their messages per channel; private chats
/// and basic groups share one numbering per account. The space is the channel
/// id for the former and the bridged account's user id for the latter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub i64);

/// Matrix user id (`@localpart:server`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserMxid(pub String);

/// Matrix room id (`!opaque:server`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// Matrix event id (`$opaque`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl std::fmt::Display for UserMxid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user's cross-network profile.
///
/// Real Matrix users logged into Telegram and Telegram puppets both end up
/// here; either side may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub matrix_id: Option<UserMxid>,
    #[serde(default)]
    pub telegram_id: Option<TgUserId>,
    /// Public Telegram username, without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Where a bridged message lives on both networks. Never mutated once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLocation {
    pub telegram_id: TgMessageId,
    pub space: SpaceId,
    pub room_id: RoomId,
    pub event_id: EventId,
}

/// `m.relates_to` content of a Matrix event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatesTo {
    #[serde(rename = "m.in_reply_to", default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<InReplyTo>,
}

impl RelatesTo {
    pub fn is_empty(&self) -> bool {
        self.in_reply_to.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InReplyTo {
    pub event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

/// Format identifier Matrix uses for HTML bodies.
pub const MATRIX_HTML_FORMAT: &str = "org.matrix.custom.html";

/// The subset of an `m.room.message` content the bridge reads and writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixContent {
    #[serde(default)]
    pub msgtype: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
    #[serde(
        rename = "m.relates_to",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relates_to: Option<RelatesTo>,
}

impl MatrixContent {
    pub fn html(&self) -> Option<&str> {
        match (&self.format, &self.formatted_body) {
            (Some(format), Some(html)) if format == MATRIX_HTML_FORMAT => Some(html),
            _ => None,
        }
    }
}

/// A Matrix event fetched back from the homeserver (for reply quoting).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEvent {
    pub sender: UserMxid,
    pub content: MatrixContent,
}

/// Who a forwarded Telegram message originally came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOrigin {
    User(TgUserId),
    /// The original author hides their account; Telegram only keeps a name.
    HiddenUser(String),
    /// Forwarded from a channel; carries the channel title.
    Channel(String),
}

/// Whether a reply is a plain reply or an edit rendered as a reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyKind {
    #[default]
    Reply,
    Edit,
}

/// An incoming Telegram message, reduced to what the formatter needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramMessage {
    pub id: TgMessageId,
    /// Message-id space this message (and the one it replies to) lives in.
    pub space: SpaceId,
    pub text: String,
    pub entities: SpanTable,
    pub forward_from: Option<ForwardOrigin>,
    pub reply_to: Option<TgMessageId>,
    /// Signature of an anonymous channel post.
    pub post_author: Option<String>,
}

impl TelegramMessage {
    pub fn plain(id: TgMessageId, space: SpaceId, text: impl Into<String>) -> Self {
        Self {
            id,
            space,
            text: text.into(),
            entities: SpanTable::new(),
            forward_from: None,
            reply_to: None,
            post_author: None,
        }
    }
}

/// Result of converting a Telegram message for Matrix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionResult {
    pub body: String,
    pub formatted_body: Option<String>,
    pub relates_to: RelatesTo,
}

impl ConversionResult {
    /// Build the Matrix `m.text` content for this result.
    pub fn into_content(self) -> MatrixContent {
        let format = self
            .formatted_body
            .as_ref()
            .map(|_| MATRIX_HTML_FORMAT.to_string());
        MatrixContent {
            msgtype: Some("m.text".to_string()),
            body: self.body,
            format,
            formatted_body: self.formatted_body,
            relates_to: (!self.relates_to.is_empty()).then_some(self.relates_to),
        }
    }
}

/// A Matrix message converted for Telegram.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutgoingTelegram {
    pub text: String,
    pub entities: SpanTable,
    pub reply_to: Option<TgMessageId>,
}
