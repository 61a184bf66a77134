//! Collaborator ports.
//!
//! Persistence and the network clients live outside this crate; the formatter
//! only sees them through these traits.

use async_trait::async_trait;

use crate::{
    domain::{
        EventId, Identity, MessageLocation, RemoteEvent, RoomId, SpaceId, TgMessageId, TgUserId,
        UserMxid,
    },
    Result,
};

/// Read-mostly lookup of cross-network user profiles.
pub trait IdentityResolver: Send + Sync {
    /// Resolve the Matrix user a `matrix.to` profile link points at.
    fn by_profile_link(&self, mxid: &UserMxid) -> Option<Identity>;

    /// Resolve a Telegram username (without `@`).
    fn by_handle(&self, handle: &str) -> Option<Identity>;

    fn by_native_user_id(&self, id: TgUserId) -> Option<Identity>;
}

/// Maps messages on one network to their bridged counterpart.
pub trait CrossNetworkMessageIndex: Send + Sync {
    fn lookup(&self, id: TgMessageId, space: SpaceId) -> Option<MessageLocation>;

    fn lookup_matrix(
        &self,
        event_id: &EventId,
        space: SpaceId,
        room_id: &RoomId,
    ) -> Option<MessageLocation>;
}

/// Fetches an already-bridged Matrix event back from the homeserver.
#[async_trait]
pub trait RemoteEventFetcher: Send + Sync {
    async fn fetch_event(&self, location: &MessageLocation) -> Result<RemoteEvent>;
}

/// Live profile lookup on the Telegram side, used when no local identity exists.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_display_name(&self, id: TgUserId) -> Result<Option<String>>;
}
