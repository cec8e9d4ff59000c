use async_trait::async_trait;

use ghostbridge_protocol::{EventId, PowerLevels, RemoteError, RoomId, UserId};

pub type ClientResult<T> = Result<T, RemoteError>;

/// Homeserver operations available to a single identity.
///
/// The bridge supplies the concrete HTTP implementation; the identity proxy
/// only ever talks to this trait.
#[async_trait]
pub trait MatrixClient: Send + Sync {
    /// The identity every call is made as.
    fn user_id(&self) -> &UserId;

    /// Register `user_id` in the application service's namespace.
    async fn register_user(&self, user_id: &UserId) -> ClientResult<()>;

    /// Join `room_id`, optionally routing through the `via` servers.
    async fn join_room(&self, room_id: &RoomId, via: &[String]) -> ClientResult<RoomId>;

    async fn invite(&self, room_id: &RoomId, user_id: &UserId) -> ClientResult<()>;

    async fn leave(&self, room_id: &RoomId) -> ClientResult<()>;

    async fn kick(&self, room_id: &RoomId, user_id: &UserId, reason: Option<&str>)
    -> ClientResult<()>;

    async fn ban(&self, room_id: &RoomId, user_id: &UserId, reason: Option<&str>)
    -> ClientResult<()>;

    async fn unban(&self, room_id: &RoomId, user_id: &UserId) -> ClientResult<()>;

    /// Set `user_id`'s level to `level`, writing a modified copy of `current`.
    async fn set_power_level(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        level: i64,
        current: &PowerLevels,
    ) -> ClientResult<()>;

    async fn get_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> ClientResult<serde_json::Value>;

    async fn send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &serde_json::Value,
    ) -> ClientResult<EventId>;

    async fn send_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: &serde_json::Value,
    ) -> ClientResult<EventId>;

    async fn send_typing(
        &self,
        room_id: &RoomId,
        typing: bool,
        timeout_ms: Option<u64>,
    ) -> ClientResult<()>;

    /// Set the global display name of this identity.
    async fn set_display_name(&self, name: &str) -> ClientResult<()>;

    /// Set the global avatar of this identity to an `mxc://` URL.
    async fn set_avatar_url(&self, url: &str) -> ClientResult<()>;
}
