use thiserror::Error;

use ghostbridge_protocol::RoomId;

#[derive(Debug, Error)]
pub enum Error {
    /// Joining the replacement room failed for a reason waiting for an
    /// invite will not fix. The upgrade is abandoned.
    #[error("Failed to handle upgrade")]
    UpgradeFailed {
        old_room_id: RoomId,
        new_room_id: RoomId,
        #[source]
        source: ghostbridge_intent::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
