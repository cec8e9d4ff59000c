use thiserror::Error;

use ghostbridge_protocol::{ErrorCode, RemoteError, RoomId, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The user lacks the level for an event and the bot cannot grant it.
    #[error(
        "cannot ensure {user_id} has power level {required} for {event_type} in {room_id}: \
         user has {user_level}, bot has {bot_level}"
    )]
    InsufficientPower {
        room_id: RoomId,
        user_id: UserId,
        event_type: String,
        required: i64,
        user_level: i64,
        bot_level: i64,
    },

    /// The bot tried to raise the user's power level and was refused.
    #[error("failed to raise power level of {user_id} in {room_id}: {source}")]
    PowerLevelChange {
        room_id: RoomId,
        user_id: UserId,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    /// Code of the remote failure that ended the operation, if any.
    pub fn errcode(&self) -> Option<&ErrorCode> {
        match self {
            Self::Remote(e) => Some(&e.errcode),
            Self::PowerLevelChange { source, .. } => Some(&source.errcode),
            Self::InsufficientPower { .. } | Self::SerdeJson(_) => None,
        }
    }

    /// True only when the proxied user itself was refused with `M_FORBIDDEN`.
    ///
    /// A refused power change is the bot's failure and does not count.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_forbidden())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
