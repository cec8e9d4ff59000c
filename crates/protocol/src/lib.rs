//! Client-server protocol shapes the bridge core reads and writes.
//!
//! Only the fields the identity proxy and the upgrade handler act on are
//! modelled here; everything else in an event's content is carried as raw
//! JSON.

pub mod events;
pub mod power_levels;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use {
    events::{BridgeErrorReason, MemberContent, Membership, RoomEvent, TombstoneContent},
    power_levels::PowerLevels,
};

// ── Event types ──────────────────────────────────────────────────────────────

pub mod event_type {
    pub const MEMBER: &str = "m.room.member";
    pub const POWER_LEVELS: &str = "m.room.power_levels";
    pub const TOPIC: &str = "m.room.topic";
    pub const NAME: &str = "m.room.name";
    pub const AVATAR: &str = "m.room.avatar";
    pub const TOMBSTONE: &str = "m.room.tombstone";
    pub const MESSAGE: &str = "m.room.message";
    /// Unstable (MSC2162) bridge error notice.
    pub const BRIDGE_ERROR: &str = "de.nasnotfound.bridge_error";
}

/// Relation type used to point a bridge error at the event it concerns.
pub const REL_TYPE_REFERENCE: &str = "m.reference";

// ── Identifiers ──────────────────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// A room id such as `!abc:example.org`.
    RoomId
);
string_id!(
    /// A fully-qualified user id such as `@alice:example.org`.
    UserId
);
string_id!(
    /// A server-assigned event id.
    EventId
);

impl RoomId {
    /// The server part of the id, used as a `via` hint when joining.
    pub fn server_name(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, server)| server)
    }
}

impl UserId {
    pub fn localpart(&self) -> &str {
        let without_sigil = self.0.strip_prefix('@').unwrap_or(&self.0);
        without_sigil
            .split_once(':')
            .map_or(without_sigil, |(local, _)| local)
    }
}

// ── Error codes ──────────────────────────────────────────────────────────────

/// Machine-readable error code returned by the homeserver.
///
/// Only [`ErrorCode::Forbidden`] drives recovery; the other named codes exist
/// so callers can match on them without comparing strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Forbidden,
    UserInUse,
    NotFound,
    LimitExceeded,
    Unknown,
    Other(String),
}

impl ErrorCode {
    pub fn from_errcode(code: &str) -> Self {
        match code {
            "M_FORBIDDEN" => Self::Forbidden,
            "M_USER_IN_USE" => Self::UserInUse,
            "M_NOT_FOUND" => Self::NotFound,
            "M_LIMIT_EXCEEDED" => Self::LimitExceeded,
            "M_UNKNOWN" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Forbidden => "M_FORBIDDEN",
            Self::UserInUse => "M_USER_IN_USE",
            Self::NotFound => "M_NOT_FOUND",
            Self::LimitExceeded => "M_LIMIT_EXCEEDED",
            Self::Unknown => "M_UNKNOWN",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_errcode(&code))
    }
}

/// A failed call against the homeserver, as seen by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{errcode}: {error}")]
pub struct RemoteError {
    pub errcode: ErrorCode,
    #[serde(default)]
    pub error: String,
}

impl RemoteError {
    pub fn new(errcode: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            errcode,
            error: error.into(),
        }
    }

    pub fn forbidden(error: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, error)
    }

    pub fn is_forbidden(&self) -> bool {
        self.errcode == ErrorCode::Forbidden
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {rstest::rstest, serde_json::json};

    use super::*;

    #[rstest]
    #[case("M_FORBIDDEN", ErrorCode::Forbidden)]
    #[case("M_USER_IN_USE", ErrorCode::UserInUse)]
    #[case("M_NOT_FOUND", ErrorCode::NotFound)]
    #[case("M_LIMIT_EXCEEDED", ErrorCode::LimitExceeded)]
    #[case("M_UNKNOWN", ErrorCode::Unknown)]
    #[case("M_YOU_ARE_A_FISH", ErrorCode::Other("M_YOU_ARE_A_FISH".into()))]
    fn errcode_parsing(#[case] raw: &str, #[case] expected: ErrorCode) {
        let code = ErrorCode::from_errcode(raw);
        assert_eq!(code, expected);
        assert_eq!(code.as_str(), raw);
    }

    #[test]
    fn remote_error_from_wire_body() {
        let err: RemoteError =
            serde_json::from_value(json!({"errcode": "M_FORBIDDEN", "error": "Join first"}))
                .unwrap();
        assert!(err.is_forbidden());
        assert_eq!(err.to_string(), "M_FORBIDDEN: Join first");
    }

    #[test]
    fn remote_error_without_message() {
        let err: RemoteError = serde_json::from_value(json!({"errcode": "M_WHOOPSIE"})).unwrap();
        assert!(!err.is_forbidden());
        assert_eq!(err.error, "");
    }

    #[test]
    fn room_server_name() {
        assert_eq!(RoomId::from("!abc:def").server_name(), Some("def"));
        assert_eq!(
            RoomId::from("!abc:example.org:8448").server_name(),
            Some("example.org:8448")
        );
        assert_eq!(RoomId::from("!nocolon").server_name(), None);
    }

    #[test]
    fn user_localpart() {
        assert_eq!(UserId::from("@alice:bar").localpart(), "alice");
        assert_eq!(UserId::from("@_irc_bob:example.org").localpart(), "_irc_bob");
        assert_eq!(UserId::from("carol").localpart(), "carol");
    }
}
