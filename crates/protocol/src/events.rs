use serde::{Deserialize, Serialize};

use crate::{EventId, REL_TYPE_REFERENCE, RoomId, UserId, event_type};

/// An event as delivered to the bridge by the homeserver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserId>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

impl RoomEvent {
    pub fn is_state(&self) -> bool {
        self.state_key.is_some()
    }

    /// Decode the content of an `m.room.member` event.
    ///
    /// Returns `None` for other event types or unparseable content.
    pub fn member_content(&self) -> Option<MemberContent> {
        if self.event_type != event_type::MEMBER {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }

    /// Decode the content of an `m.room.tombstone` event.
    pub fn tombstone_content(&self) -> Option<TombstoneContent> {
        if self.event_type != event_type::TOMBSTONE {
            return None;
        }
        serde_json::from_value(self.content.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Invite,
    Leave,
    Ban,
    Knock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberContent {
    pub membership: Membership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneContent {
    pub replacement_room: RoomId,
    #[serde(default)]
    pub body: String,
}

/// Reason codes for the unstable bridge error notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeErrorReason {
    #[serde(rename = "m.event_not_handled")]
    EventNotHandled,
    #[serde(rename = "m.event_too_old")]
    EventTooOld,
    #[serde(rename = "m.internal_error")]
    InternalError,
    #[serde(rename = "m.foreign_network_error")]
    ForeignNetworkError,
    #[serde(rename = "m.event_unknown")]
    EventUnknown,
}

/// Build the content of a bridge error notice referencing `event_id`.
///
/// `affected_users` may hold literal user ids or regex patterns matching
/// the bridge's ghost namespace.
pub fn bridge_error_content(
    event_id: &EventId,
    network_name: &str,
    reason: BridgeErrorReason,
    affected_users: &[String],
) -> serde_json::Value {
    serde_json::json!({
        "network_name": network_name,
        "reason": reason,
        "affected_users": affected_users,
        "m.relates_to": {
            "rel_type": REL_TYPE_REFERENCE,
            "event_id": event_id,
        },
    })
}
