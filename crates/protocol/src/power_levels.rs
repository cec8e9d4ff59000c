use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Content of an `m.room.power_levels` state event.
///
/// The event is a complete snapshot, so a cached copy is always replaced
/// wholesale. Keys the bridge does not act on are kept in `extra` so that a
/// modified copy can be written back without dropping them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerLevels {
    pub ban: i64,
    pub invite: i64,
    pub kick: i64,
    pub redact: i64,
    pub events: BTreeMap<String, i64>,
    pub events_default: i64,
    pub state_default: i64,
    pub users: BTreeMap<UserId, i64>,
    pub users_default: i64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for PowerLevels {
    fn default() -> Self {
        Self {
            ban: 50,
            invite: 0,
            kick: 50,
            redact: 50,
            events: BTreeMap::new(),
            events_default: 0,
            state_default: 50,
            users: BTreeMap::new(),
            users_default: 0,
            extra: serde_json::Map::new(),
        }
    }
}

impl PowerLevels {
    pub fn from_content(content: &serde_json::Value) -> serde_json::Result<Self> {
        Self::deserialize(content)
    }

    pub fn to_content(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn user_level(&self, user_id: &UserId) -> i64 {
        self.users
            .get(user_id)
            .copied()
            .unwrap_or(self.users_default)
    }

    /// Level needed to send `event_type`: the per-type override if present,
    /// otherwise `state_default` or `events_default`.
    pub fn required_for(&self, event_type: &str, is_state: bool) -> i64 {
        self.events.get(event_type).copied().unwrap_or(if is_state {
            self.state_default
        } else {
            self.events_default
        })
    }

    /// Copy of these levels with `user_id` set to `level`.
    #[must_use]
    pub fn with_user_level(&self, user_id: &UserId, level: i64) -> Self {
        let mut levels = self.clone();
        levels.users.insert(user_id.clone(), level);
        levels
    }
}
