//! Config schema for the bridge core (identity proxies and upgrade handling).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub intent: IntentOptions,
    pub upgrade: UpgradeConfig,
}

/// Options shared by every identity proxy the bridge hands out.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IntentOptions {
    /// The proxied user is already known to the homeserver, so no lazy
    /// registration call is made before acting on its behalf.
    pub registered: bool,
    /// Skip the power-level pre-check before sending events.
    pub dont_check_power_level: bool,
}

/// Room upgrade (tombstone) handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UpgradeConfig {
    /// Move ghost users from the old room into its replacement.
    pub migrate_ghosts: bool,
    /// Re-point the bridge's room store entries at the replacement room.
    pub migrate_store_entries: bool,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            migrate_ghosts: true,
            migrate_store_entries: true,
        }
    }
}
