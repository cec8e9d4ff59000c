//! Metric name and label definitions.
//!
//! Centralizing these definitions keeps names consistent between the crates
//! that record them and the dashboards that read them.

/// Identity proxy metrics
pub mod intent {
    /// Joins that needed the bot to step in after a forbidden refusal
    pub const JOIN_RECOVERIES_TOTAL: &str = "ghostbridge_intent_join_recoveries_total";
    /// Power level changes requested from the bot so a send could proceed
    pub const POWER_ESCALATIONS_TOTAL: &str = "ghostbridge_intent_power_escalations_total";
    /// Sends that were retried after joining the room
    pub const SEND_RETRIES_TOTAL: &str = "ghostbridge_intent_send_retries_total";
}

/// Room upgrade metrics
pub mod upgrade {
    /// Tombstones processed, labelled by outcome
    pub const TOMBSTONES_TOTAL: &str = "ghostbridge_upgrade_tombstones_total";
    /// Replacement rooms waiting for an invite
    pub const PENDING_INVITES: &str = "ghostbridge_upgrade_pending_invites";
    /// Upgrades that completed with a join of the replacement room
    pub const COMPLETED_TOTAL: &str = "ghostbridge_upgrade_completed_total";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
}
