use {async_trait::async_trait, ghostbridge_protocol::RoomId};

/// A completed upgrade: the replacement room has been joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpgrade {
    pub old_room_id: RoomId,
    pub new_room_id: RoomId,
    /// Ghost users should follow into the new room.
    pub migrate_ghosts: bool,
    /// Room store entries should be re-pointed at the new room.
    pub migrate_store_entries: bool,
}

/// Moves bridge state from an upgraded room to its replacement.
#[async_trait]
pub trait RoomMigrator: Send + Sync {
    /// Called exactly once per completed upgrade, after the join.
    async fn on_room_upgraded(&self, upgrade: &RoomUpgrade) -> anyhow::Result<()>;
}
