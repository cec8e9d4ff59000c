//! Following rooms to their replacements after a room upgrade.
//!
//! When a tombstone arrives the bridge bot tries to join the replacement
//! room. If it is refused it waits for an invite and joins then. Once in, a
//! [`RoomMigrator`] moves the bridge's state across.

pub mod directory;
pub mod error;
pub mod handler;
pub mod migrator;

pub use {
    directory::IntentDirectory,
    error::{Error, Result},
    handler::RoomUpgradeHandler,
    migrator::{RoomMigrator, RoomUpgrade},
};
