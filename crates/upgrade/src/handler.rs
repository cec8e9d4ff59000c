use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, info, warn};

use {
    ghostbridge_config::UpgradeConfig,
    ghostbridge_protocol::{Membership, RoomEvent, RoomId},
};

#[cfg(feature = "metrics")]
use ghostbridge_metrics::{counter, gauge, labels, upgrade as upgrade_metrics};

use crate::{
    directory::IntentDirectory,
    error::{Error, Result},
    migrator::{RoomMigrator, RoomUpgrade},
};

/// Follows upgraded rooms to their replacements as the bridge bot.
///
/// Per replacement room: a tombstone triggers a join. A refused join parks
/// the room in `waiting_for_invite` until an invite for the bot arrives, at
/// which point the join is tried again. Any other failure abandons the
/// upgrade. A successful join hands the pair of rooms to the migrator.
pub struct RoomUpgradeHandler {
    config: UpgradeConfig,
    directory: Arc<dyn IntentDirectory>,
    migrator: Arc<dyn RoomMigrator>,
    /// Replacement room -> the room it replaces.
    waiting_for_invite: Mutex<HashMap<RoomId, RoomId>>,
}

impl RoomUpgradeHandler {
    pub fn new(
        config: UpgradeConfig,
        directory: Arc<dyn IntentDirectory>,
        migrator: Arc<dyn RoomMigrator>,
    ) -> Self {
        Self {
            config,
            directory,
            migrator,
            waiting_for_invite: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &UpgradeConfig {
        &self.config
    }

    /// Replacement rooms still waiting for an invite, mapped to the rooms
    /// they replace.
    pub fn pending_invites(&self) -> HashMap<RoomId, RoomId> {
        self.pending().clone()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<RoomId, RoomId>> {
        self.waiting_for_invite
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for_invite(&self, new_room_id: &RoomId, old_room_id: &RoomId) {
        let mut pending = self.pending();
        pending.insert(new_room_id.clone(), old_room_id.clone());
        #[cfg(feature = "metrics")]
        gauge!(upgrade_metrics::PENDING_INVITES).set(pending.len() as f64);
    }

    fn take_pending(&self, new_room_id: &RoomId) -> Option<RoomId> {
        let mut pending = self.pending();
        let old_room_id = pending.remove(new_room_id);
        #[cfg(feature = "metrics")]
        gauge!(upgrade_metrics::PENDING_INVITES).set(pending.len() as f64);
        old_room_id
    }

    /// Handle an `m.room.tombstone` event.
    ///
    /// Returns whether the upgrade is being followed, either already joined
    /// or waiting for an invite.
    ///
    /// The replacement room counts as waiting for an invite while the first
    /// join is in flight, so an invite handled meanwhile is not lost. Whoever
    /// removes the entry after a successful join runs the migration.
    pub async fn on_tombstone(&self, event: &RoomEvent) -> bool {
        if !event.is_state() {
            return false;
        }
        let Some(tombstone) = event.tombstone_content() else {
            debug!(room_id = %event.room_id, "ignoring tombstone without replacement room");
            return false;
        };
        let old_room_id = &event.room_id;
        let new_room_id = &tombstone.replacement_room;
        info!(
            old_room_id = %old_room_id,
            new_room_id = %new_room_id,
            "room upgraded, joining replacement"
        );

        self.wait_for_invite(new_room_id, old_room_id);
        match self.join_new_room(new_room_id, old_room_id).await {
            Ok(true) => {
                if self.take_pending(new_room_id).is_some() {
                    self.on_joined_new_room(old_room_id, new_room_id).await;
                }
                record_tombstone("joined");
                true
            },
            Ok(false) => {
                info!(
                    old_room_id = %old_room_id,
                    new_room_id = %new_room_id,
                    "not allowed into replacement room yet, waiting for an invite"
                );
                record_tombstone("waiting");
                true
            },
            Err(e) => {
                self.take_pending(new_room_id);
                warn!(
                    old_room_id = %old_room_id,
                    new_room_id = %new_room_id,
                    error = %e,
                    source = ?std::error::Error::source(&e),
                    "abandoning room upgrade"
                );
                record_tombstone("failed");
                false
            },
        }
    }

    /// Handle an invite. Only invites of the bot into a replacement room
    /// that is waiting for one are relevant; invites for other users into
    /// that room leave it waiting.
    pub async fn on_invite(&self, event: &RoomEvent) -> bool {
        let Some(member) = event.member_content() else {
            return false;
        };
        if member.membership != Membership::Invite {
            return false;
        }
        let intent = self.directory.intent(None);
        if event.state_key.as_deref() != Some(intent.user_id().as_str()) {
            return false;
        }
        let new_room_id = &event.room_id;
        let Some(old_room_id) = self.take_pending(new_room_id) else {
            return false;
        };

        debug!(
            old_room_id = %old_room_id,
            new_room_id = %new_room_id,
            "invited into replacement room"
        );
        match self.join_new_room(new_room_id, &old_room_id).await {
            Ok(true) => self.on_joined_new_room(&old_room_id, new_room_id).await,
            Ok(false) => {
                warn!(
                    old_room_id = %old_room_id,
                    new_room_id = %new_room_id,
                    "join refused despite invite, waiting for another invite"
                );
                self.wait_for_invite(new_room_id, &old_room_id);
            },
            Err(e) => warn!(
                old_room_id = %old_room_id,
                new_room_id = %new_room_id,
                error = %e,
                source = ?std::error::Error::source(&e),
                "abandoning room upgrade"
            ),
        }
        true
    }

    /// Join the replacement room as the bridge bot.
    ///
    /// `Ok(false)` means the join was forbidden and an invite may still let
    /// the bot in. Any other failure is [`Error::UpgradeFailed`].
    pub async fn join_new_room(&self, new_room_id: &RoomId, old_room_id: &RoomId) -> Result<bool> {
        let intent = self.directory.intent(None);
        let via: Vec<String> = old_room_id
            .server_name()
            .map(|server| vec![server.to_string()])
            .unwrap_or_default();

        match intent.join_via(new_room_id, &via).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_forbidden() => {
                debug!(new_room_id = %new_room_id, error = %e, "join of replacement room forbidden");
                Ok(false)
            },
            Err(source) => Err(Error::UpgradeFailed {
                old_room_id: old_room_id.clone(),
                new_room_id: new_room_id.clone(),
                source,
            }),
        }
    }

    async fn on_joined_new_room(&self, old_room_id: &RoomId, new_room_id: &RoomId) {
        let upgrade = RoomUpgrade {
            old_room_id: old_room_id.clone(),
            new_room_id: new_room_id.clone(),
            migrate_ghosts: self.config.migrate_ghosts,
            migrate_store_entries: self.config.migrate_store_entries,
        };
        if let Err(e) = self.migrator.on_room_upgraded(&upgrade).await {
            warn!(
                old_room_id = %old_room_id,
                new_room_id = %new_room_id,
                error = %e,
                "failed to migrate bridge state to replacement room"
            );
        }
        info!(
            old_room_id = %old_room_id,
            new_room_id = %new_room_id,
            "room upgrade complete"
        );

        #[cfg(feature = "metrics")]
        counter!(upgrade_metrics::COMPLETED_TOTAL).increment(1);
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_tombstone(outcome: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(upgrade_metrics::TOMBSTONES_TOTAL, labels::OUTCOME => outcome).increment(1);
}
