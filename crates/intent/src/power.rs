//! Power level negotiation before sends.

use std::sync::Arc;

use tracing::{debug, info, warn};

use ghostbridge_protocol::{PowerLevels, RoomId, event_type};

#[cfg(feature = "metrics")]
use ghostbridge_metrics::{counter, intent as intent_metrics};

use crate::{
    error::{Error, Result},
    intent::Intent,
};

impl Intent {
    fn power_lock(&self, room_id: &RoomId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.power_locks.entry(room_id.clone()).or_default().value())
    }

    /// Read the room's power levels from the homeserver and cache them.
    pub(crate) async fn refresh_power_levels(&self, room_id: &RoomId) -> Result<PowerLevels> {
        let content = self
            .client
            .get_state_event(room_id, event_type::POWER_LEVELS, "")
            .await?;
        let levels = PowerLevels::from_content(&content)?;
        self.store_power_levels(room_id, levels.clone());
        Ok(levels)
    }

    /// Make sure this user may send `event_type`, asking the bot to raise its
    /// level when it may not.
    ///
    /// A shortfall seen in the cache is confirmed with a live read before the
    /// bot is asked for anything. Negotiations for the same room are
    /// serialized, and a granted level is written back to the cache so a
    /// queued caller sees it.
    pub(crate) async fn ensure_power_level_for(
        &self,
        room_id: &RoomId,
        event_type: &str,
        is_state: bool,
    ) -> Result<()> {
        // Membership changes are governed by join/invite rules, not levels.
        if event_type == event_type::MEMBER {
            return Ok(());
        }

        let lock = self.power_lock(room_id);
        let _guard = lock.lock().await;

        let user_id = self.user_id();
        let levels = match self.power_levels(room_id) {
            Some(cached) => {
                if cached.user_level(user_id) >= cached.required_for(event_type, is_state) {
                    return Ok(());
                }
                debug!(
                    room_id = %room_id,
                    user_id = %user_id,
                    event_type,
                    "cached power level too low, re-reading"
                );
                self.refresh_power_levels(room_id).await?
            },
            None => self.refresh_power_levels(room_id).await?,
        };

        let required = levels.required_for(event_type, is_state);
        let user_level = levels.user_level(user_id);
        if user_level >= required {
            return Ok(());
        }

        let bot_level = levels.user_level(self.bot_user_id());
        let needed_to_grant = levels.required_for(event_type::POWER_LEVELS, true);
        if bot_level < needed_to_grant || bot_level < required {
            warn!(
                room_id = %room_id,
                user_id = %user_id,
                event_type,
                required,
                user_level,
                bot_level,
                "bot lacks the power to raise user's level"
            );
            return Err(Error::InsufficientPower {
                room_id: room_id.clone(),
                user_id: user_id.clone(),
                event_type: event_type.to_string(),
                required,
                user_level,
                bot_level,
            });
        }

        info!(
            room_id = %room_id,
            user_id = %user_id,
            event_type,
            from = user_level,
            to = required,
            "raising power level through bot"
        );
        if let Err(source) = self
            .bot_client
            .set_power_level(room_id, user_id, required, &levels)
            .await
        {
            self.forget_power_levels(room_id);
            return Err(Error::PowerLevelChange {
                room_id: room_id.clone(),
                user_id: user_id.clone(),
                source,
            });
        }
        self.store_power_levels(room_id, levels.with_user_level(user_id, required));

        #[cfg(feature = "metrics")]
        counter!(intent_metrics::POWER_ESCALATIONS_TOTAL).increment(1);
        Ok(())
    }
}
