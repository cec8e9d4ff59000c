use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    dashmap::DashMap,
    serde_json::json,
    tracing::{debug, warn},
};

use {
    ghostbridge_config::IntentOptions,
    ghostbridge_protocol::{
        BridgeErrorReason, ErrorCode, EventId, Membership, PowerLevels, RoomEvent, RoomId,
        UserId, event_type, events::bridge_error_content,
    },
};

#[cfg(feature = "metrics")]
use ghostbridge_metrics::{counter, intent as intent_metrics};

use crate::{
    client::MatrixClient,
    error::{Error, Result},
};

/// Acts as one bridged user, borrowing the bot's privileges to recover.
///
/// One instance per user, kept for the user's lifetime. The caches are only
/// fed by [`Intent::on_event`] and by live reads made during negotiation.
pub struct Intent {
    pub(crate) client: Arc<dyn MatrixClient>,
    pub(crate) bot_client: Arc<dyn MatrixClient>,
    options: IntentOptions,
    registered: AtomicBool,
    membership: RwLock<HashMap<RoomId, Membership>>,
    power_levels: RwLock<HashMap<RoomId, PowerLevels>>,
    /// One in-flight power negotiation per room.
    pub(crate) power_locks: DashMap<RoomId, Arc<tokio::sync::Mutex<()>>>,
}

impl Intent {
    pub fn new(
        client: Arc<dyn MatrixClient>,
        bot_client: Arc<dyn MatrixClient>,
        options: IntentOptions,
    ) -> Self {
        Self {
            client,
            bot_client,
            registered: AtomicBool::new(options.registered),
            options,
            membership: RwLock::new(HashMap::new()),
            power_levels: RwLock::new(HashMap::new()),
            power_locks: DashMap::new(),
        }
    }

    pub fn user_id(&self) -> &UserId {
        self.client.user_id()
    }

    pub fn bot_user_id(&self) -> &UserId {
        self.bot_client.user_id()
    }

    pub fn options(&self) -> &IntentOptions {
        &self.options
    }

    /// Last membership observed for this user, `None` when unknown.
    pub fn membership(&self, room_id: &RoomId) -> Option<Membership> {
        self.membership
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .copied()
    }

    pub fn power_levels(&self, room_id: &RoomId) -> Option<PowerLevels> {
        self.power_levels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    pub(crate) fn store_power_levels(&self, room_id: &RoomId, levels: PowerLevels) {
        self.power_levels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room_id.clone(), levels);
    }

    pub(crate) fn forget_power_levels(&self, room_id: &RoomId) {
        self.power_levels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id);
    }

    fn forget_membership(&self, room_id: &RoomId) {
        self.membership
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(room_id);
    }

    // ── Observed events ──────────────────────────────────────────────────────

    /// Feed an event seen on the bridge's stream into the caches.
    ///
    /// Never fails and never calls the homeserver; events that are malformed
    /// or irrelevant to this user are dropped.
    pub fn on_event(&self, event: &RoomEvent) {
        match event.event_type.as_str() {
            event_type::MEMBER => {
                if event.state_key.as_deref() != Some(self.user_id().as_str()) {
                    return;
                }
                match event.member_content() {
                    Some(content) => {
                        self.membership
                            .write()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(event.room_id.clone(), content.membership);
                    },
                    None => debug!(
                        room_id = %event.room_id,
                        "ignoring membership event with unreadable content"
                    ),
                }
            },
            event_type::POWER_LEVELS => {
                if event.state_key.as_deref() != Some("") {
                    return;
                }
                match PowerLevels::from_content(&event.content) {
                    Ok(levels) => self.store_power_levels(&event.room_id, levels),
                    Err(e) => debug!(
                        room_id = %event.room_id,
                        error = %e,
                        "ignoring power levels event with unreadable content"
                    ),
                }
            },
            _ => {},
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    async fn ensure_registered(&self) -> Result<()> {
        if self.registered.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.bot_client.register_user(self.user_id()).await {
            Ok(()) => debug!(user_id = %self.user_id(), "registered user"),
            Err(e) if e.errcode == ErrorCode::UserInUse => {
                debug!(user_id = %self.user_id(), "user already registered");
            },
            Err(e) => return Err(e.into()),
        }
        self.registered.store(true, Ordering::Release);
        Ok(())
    }

    // ── Membership ───────────────────────────────────────────────────────────

    pub async fn join(&self, room_id: &RoomId) -> Result<()> {
        self.join_via(room_id, &[]).await
    }

    /// Join `room_id`, asking the bot to invite this user when refused.
    ///
    /// The bot first invites; if that is refused too, the bot joins the room
    /// itself and invites again. The user's join is retried once.
    pub async fn join_via(&self, room_id: &RoomId, via: &[String]) -> Result<()> {
        if self.membership(room_id) == Some(Membership::Join) {
            return Ok(());
        }
        self.ensure_registered().await?;

        let refused = match self.client.join_room(room_id, via).await {
            Ok(_) => return Ok(()),
            // The bot cannot invite itself.
            Err(e) if e.is_forbidden() && self.user_id() != self.bot_user_id() => e,
            Err(e) => return Err(e.into()),
        };
        debug!(
            room_id = %room_id,
            user_id = %self.user_id(),
            error = %refused,
            "join refused, asking bot for an invite"
        );

        self.invite_via_bot(room_id, via).await?;
        self.client.join_room(room_id, via).await?;

        #[cfg(feature = "metrics")]
        counter!(intent_metrics::JOIN_RECOVERIES_TOTAL).increment(1);
        Ok(())
    }

    async fn invite_via_bot(&self, room_id: &RoomId, via: &[String]) -> Result<()> {
        let user_id = self.user_id();
        match self.bot_client.invite(room_id, user_id).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_forbidden() => debug!(
                room_id = %room_id,
                bot = %self.bot_user_id(),
                error = %e,
                "bot invite refused, joining bot first"
            ),
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = self.bot_client.join_room(room_id, via).await {
            warn!(
                room_id = %room_id,
                bot = %self.bot_user_id(),
                error = %e,
                "bot cannot join room, giving up on join"
            );
            return Err(e.into());
        }
        self.bot_client.invite(room_id, user_id).await?;
        Ok(())
    }

    pub async fn invite(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.invite(room_id, user_id).await?)
    }

    pub async fn leave(&self, room_id: &RoomId) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.leave(room_id).await?)
    }

    pub async fn kick(&self, room_id: &RoomId, user_id: &UserId, reason: Option<&str>) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.kick(room_id, user_id, reason).await?)
    }

    pub async fn ban(&self, room_id: &RoomId, user_id: &UserId, reason: Option<&str>) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.ban(room_id, user_id, reason).await?)
    }

    pub async fn unban(&self, room_id: &RoomId, user_id: &UserId) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.unban(room_id, user_id).await?)
    }

    /// Set `user_id`'s power level as this user, based on the cached or
    /// freshly read power levels of the room.
    pub async fn set_power_level(&self, room_id: &RoomId, user_id: &UserId, level: i64) -> Result<()> {
        self.ensure_registered().await?;
        let levels = match self.power_levels(room_id) {
            Some(levels) => levels,
            None => self.refresh_power_levels(room_id).await?,
        };
        Ok(self
            .client
            .set_power_level(room_id, user_id, level, &levels)
            .await?)
    }

    /// Read a state event as this user, joining the room first if needed.
    pub async fn get_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<serde_json::Value> {
        self.join(room_id).await?;
        Ok(self
            .client
            .get_state_event(room_id, event_type, state_key)
            .await?)
    }

    // ── Profile ──────────────────────────────────────────────────────────────

    pub async fn set_display_name(&self, name: &str) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.set_display_name(name).await?)
    }

    pub async fn set_avatar_url(&self, url: &str) -> Result<()> {
        self.ensure_registered().await?;
        Ok(self.client.set_avatar_url(url).await?)
    }

    // ── Sending ──────────────────────────────────────────────────────────────

    /// Send a timeline event, joining and retrying once if refused.
    pub async fn send_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: serde_json::Value,
    ) -> Result<EventId> {
        self.ensure_registered().await?;
        match self.try_send_event(room_id, event_type, &content).await {
            Err(e) if e.is_forbidden() => {
                self.join_after_refusal(room_id, &e).await?;
                self.try_send_event(room_id, event_type, &content).await
            },
            other => other,
        }
    }

    async fn try_send_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: &serde_json::Value,
    ) -> Result<EventId> {
        if !self.options.dont_check_power_level {
            self.ensure_power_level_for(room_id, event_type, false)
                .await?;
        }
        Ok(self.client.send_event(room_id, event_type, content).await?)
    }

    /// Send a state event, raising this user's power level through the bot
    /// first when it is known to be too low.
    pub async fn send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: serde_json::Value,
    ) -> Result<EventId> {
        self.ensure_registered().await?;
        match self
            .try_send_state_event(room_id, event_type, state_key, &content)
            .await
        {
            Err(e) if e.is_forbidden() => {
                self.join_after_refusal(room_id, &e).await?;
                self.try_send_state_event(room_id, event_type, state_key, &content)
                    .await
            },
            other => other,
        }
    }

    async fn try_send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &serde_json::Value,
    ) -> Result<EventId> {
        if !self.options.dont_check_power_level {
            self.ensure_power_level_for(room_id, event_type, true)
                .await?;
        }
        Ok(self
            .client
            .send_state_event(room_id, event_type, state_key, content)
            .await?)
    }

    /// The homeserver refused a send, so whatever the cache says about our
    /// membership is wrong.
    async fn join_after_refusal(&self, room_id: &RoomId, refused: &Error) -> Result<()> {
        debug!(
            room_id = %room_id,
            user_id = %self.user_id(),
            error = %refused,
            "send refused, joining before retry"
        );
        self.forget_membership(room_id);
        self.join(room_id).await?;

        #[cfg(feature = "metrics")]
        counter!(intent_metrics::SEND_RETRIES_TOTAL).increment(1);
        Ok(())
    }

    pub async fn send_message(
        &self,
        room_id: &RoomId,
        content: serde_json::Value,
    ) -> Result<EventId> {
        self.send_event(room_id, event_type::MESSAGE, content).await
    }

    pub async fn send_text(&self, room_id: &RoomId, text: &str) -> Result<EventId> {
        self.send_message(room_id, json!({ "msgtype": "m.text", "body": text }))
            .await
    }

    pub async fn set_room_topic(&self, room_id: &RoomId, topic: &str) -> Result<EventId> {
        self.send_state_event(room_id, event_type::TOPIC, "", json!({ "topic": topic }))
            .await
    }

    pub async fn set_room_name(&self, room_id: &RoomId, name: &str) -> Result<EventId> {
        self.send_state_event(room_id, event_type::NAME, "", json!({ "name": name }))
            .await
    }

    pub async fn set_room_avatar(&self, room_id: &RoomId, url: &str) -> Result<EventId> {
        self.send_state_event(room_id, event_type::AVATAR, "", json!({ "url": url }))
            .await
    }

    /// Show or clear the typing notice, joining the room first if needed.
    pub async fn send_typing(&self, room_id: &RoomId, typing: bool) -> Result<()> {
        self.join(room_id).await?;
        Ok(self.client.send_typing(room_id, typing, None).await?)
    }

    /// Tell the room that the bridge could not deliver `event_id`.
    ///
    /// Assumes the room is already usable: no registration, join or power
    /// level handling is attempted.
    pub async fn signal_bridge_error(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
        network_name: &str,
        reason: BridgeErrorReason,
        affected_users: &[String],
    ) -> Result<EventId> {
        let content = bridge_error_content(event_id, network_name, reason, affected_users);
        Ok(self
            .client
            .send_event(room_id, event_type::BRIDGE_ERROR, &content)
            .await?)
    }
}
