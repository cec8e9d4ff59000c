//! Scripted in-memory [`MatrixClient`] for tests.
//!
//! Every call is appended to a [`CallLog`] that can be shared between the
//! target and bot clients, so tests can assert on the exact interleaving of
//! calls. Results are scripted per operation kind; an empty script answers
//! with success.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use {async_trait::async_trait, tokio::sync::oneshot};

use ghostbridge_protocol::{
    ErrorCode, EventId, PowerLevels, RemoteError, RoomId, UserId, event_type,
};

use crate::client::{ClientResult, MatrixClient};

/// A recorded client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Register(UserId),
    Join(RoomId),
    Invite(RoomId, UserId),
    Leave(RoomId),
    Kick(RoomId, UserId),
    Ban(RoomId, UserId),
    Unban(RoomId, UserId),
    SetPowerLevel(RoomId, UserId, i64),
    GetState(RoomId, String, String),
    SendState(RoomId, String, String, serde_json::Value),
    SendEvent(RoomId, String, serde_json::Value),
    Typing(RoomId, bool),
    SetDisplayName(String),
    SetAvatarUrl(String),
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Self::Register(_) => OpKind::Register,
            Self::Join(_) => OpKind::Join,
            Self::Invite(..) => OpKind::Invite,
            Self::Leave(_) => OpKind::Leave,
            Self::Kick(..) => OpKind::Kick,
            Self::Ban(..) => OpKind::Ban,
            Self::Unban(..) => OpKind::Unban,
            Self::SetPowerLevel(..) => OpKind::SetPowerLevel,
            Self::GetState(..) => OpKind::GetState,
            Self::SendState(..) => OpKind::SendState,
            Self::SendEvent(..) => OpKind::SendEvent,
            Self::Typing(..) => OpKind::Typing,
            Self::SetDisplayName(_) => OpKind::SetDisplayName,
            Self::SetAvatarUrl(_) => OpKind::SetAvatarUrl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Register,
    Join,
    Invite,
    Leave,
    Kick,
    Ban,
    Unban,
    SetPowerLevel,
    GetState,
    SendState,
    SendEvent,
    Typing,
    SetDisplayName,
    SetAvatarUrl,
}

/// One call, tagged with the identity that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub actor: UserId,
    pub op: Op,
}

impl Call {
    pub fn new(actor: &str, op: Op) -> Self {
        Self {
            actor: UserId::from(actor),
            op,
        }
    }
}

/// Shared, ordered record of calls across clients.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls of `kind` made by `actor`.
    pub fn count(&self, actor: &str, kind: OpKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.actor.as_str() == actor && c.op.kind() == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.calls().is_empty()
    }

    fn push(&self, call: Call) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

pub fn forbidden(message: &str) -> RemoteError {
    RemoteError::forbidden(message)
}

pub fn remote(code: &str, message: &str) -> RemoteError {
    RemoteError::new(ErrorCode::from_errcode(code), message)
}

#[derive(Default)]
struct Script {
    results: HashMap<OpKind, VecDeque<ClientResult<()>>>,
    state: HashMap<(RoomId, String), serde_json::Value>,
    held_joins: VecDeque<oneshot::Receiver<()>>,
}

pub struct MockClient {
    user_id: UserId,
    log: CallLog,
    script: Mutex<Script>,
    next_event: AtomicU64,
}

impl MockClient {
    pub fn new(user_id: &str, log: &CallLog) -> Self {
        Self {
            user_id: UserId::from(user_id),
            log: log.clone(),
            script: Mutex::new(Script::default()),
            next_event: AtomicU64::new(1),
        }
    }

    /// Queue the result of the next unanswered call of `kind`.
    pub fn respond(&self, kind: OpKind, result: ClientResult<()>) -> &Self {
        self.script()
            .results
            .entry(kind)
            .or_default()
            .push_back(result);
        self
    }

    /// Hold the next join open after it is recorded and answered, until the
    /// returned sender fires or is dropped.
    pub fn hold_next_join(&self) -> oneshot::Sender<()> {
        let (release, held) = oneshot::channel();
        self.script().held_joins.push_back(held);
        release
    }

    /// Store state content returned by later reads.
    pub fn set_state(&self, room_id: &RoomId, event_type: &str, content: serde_json::Value) {
        self.script()
            .state
            .insert((room_id.clone(), event_type.to_string()), content);
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: Op) -> ClientResult<()> {
        let kind = op.kind();
        self.log.push(Call {
            actor: self.user_id.clone(),
            op,
        });
        self.script()
            .results
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    fn event_id(&self) -> EventId {
        let n = self.next_event.fetch_add(1, Ordering::Relaxed);
        EventId::new(format!("$mock{n}:{}", self.user_id.localpart()))
    }
}

#[async_trait]
impl MatrixClient for MockClient {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    async fn register_user(&self, user_id: &UserId) -> ClientResult<()> {
        self.record(Op::Register(user_id.clone()))
    }

    async fn join_room(&self, room_id: &RoomId, _via: &[String]) -> ClientResult<RoomId> {
        let result = self.record(Op::Join(room_id.clone()));
        let held = self.script().held_joins.pop_front();
        if let Some(held) = held {
            let _ = held.await;
        }
        result.map(|()| room_id.clone())
    }

    async fn invite(&self, room_id: &RoomId, user_id: &UserId) -> ClientResult<()> {
        self.record(Op::Invite(room_id.clone(), user_id.clone()))
    }

    async fn leave(&self, room_id: &RoomId) -> ClientResult<()> {
        self.record(Op::Leave(room_id.clone()))
    }

    async fn kick(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        _reason: Option<&str>,
    ) -> ClientResult<()> {
        self.record(Op::Kick(room_id.clone(), user_id.clone()))
    }

    async fn ban(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        _reason: Option<&str>,
    ) -> ClientResult<()> {
        self.record(Op::Ban(room_id.clone(), user_id.clone()))
    }

    async fn unban(&self, room_id: &RoomId, user_id: &UserId) -> ClientResult<()> {
        self.record(Op::Unban(room_id.clone(), user_id.clone()))
    }

    async fn set_power_level(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        level: i64,
        current: &PowerLevels,
    ) -> ClientResult<()> {
        self.record(Op::SetPowerLevel(room_id.clone(), user_id.clone(), level))?;
        let content = current
            .with_user_level(user_id, level)
            .to_content()
            .map_err(|e| remote("M_BAD_JSON", &e.to_string()))?;
        self.set_state(room_id, event_type::POWER_LEVELS, content);
        Ok(())
    }

    async fn get_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> ClientResult<serde_json::Value> {
        self.record(Op::GetState(
            room_id.clone(),
            event_type.to_string(),
            state_key.to_string(),
        ))?;
        self.script()
            .state
            .get(&(room_id.clone(), event_type.to_string()))
            .cloned()
            .ok_or_else(|| remote("M_NOT_FOUND", "Event not found."))
    }

    async fn send_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
        content: &serde_json::Value,
    ) -> ClientResult<EventId> {
        self.record(Op::SendState(
            room_id.clone(),
            event_type.to_string(),
            state_key.to_string(),
            content.clone(),
        ))?;
        Ok(self.event_id())
    }

    async fn send_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: &serde_json::Value,
    ) -> ClientResult<EventId> {
        self.record(Op::SendEvent(
            room_id.clone(),
            event_type.to_string(),
            content.clone(),
        ))?;
        Ok(self.event_id())
    }

    async fn send_typing(
        &self,
        room_id: &RoomId,
        typing: bool,
        _timeout_ms: Option<u64>,
    ) -> ClientResult<()> {
        self.record(Op::Typing(room_id.clone(), typing))
    }

    async fn set_display_name(&self, name: &str) -> ClientResult<()> {
        self.record(Op::SetDisplayName(name.to_string()))
    }

    async fn set_avatar_url(&self, url: &str) -> ClientResult<()> {
        self.record(Op::SetAvatarUrl(url.to_string()))
    }
}
