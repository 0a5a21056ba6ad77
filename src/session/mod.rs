//! Chat session: join, send and the 1-second poll loop.
//!
//! DESIGN
//! ======
//! A [`ChatSession`] is a cheap handle over shared state. `join` starts a
//! background task that ticks every [`POLL_INTERVAL`] and awaits each poll
//! before waiting for the next tick, so polls never overlap. Missed ticks are
//! skipped, not burst.
//!
//! Everything the renderer needs is emitted as a [`SessionEvent`] on one
//! unbounded channel. Connectivity is edge-triggered: an event is sent only
//! when the derived flag actually changes.
//!
//! ORDERING
//! ========
//! The cursor only ever moves forward (`max` of current and new), so a slow
//! poll resolving after a faster one cannot drag it back. Each disconnect
//! bumps the epoch; a request issued under an older epoch has its result
//! discarded instead of touching state.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures never escape the poll task. They flip connectivity to
//! false and leave the cursor where it was, so the next successful poll
//! re-requests the same window.

pub mod status;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::net::{ApiError, ChatApi, ChatMessage, unix_now};
use status::{StatusGate, StatusNotice};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_ALIAS_CHARS: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 500;

const JOIN_REJECTED: &str = "could not join";
const SEND_REJECTED: &str = "could not send";

// =============================================================================
// ERRORS AND EVENTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Rejected locally; no request was made.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The service could not be reached or answered with an error status.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The service answered and declined the request.
    #[error("{0}")]
    Rejected(String),

    /// The session was disconnected while the request was in flight.
    #[error("session disconnected")]
    Disconnected,
}

impl From<ApiError> for ChatError {
    fn from(error: ApiError) -> Self {
        Self::Unreachable(error.to_string())
    }
}

/// Everything a renderer is told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Message(ChatMessage),
    /// Full replacement of the active user list.
    Presence(Vec<String>),
    Connectivity(bool),
    Status(StatusNotice),
    Visibility(bool),
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

#[must_use]
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Joining,
    Active,
}

/// Result of a `send` that was not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The session is not active; nothing was sent.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied { delivered: usize },
    /// The service answered `success: false`; nothing changed.
    Rejected,
    Unreachable,
    /// The session is not active, or was disconnected mid-request.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub alias: Option<String>,
    pub cursor: i64,
    pub connected: bool,
}

// =============================================================================
// STATE
// =============================================================================

struct SessionState {
    phase: Phase,
    alias: Option<String>,
    cursor: i64,
    /// Starts false; a session that never joined reads as disconnected.
    connected: bool,
    epoch: u64,
    poll_task: Option<JoinHandle<()>>,
}

struct Inner {
    id: Uuid,
    api: Arc<dyn ChatApi>,
    events: EventSender,
    status_gate: StatusGate,
    state: Mutex<SessionState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!(session = %self.id, "event receiver dropped");
        }
    }

    /// Record connectivity, emitting only on change. Called with the lock
    /// held so events keep the order of state changes.
    fn set_connected(&self, state: &mut SessionState, connected: bool) {
        if state.connected != connected {
            state.connected = connected;
            self.emit(SessionEvent::Connectivity(connected));
        }
    }

    async fn poll(&self, epoch: u64) -> PollOutcome {
        let (since, alias) = {
            let state = self.lock();
            if state.epoch != epoch || state.phase != Phase::Active {
                return PollOutcome::Stale;
            }
            let Some(alias) = state.alias.clone() else {
                return PollOutcome::Stale;
            };
            (state.cursor, alias)
        };

        let result = self.api.poll(since, &alias).await;

        let mut state = self.lock();
        if state.epoch != epoch || state.phase != Phase::Active {
            debug!(session = %self.id, "discarding poll result from previous join");
            return PollOutcome::Stale;
        }
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                warn!(session = %self.id, since, %error, "poll failed");
                self.set_connected(&mut state, false);
                return PollOutcome::Unreachable;
            }
        };
        if !response.success {
            debug!(session = %self.id, error = ?response.error, "poll declined");
            return PollOutcome::Rejected;
        }

        self.set_connected(&mut state, true);
        let mut delivered = 0;
        if response.has_messages() {
            let now = unix_now();
            for message in response.chat_messages(now) {
                self.emit(SessionEvent::Message(message));
                delivered += 1;
            }
            let next = response.cursor().unwrap_or(now);
            state.cursor = state.cursor.max(next);
        }
        if let Some(users) = response.presence() {
            self.emit(SessionEvent::Presence(users));
        }
        PollOutcome::Applied { delivered }
    }

    fn deliver_status(&self, notice: StatusNotice) -> Option<StatusNotice> {
        let notice = self.status_gate.admit(notice)?;
        self.emit(SessionEvent::Status(notice.clone()));
        Some(notice)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
    }
}

/// Runs until aborted, or until the session is dropped or moves past `epoch`.
fn spawn_poll_loop(inner: &Arc<Inner>, epoch: u64) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if inner.poll(epoch).await == PollOutcome::Stale {
                break;
            }
        }
    })
}

// =============================================================================
// SESSION
// =============================================================================

/// Handle to one user's connection. Clones share the same session.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

impl ChatSession {
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>, events: EventSender) -> Self {
        let state = SessionState {
            phase: Phase::Idle,
            alias: None,
            cursor: 0,
            connected: false,
            epoch: 0,
            poll_task: None,
        };
        let inner = Inner {
            id: Uuid::new_v4(),
            api,
            events,
            status_gate: StatusGate::new(),
            state: Mutex::new(state),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Join the room under `alias` and start polling.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidInput`] for an empty or over-long alias, or when
    ///   already joining or joined. No request is made.
    /// - [`ChatError::Unreachable`] on transport failure; connectivity flips
    ///   to false.
    /// - [`ChatError::Rejected`] when the service declines; connectivity is
    ///   left alone.
    /// - [`ChatError::Disconnected`] when `disconnect` ran meanwhile.
    pub async fn join(&self, alias: &str) -> Result<(), ChatError> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(ChatError::InvalidInput("alias is empty"));
        }
        if alias.chars().count() > MAX_ALIAS_CHARS {
            return Err(ChatError::InvalidInput("alias is longer than 20 characters"));
        }
        let epoch = {
            let mut state = self.inner.lock();
            if state.phase != Phase::Idle {
                return Err(ChatError::InvalidInput("session already joined"));
            }
            state.phase = Phase::Joining;
            state.epoch
        };

        let result = self.inner.api.join(alias).await;

        let mut state = self.inner.lock();
        if state.epoch != epoch {
            return Err(ChatError::Disconnected);
        }
        match result {
            Err(error) => {
                warn!(session = %self.inner.id, %error, "join failed");
                state.phase = Phase::Idle;
                self.inner.set_connected(&mut state, false);
                Err(error.into())
            }
            Ok(ack) if !ack.success => {
                state.phase = Phase::Idle;
                let reason = ack.error.unwrap_or_else(|| JOIN_REJECTED.to_string());
                info!(session = %self.inner.id, %reason, "join declined");
                Err(ChatError::Rejected(reason))
            }
            Ok(_) => {
                state.alias = Some(alias.to_string());
                state.phase = Phase::Active;
                if let Some(previous) = state.poll_task.replace(spawn_poll_loop(&self.inner, epoch)) {
                    previous.abort();
                }
                self.inner.set_connected(&mut state, true);
                info!(session = %self.inner.id, alias, "joined");
                Ok(())
            }
        }
    }

    /// Post `text` under the joined alias.
    ///
    /// Concurrent sends are allowed and may reach the service in any order.
    ///
    /// # Errors
    ///
    /// - [`ChatError::InvalidInput`] for empty or over-long text.
    /// - [`ChatError::Unreachable`] on transport failure; connectivity flips
    ///   to false but the session stays active.
    /// - [`ChatError::Rejected`] when the service declines.
    pub async fn send(&self, text: &str) -> Result<Delivery, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput("message is empty"));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::InvalidInput("message is longer than 500 characters"));
        }
        let (alias, epoch) = {
            let state = self.inner.lock();
            match (&state.alias, state.phase) {
                (Some(alias), Phase::Active) => (alias.clone(), state.epoch),
                _ => return Ok(Delivery::Skipped),
            }
        };

        let result = self.inner.api.send(&alias, text).await;

        let mut state = self.inner.lock();
        let current = state.epoch == epoch;
        match result {
            Err(error) => {
                warn!(session = %self.inner.id, %error, "send failed");
                if current {
                    self.inner.set_connected(&mut state, false);
                }
                Err(error.into())
            }
            Ok(ack) if !ack.success => Err(ChatError::Rejected(ack.error.unwrap_or_else(|| SEND_REJECTED.to_string()))),
            Ok(_) => {
                if current {
                    self.inner.set_connected(&mut state, true);
                }
                Ok(Delivery::Sent)
            }
        }
    }

    /// Run one poll now, outside the timer. Safe to call while the loop runs.
    pub async fn poll_once(&self) -> PollOutcome {
        let epoch = self.inner.lock().epoch;
        self.inner.poll(epoch).await
    }

    /// Stop polling and mark disconnected. Alias and cursor are kept.
    pub fn disconnect(&self) {
        let mut state = self.inner.lock();
        if let Some(task) = state.poll_task.take() {
            task.abort();
        }
        state.epoch += 1;
        state.phase = Phase::Idle;
        self.inner.set_connected(&mut state, false);
        info!(session = %self.inner.id, "disconnected");
    }

    /// Fetch the service status and deliver it through the status gate.
    ///
    /// Returns the delivered notice. No request is made once a report has
    /// been shown.
    pub async fn check_status(&self) -> Option<StatusNotice> {
        if self.inner.status_gate.is_shown() {
            return None;
        }
        let result = self.inner.api.status().await;
        if let Err(error) = &result {
            warn!(session = %self.inner.id, %error, "status check failed");
        }
        self.inner.deliver_status(StatusNotice::from_result(result))
    }

    /// Deliver an externally pushed `{ ok, type, data, url, error }` payload
    /// through the status gate.
    pub fn push_status(&self, payload: &Value) -> Option<StatusNotice> {
        let notice = StatusNotice::from_pushed(payload)?;
        self.inner.deliver_status(notice)
    }

    /// Per-session identifier used in logs.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    #[must_use]
    pub fn alias(&self) -> Option<String> {
        self.inner.lock().alias.clone()
    }

    #[must_use]
    pub fn cursor(&self) -> i64 {
        self.inner.lock().cursor
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    #[must_use]
    pub fn status_shown(&self) -> bool {
        self.inner.status_gate.is_shown()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock();
        SessionSnapshot {
            phase: state.phase,
            alias: state.alias.clone(),
            cursor: state.cursor,
            connected: state.connected,
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
