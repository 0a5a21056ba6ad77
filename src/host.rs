//! Widget bootstrap: one endpoint, one session, one visibility flag.
//!
//! DESIGN
//! ======
//! `ChatHost` owns initialization-once state explicitly. The first `init`
//! resolves the endpoint, builds the transport and session, and kicks off
//! the one-time status check; later calls hand back the same session.
//! Visibility starts hidden and is reported on the session's event channel
//! only when it changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use endpoint::{Provenance, ResolvedEndpoint};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::net::{ApiError, ChatApi, HttpChatApi};
use crate::session::status::StatusNotice;
use crate::session::{ChatSession, EventReceiver, EventSender, SessionEvent, event_channel};

pub struct ChatHost {
    config: ClientConfig,
    events: EventSender,
    endpoint: OnceLock<ResolvedEndpoint>,
    session: OnceLock<ChatSession>,
    visible: AtomicBool,
}

impl ChatHost {
    /// Create an uninitialized host and the receiving end of its event channel.
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, EventReceiver) {
        let (events, rx) = event_channel();
        let host = Self {
            config,
            events,
            endpoint: OnceLock::new(),
            session: OnceLock::new(),
            visible: AtomicBool::new(false),
        };
        (host, rx)
    }

    /// Resolve the endpoint and create the session over HTTP.
    ///
    /// Idempotent: once a session exists it is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the resolved address is not a usable URL
    /// or the HTTP client cannot be built. A later call may retry.
    pub fn init(&self) -> Result<ChatSession, ApiError> {
        if let Some(session) = self.session.get() {
            return Ok(session.clone());
        }
        let endpoint = self.endpoint.get_or_init(|| self.config.resolve_endpoint());
        match endpoint.provenance() {
            Provenance::Fallback => warn!(%endpoint, "using unverified chat endpoint"),
            provenance => info!(%endpoint, %provenance, "chat endpoint resolved"),
        }
        let api = HttpChatApi::new(endpoint, self.config.timeouts)?;
        Ok(self.init_with(Arc::new(api)))
    }

    /// Create the session over `api`, or return the existing one.
    ///
    /// The first call also spawns the status check when a tokio runtime is
    /// available.
    pub fn init_with(&self, api: Arc<dyn ChatApi>) -> ChatSession {
        let mut created = false;
        let session = self.session.get_or_init(|| {
            created = true;
            ChatSession::new(api, self.events.clone())
        });
        if created {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let session = session.clone();
                    handle.spawn(async move {
                        session.check_status().await;
                    });
                }
                Err(_) => debug!("no runtime; skipping initial status check"),
            }
        }
        session.clone()
    }

    #[must_use]
    pub fn session(&self) -> Option<&ChatSession> {
        self.session.get()
    }

    /// The endpoint chosen by `init`, if it has run.
    #[must_use]
    pub fn endpoint(&self) -> Option<&ResolvedEndpoint> {
        self.endpoint.get()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn show(&self) {
        if !self.visible.swap(true, Ordering::AcqRel) {
            self.emit_visibility(true);
        }
    }

    pub fn hide(&self) {
        if self.visible.swap(false, Ordering::AcqRel) {
            self.emit_visibility(false);
        }
    }

    /// Flip visibility and return the new state.
    pub fn toggle(&self) -> bool {
        let visible = !self.visible.fetch_xor(true, Ordering::AcqRel);
        self.emit_visibility(visible);
        visible
    }

    /// Forward a pushed status payload. Ignored before `init`.
    pub fn push_status(&self, payload: &Value) -> Option<StatusNotice> {
        let Some(session) = self.session.get() else {
            debug!("status payload pushed before init; ignored");
            return None;
        };
        session.push_status(payload)
    }

    pub fn disconnect(&self) {
        if let Some(session) = self.session.get() {
            session.disconnect();
        }
    }

    fn emit_visibility(&self, visible: bool) {
        if self.events.send(SessionEvent::Visibility(visible)).is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod tests;
