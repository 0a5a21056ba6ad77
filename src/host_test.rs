use super::*;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::json;

use crate::net::{Ack, PollResponse, StatusResponse};
use crate::session::Phase;

struct StubApi {
    status_calls: Mutex<usize>,
}

impl StubApi {
    fn new() -> Arc<Self> {
        Arc::new(Self { status_calls: Mutex::new(0) })
    }
}

#[async_trait::async_trait]
impl ChatApi for StubApi {
    async fn join(&self, _username: &str) -> Result<Ack, ApiError> {
        Ok(Ack::ok())
    }

    async fn send(&self, _username: &str, _message: &str) -> Result<Ack, ApiError> {
        Ok(Ack::ok())
    }

    async fn poll(&self, _since: i64, _username: &str) -> Result<PollResponse, ApiError> {
        Ok(PollResponse { success: true, ..Default::default() })
    }

    async fn status(&self) -> Result<StatusResponse, ApiError> {
        *self.status_calls.lock().unwrap() += 1;
        Ok(StatusResponse {
            success: true,
            kind: Some("json".into()),
            data: json!({ "ok": true }),
            source: Some("stub".into()),
            error: None,
        })
    }
}

fn drain(rx: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// =============================================================================
// visibility
// =============================================================================

#[test]
fn visibility_starts_hidden_and_reports_changes_only() {
    let (host, mut rx) = ChatHost::new(ClientConfig::default());
    assert!(!host.is_visible());

    host.hide();
    host.show();
    host.show();
    assert!(host.is_visible());
    assert!(!host.toggle());
    assert!(host.toggle());
    host.hide();

    assert_eq!(
        drain(&mut rx),
        vec![
            SessionEvent::Visibility(true),
            SessionEvent::Visibility(false),
            SessionEvent::Visibility(true),
            SessionEvent::Visibility(false),
        ]
    );
}

// =============================================================================
// init
// =============================================================================

#[test]
fn init_with_outside_runtime_skips_status_check() {
    let (host, mut rx) = ChatHost::new(ClientConfig::default());
    let api = StubApi::new();
    let session = host.init_with(api.clone());
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(*api.status_calls.lock().unwrap(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn init_is_once_and_checks_status() {
    let (host, mut rx) = ChatHost::new(ClientConfig::default());
    let first_api = StubApi::new();
    let second_api = StubApi::new();

    let first = host.init_with(first_api.clone());
    let second = host.init_with(second_api.clone());
    assert_eq!(first.id(), second.id());
    assert_eq!(host.session().map(ChatSession::id), Some(first.id()));
    assert!(host.init().is_ok_and(|s| s.id() == first.id()));
    assert!(host.endpoint().is_none());

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
    assert!(matches!(event, Some(SessionEvent::Status(StatusNotice::Report(_)))));
    assert_eq!(*first_api.status_calls.lock().unwrap(), 1);
    assert_eq!(*second_api.status_calls.lock().unwrap(), 0);
}

#[test]
fn init_rejects_unusable_configured_endpoint() {
    let config = ClientConfig { base_url: Some("not a url".into()), ..Default::default() };
    let (host, _rx) = ChatHost::new(config);
    assert!(matches!(host.init(), Err(ApiError::InvalidBaseUrl(_))));
    assert!(host.session().is_none());
    assert_eq!(host.endpoint().map(ResolvedEndpoint::provenance), Some(Provenance::Configured));
}

#[test]
fn init_uses_builtin_endpoint_without_override() {
    let (host, _rx) = ChatHost::new(ClientConfig::default());
    host.init().unwrap();
    let endpoint = host.endpoint().unwrap();
    assert_eq!(endpoint.as_str(), "https://relay.example.org/srv/chat_server.php");
    assert!(endpoint.is_verified());
}

// =============================================================================
// forwarding
// =============================================================================

#[test]
fn push_status_and_disconnect_before_init_are_ignored() {
    let (host, mut rx) = ChatHost::new(ClientConfig::default());
    assert!(host.push_status(&json!({ "ok": true, "data": "hi" })).is_none());
    host.disconnect();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn forwards_to_session_after_init() {
    let (host, mut rx) = ChatHost::new(ClientConfig::default());
    let session = host.init_with(StubApi::new());
    session.join("alice").await.unwrap();

    host.disconnect();
    assert_eq!(session.phase(), Phase::Idle);

    let connectivity: Vec<SessionEvent> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::Connectivity(_)))
        .collect();
    assert_eq!(connectivity, vec![SessionEvent::Connectivity(true), SessionEvent::Connectivity(false)]);
}
