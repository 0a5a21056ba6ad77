use super::*;
use std::sync::Mutex;

use endpoint::Provenance;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches these variables.
unsafe fn clear_pollchat_env() {
    unsafe {
        std::env::remove_var("POLLCHAT_BASE_URL");
        std::env::remove_var("POLLCHAT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("POLLCHAT_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_pollchat_env() };

    let cfg = ClientConfig::from_env();
    assert_eq!(cfg.base_url, None);
    assert_eq!(cfg.timeouts, ClientTimeouts::default());
    assert_eq!(
        cfg.timeouts,
        ClientTimeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_pollchat_env();
        std::env::set_var("POLLCHAT_BASE_URL", "  http://127.0.0.1:8080/chat_server.php/ ");
        std::env::set_var("POLLCHAT_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("POLLCHAT_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = ClientConfig::from_env();
    assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:8080/chat_server.php/"));
    assert_eq!(cfg.timeouts, ClientTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_pollchat_env() };
}

#[test]
fn from_env_ignores_blank_url_and_bad_timeouts() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_pollchat_env();
        std::env::set_var("POLLCHAT_BASE_URL", "   ");
        std::env::set_var("POLLCHAT_REQUEST_TIMEOUT_SECS", "soon");
        std::env::set_var("POLLCHAT_CONNECT_TIMEOUT_SECS", "0");
    }

    let cfg = ClientConfig::from_env();
    assert_eq!(cfg.base_url, None);
    assert_eq!(cfg.timeouts, ClientTimeouts::default());

    unsafe { clear_pollchat_env() };
}

#[test]
fn resolve_endpoint_prefers_configured_url() {
    let cfg = ClientConfig { base_url: Some("http://localhost:8080/chat_server.php/".into()), ..Default::default() };
    let resolved = cfg.resolve_endpoint();
    assert_eq!(resolved.as_str(), "http://localhost:8080/chat_server.php");
    assert_eq!(resolved.provenance(), Provenance::Configured);
}

#[test]
fn resolve_endpoint_falls_back_to_builtin_candidates() {
    let resolved = ClientConfig::default().resolve_endpoint();
    assert_eq!(resolved.as_str(), "https://relay.example.org/srv/chat_server.php");
    assert!(resolved.is_verified());
}
