//! One-time status banner.
//!
//! DESIGN
//! ======
//! A status payload arrives either fetched (`?action=status`) or pushed by an
//! embedding collaborator. Both are reduced to a [`StatusNotice`] and passed
//! through a [`StatusGate`], which lets at most one [`StatusNotice::Report`]
//! through per session. An [`StatusNotice::Unavailable`] notice is delivered
//! while the gate is open but does not close it, so a later good payload can
//! still be shown.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::net::{ApiError, StatusResponse, truthy};

pub const DEFAULT_SOURCE: &str = "local status";
const HEALTHY_HEADLINE: &str = "All systems operational.";
const UNHEALTHY_HEADLINE: &str = "Issues detected.";

// =============================================================================
// NOTICE
// =============================================================================

/// Renderable content of a status payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Present for structured (`json`) payloads only.
    pub healthy: Option<bool>,
    pub paragraphs: Vec<String>,
    /// Extra detail shown under a separator; empty when there is none.
    pub details: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNotice {
    Report(StatusReport),
    /// The status could not be obtained; carries the reason.
    Unavailable(String),
}

impl StatusNotice {
    /// Interpret a fetched status response.
    #[must_use]
    pub fn from_response(response: &StatusResponse) -> Self {
        if !response.success {
            let reason = response.error.clone().unwrap_or_else(|| "service reported failure".into());
            return Self::Unavailable(reason);
        }
        Self::Report(StatusReport::from_payload(
            response.kind.as_deref(),
            &response.data,
            response.source.as_deref(),
        ))
    }

    #[must_use]
    pub fn from_result(result: Result<StatusResponse, ApiError>) -> Self {
        match result {
            Ok(response) => Self::from_response(&response),
            Err(error) => Self::Unavailable(error.to_string()),
        }
    }

    /// Interpret a pushed `{ ok, type, data, url, error }` payload.
    ///
    /// Returns `None` for payloads without an `ok` field.
    #[must_use]
    pub fn from_pushed(payload: &Value) -> Option<Self> {
        let ok = payload.get("ok")?;
        if !truthy(ok) {
            let reason = payload.get("error").and_then(display_text).unwrap_or_else(|| "error".into());
            return Some(Self::Unavailable(reason));
        }
        let kind = payload.get("type").and_then(Value::as_str);
        let data = payload.get("data").unwrap_or(&Value::Null);
        let source = payload.get("url").and_then(Value::as_str);
        Some(Self::Report(StatusReport::from_payload(kind, data, source)))
    }

    #[must_use]
    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

impl StatusReport {
    /// Build a report from a payload's `type`, `data` and source.
    #[must_use]
    pub fn from_payload(kind: Option<&str>, data: &Value, source: Option<&str>) -> Self {
        let source = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
            .to_string();

        if kind != Some("json") {
            let text = display_text(data).unwrap_or_default();
            return Self { healthy: None, paragraphs: paragraphs(&text), details: Vec::new(), source };
        }

        let healthy = health(data);
        let headline = ["message", "msg", "statusText"]
            .iter()
            .find_map(|key| data.get(*key).and_then(display_text))
            .unwrap_or_else(|| {
                let fallback = if healthy { HEALTHY_HEADLINE } else { UNHEALTHY_HEADLINE };
                fallback.to_string()
            });
        let details = ["details", "services"]
            .iter()
            .find_map(|key| data.get(*key).filter(|v| truthy(v)))
            .map(|extra| match extra {
                Value::String(text) => paragraphs(text),
                other => paragraphs(&serde_json::to_string_pretty(other).unwrap_or_default()),
            })
            .unwrap_or_default();

        Self { healthy: Some(healthy), paragraphs: paragraphs(&headline), details, source }
    }
}

/// `ok` wins when set; then `status == "ok"`; then `healthy`.
fn health(data: &Value) -> bool {
    if let Some(ok) = data.get("ok").filter(|v| !v.is_null()) {
        return truthy(ok);
    }
    if let Some(status) = data.get("status").filter(|v| !v.is_null()) {
        return status.as_str() == Some("ok");
    }
    data.get("healthy").is_some_and(truthy)
}

/// Split text into paragraphs on blank lines. Single newlines stay inside a
/// paragraph.
#[must_use]
pub fn paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .trim()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Non-empty strings as-is, numbers and `true` stringified, other values skipped.
fn display_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".into()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string_pretty(value).ok(),
        _ => None,
    }
}

// =============================================================================
// GATE
// =============================================================================

/// Session-scoped "already shown" marker.
#[derive(Debug, Default)]
pub struct StatusGate {
    shown: AtomicBool,
}

impl StatusGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::Acquire)
    }

    /// Pass `notice` through the gate. A report closes it.
    #[must_use]
    pub fn admit(&self, notice: StatusNotice) -> Option<StatusNotice> {
        match notice {
            StatusNotice::Report(_) => (!self.shown.swap(true, Ordering::AcqRel)).then_some(notice),
            StatusNotice::Unavailable(_) => (!self.is_shown()).then_some(notice),
        }
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
