//! Wire types for the chat service and lenient parsing of its payloads.
//!
//! Request bodies are typed. Poll and status payloads keep their loosely
//! shaped parts as `serde_json::Value` and are interpreted field by field,
//! since servers disagree on number vs string timestamps and on the shape of
//! presence entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The resolved address is not a usable URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),

    /// The request did not complete (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-2xx status.
    #[error("service returned status {status}")]
    HttpStatus { status: u16 },

    /// A 2xx body was not the expected JSON.
    #[error("response parse failed: {0}")]
    Parse(String),
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct JoinRequest<'a> {
    pub username: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendRequest<'a> {
    pub username: &'a str,
    pub message: &'a str,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Reply to `join` and `send`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Ack {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
    #[serde(default, deserialize_with = "reason")]
    pub error: Option<String>,
}

impl Ack {
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// Reply to `poll`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PollResponse {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
    #[serde(default)]
    pub messages: Value,
    #[serde(default)]
    pub timestamp: Value,
    #[serde(default)]
    pub active_users: Value,
    #[serde(default, deserialize_with = "reason")]
    pub error: Option<String>,
}

impl PollResponse {
    /// Messages in server order. Entries without a `message` string are dropped.
    #[must_use]
    pub fn chat_messages(&self, now: i64) -> Vec<ChatMessage> {
        self.messages
            .as_array()
            .map(|list| list.iter().filter_map(|m| parse_message(m, now)).collect())
            .unwrap_or_default()
    }

    /// Whether `messages` is a non-empty list.
    #[must_use]
    pub fn has_messages(&self) -> bool {
        self.messages.as_array().is_some_and(|list| !list.is_empty())
    }

    /// Replacement presence snapshot, when the payload carries one.
    #[must_use]
    pub fn presence(&self) -> Option<Vec<String>> {
        parse_presence(&self.active_users)
    }

    /// Server-supplied cursor, when present and positive.
    #[must_use]
    pub fn cursor(&self) -> Option<i64> {
        parse_cursor(&self.timestamp)
    }
}

/// Reply to `status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusResponse {
    #[serde(default, deserialize_with = "flag")]
    pub success: bool,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "reason")]
    pub error: Option<String>,
}

/// Loose truthiness: non-zero numbers and non-empty strings count; `0`, `""` and `null` do not.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| truthy(&value))
}

/// Any non-null `error` becomes text; strings are kept verbatim.
fn reason<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    System,
    User { author: String },
}

/// One chat line as delivered by a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub body: String,
    /// Unix seconds.
    pub timestamp: i64,
}

impl ChatMessage {
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::System => None,
            MessageKind::User { author } => Some(author),
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self.kind, MessageKind::System)
    }

    /// True for a user message written under `alias`.
    #[must_use]
    pub fn is_from(&self, alias: &str) -> bool {
        self.author() == Some(alias)
    }
}

/// Parse one wire message. A missing or non-numeric timestamp becomes `now`.
#[must_use]
pub fn parse_message(value: &Value, now: i64) -> Option<ChatMessage> {
    let body = value.get("message").and_then(Value::as_str)?;
    let kind = if value.get("type").and_then(Value::as_str) == Some("system") {
        MessageKind::System
    } else {
        let author = value.get("username").and_then(Value::as_str).unwrap_or("unknown");
        MessageKind::User { author: author.to_string() }
    };
    let timestamp = value.get("timestamp").and_then(number_secs).unwrap_or(now);
    Some(ChatMessage { kind, body: body.to_string(), timestamp })
}

/// Usernames from `active_users`: plain strings, or objects with `username`.
#[must_use]
pub fn parse_presence(value: &Value) -> Option<Vec<String>> {
    let list = value.as_array()?;
    Some(
        list.iter()
            .filter_map(|entry| match entry {
                Value::String(name) => Some(name.clone()),
                Value::Object(fields) => fields.get("username").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
    )
}

/// A poll cursor. Numeric strings are accepted; zero and below count as absent.
#[must_use]
pub fn parse_cursor(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::String(raw) => raw.trim().parse::<i64>().ok(),
        other => number_secs(other),
    };
    secs.filter(|secs| *secs > 0)
}

#[allow(clippy::cast_possible_truncation)]
fn number_secs(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

/// Current wall-clock time in Unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
