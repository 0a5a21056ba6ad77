//! Client configuration parsed from environment variables.

use endpoint::{EndpointResolver, ResolvedEndpoint};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Explicit service address. Skips candidate resolution when set.
    pub base_url: Option<String>,
    pub timeouts: ClientTimeouts,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `POLLCHAT_BASE_URL`: service address override (blank means unset)
    /// - `POLLCHAT_REQUEST_TIMEOUT_SECS`: default 10
    /// - `POLLCHAT_CONNECT_TIMEOUT_SECS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("POLLCHAT_BASE_URL")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        let timeouts = ClientTimeouts {
            request_secs: env_parse_secs("POLLCHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_secs("POLLCHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        Self { base_url, timeouts }
    }

    /// The configured override, or the first verified built-in candidate.
    #[must_use]
    pub fn resolve_endpoint(&self) -> ResolvedEndpoint {
        match &self.base_url {
            Some(url) => ResolvedEndpoint::configured(url.as_str()),
            None => EndpointResolver::builtin().resolve(),
        }
    }
}

/// Zero is treated as unset; a zero timeout would fail every request.
fn env_parse_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
