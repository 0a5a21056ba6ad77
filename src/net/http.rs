//! `reqwest` implementation of [`ChatApi`].

use std::time::Duration;

use endpoint::ResolvedEndpoint;
use reqwest::Url;
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ChatApi;
use super::types::{Ack, ApiError, JoinRequest, PollResponse, SendRequest, StatusResponse};
use crate::config::ClientTimeouts;

pub struct HttpChatApi {
    http: reqwest::Client,
    base: Url,
}

impl HttpChatApi {
    /// Build a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] unless the address parses as an
    /// `http`/`https` URL, or [`ApiError::ClientBuild`] if the TLS backend
    /// cannot be initialized.
    pub fn new(endpoint: &ResolvedEndpoint, timeouts: ClientTimeouts) -> Result<Self, ApiError> {
        let base =
            Url::parse(endpoint.as_str()).map_err(|e| ApiError::InvalidBaseUrl(format!("'{endpoint}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidBaseUrl(format!("'{endpoint}': unsupported scheme")));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL plus `action` and `extra` as encoded query pairs. An existing
    /// query on the base is kept.
    fn action_url(&self, action: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("action", action);
            for (key, value) in extra {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    async fn post_json<T: DeserializeOwned>(&self, action: &str, body: &impl Serialize) -> Result<T, ApiError> {
        debug!(action, "chat request");
        let response = self
            .http
            .post(self.action_url(action, &[]))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, action: &str, extra: &[(&str, &str)]) -> Result<T, ApiError> {
        debug!(action, "chat request");
        let response = self
            .http
            .get(self.action_url(action, extra))
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::HttpStatus { status: status.as_u16() });
    }
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl ChatApi for HttpChatApi {
    async fn join(&self, username: &str) -> Result<Ack, ApiError> {
        self.post_json("join", &JoinRequest { username }).await
    }

    async fn send(&self, username: &str, message: &str) -> Result<Ack, ApiError> {
        self.post_json("send", &SendRequest { username, message }).await
    }

    async fn poll(&self, since: i64, username: &str) -> Result<PollResponse, ApiError> {
        let since = since.to_string();
        self.get_json("poll", &[("since", since.as_str()), ("username", username)])
            .await
    }

    async fn status(&self) -> Result<StatusResponse, ApiError> {
        self.get_json("status", &[]).await
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
