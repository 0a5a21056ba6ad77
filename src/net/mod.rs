//! Transport for the four chat actions.
//!
//! DESIGN
//! ======
//! [`ChatApi`] is the seam between the session and the network. The session
//! only ever holds an `Arc<dyn ChatApi>`; [`HttpChatApi`] is the production
//! implementation and tests substitute scripted mocks.

mod http;
mod types;

pub use http::HttpChatApi;
pub use types::{
    Ack, ApiError, ChatMessage, MessageKind, PollResponse, StatusResponse, parse_cursor, parse_message,
    parse_presence, truthy, unix_now,
};

/// The chat service as seen by a session.
///
/// Every method maps a non-2xx status or unreadable body to an [`ApiError`].
/// Application-level refusals (`success: false`) are returned as data.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// `POST ?action=join` with `{ username }`.
    async fn join(&self, username: &str) -> Result<Ack, ApiError>;

    /// `POST ?action=send` with `{ username, message }`.
    async fn send(&self, username: &str, message: &str) -> Result<Ack, ApiError>;

    /// `GET ?action=poll&since=<since>&username=<username>`.
    async fn poll(&self, since: i64, username: &str) -> Result<PollResponse, ApiError>;

    /// `GET ?action=status`.
    async fn status(&self) -> Result<StatusResponse, ApiError>;
}
