//! Client for a polling group chat service.
//!
//! DESIGN
//! ======
//! [`ChatHost`] is the bootstrap: it resolves the service address (see the
//! `endpoint` crate), builds the HTTP transport and owns exactly one
//! [`ChatSession`]. The session drives join/send/poll against a [`ChatApi`]
//! and reports everything a renderer needs as [`SessionEvent`]s on one
//! channel. Nothing here paints; the renderer is whoever drains the channel.

pub mod config;
pub mod host;
pub mod net;
pub mod session;

pub use config::{ClientConfig, ClientTimeouts};
pub use endpoint::{EndpointResolver, Provenance, ResolvedEndpoint};
pub use host::ChatHost;
pub use net::{ApiError, ChatApi, ChatMessage, HttpChatApi, MessageKind};
pub use session::status::{StatusNotice, StatusReport};
pub use session::{ChatError, ChatSession, Delivery, EventReceiver, Phase, PollOutcome, SessionEvent, SessionSnapshot};
