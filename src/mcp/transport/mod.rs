//! Server-side MCP transport abstraction
//!
//! A transport owns one client connection. Inbound messages arrive through
//! [`sse::SseTransport::deliver`] and are handed to a [`MessageHandler`];
//! whatever the handler answers goes back to the client as an [`SseEvent`].
//!
//! - [`sse::SseTransport`] -- HTTP+SSE transport: events flow down a
//!   long-lived `text/event-stream` response, messages come up via POST.

pub mod sse;

use async_trait::async_trait;

use crate::mcp::auth::AuthContext;
use crate::mcp::types::{JsonRpcRequest, JsonRpcResponse};

/// Processes one inbound JSON-RPC message.
///
/// Implementations must not assume anything about the transport the message
/// arrived on. `auth` is the context verified for the HTTP request that
/// carried this particular message.
#[async_trait]
pub trait MessageHandler: Send + Sync + std::fmt::Debug {
    /// Handle `request`, returning the response to send back, or `None` for
    /// notifications.
    async fn handle(
        &self,
        request: JsonRpcRequest,
        auth: Option<AuthContext>,
    ) -> Option<JsonRpcResponse>;
}

/// An outbound event on a session's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Handshake telling the client where to POST messages
    Endpoint(String),
    /// A serialized JSON-RPC message
    Message(String),
}

impl SseEvent {
    /// SSE `event:` field for this event.
    pub fn name(&self) -> &'static str {
        match self {
            SseEvent::Endpoint(_) => "endpoint",
            SseEvent::Message(_) => "message",
        }
    }

    /// SSE `data:` field for this event.
    pub fn data(&self) -> &str {
        match self {
            SseEvent::Endpoint(data) | SseEvent::Message(data) => data,
        }
    }
}
