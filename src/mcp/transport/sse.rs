//! HTTP+SSE transport (MCP protocol revision 2024-11-05)
//!
//! The client holds a `GET` request open and receives events; it sends
//! messages with separate `POST` requests addressed by session id. The first
//! event on every stream is `endpoint`, whose data is the URI to POST to.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::RoutingError;
use crate::mcp::auth::AuthContext;
use crate::mcp::transport::{MessageHandler, SseEvent};
use crate::mcp::types::JsonRpcRequest;

/// Sending half of a session's event stream.
pub type EventSink = mpsc::UnboundedSender<SseEvent>;

/// One SSE connection bound to one session id.
#[derive(Debug)]
pub struct SseTransport {
    session_id: String,
    sink: EventSink,
    handler: Arc<dyn MessageHandler>,
}

impl SseTransport {
    /// Wrap `sink` as the transport for `session_id`.
    pub fn new(session_id: impl Into<String>, sink: EventSink, handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            session_id: session_id.into(),
            sink,
            handler,
        }
    }

    /// The session this transport belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// `true` once the client side of the stream has gone away.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed()
    }

    /// Emit the `endpoint` handshake event.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::TransportClosed`] if the stream is gone.
    pub fn start(&self, message_path: &str) -> Result<(), RoutingError> {
        self.send(SseEvent::Endpoint(endpoint_uri(message_path, &self.session_id)))
    }

    /// Push an event down the stream.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::TransportClosed`] if the stream is gone.
    pub fn send(&self, event: SseEvent) -> Result<(), RoutingError> {
        self.sink
            .send(event)
            .map_err(|_| RoutingError::TransportClosed)
    }

    /// Accept an inbound message for this session.
    ///
    /// The payload is validated synchronously; processing and the reply are
    /// spawned onto the runtime so the caller can acknowledge immediately.
    ///
    /// # Errors
    ///
    /// - [`RoutingError::InvalidMessage`] when the payload is not a JSON-RPC
    ///   2.0 request or notification.
    /// - [`RoutingError::TransportClosed`] when the stream has gone away.
    pub fn deliver(&self, payload: &[u8], auth: Option<AuthContext>) -> Result<(), RoutingError> {
        let request = JsonRpcRequest::parse(payload).map_err(RoutingError::InvalidMessage)?;

        if self.is_closed() {
            return Err(RoutingError::TransportClosed);
        }

        tracing::debug!(session_id = %self.session_id, method = %request.method, "Delivering message");

        let handler = Arc::clone(&self.handler);
        let sink = self.sink.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            let Some(response) = handler.handle(request, auth).await else {
                return;
            };

            match serde_json::to_string(&response) {
                Ok(text) => {
                    if sink.send(SseEvent::Message(text)).is_err() {
                        tracing::warn!(session_id = %session_id, "Stream closed before response was sent");
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to serialize response");
                }
            }
        });

        Ok(())
    }
}

/// `<message_path>?sessionId=<id>`
pub fn endpoint_uri(message_path: &str, session_id: &str) -> String {
    format!("{}?sessionId={}", message_path, session_id)
}
