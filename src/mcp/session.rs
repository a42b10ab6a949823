//! Session registry and message routing
//!
//! The registry maps session ids to live [`SseTransport`]s. It is the only
//! state shared between request handlers. A single mutex guards the map; it
//! is never held across an `.await` or while a message is being delivered.
//!
//! Sessions are removed by their [`SessionGuard`], which the SSE response
//! stream owns. When the client disconnects axum drops the stream, the guard
//! drops with it, and the entry disappears exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::RoutingError;
use crate::mcp::auth::AuthContext;
use crate::mcp::transport::sse::{EventSink, SseTransport};
use crate::mcp::transport::MessageHandler;

type SessionMap = HashMap<String, Arc<SseTransport>>;
type IdGenerator = dyn Fn() -> String + Send + Sync;

/// Registry of open sessions.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<SessionMap>>,
    handler: Arc<dyn MessageHandler>,
    message_path: String,
    next_id: Arc<IdGenerator>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("message_path", &self.message_path)
            .finish()
    }
}

impl SessionRegistry {
    /// Create an empty registry whose transports deliver to `handler` and
    /// advertise `message_path` in their handshake.
    pub fn new(handler: Arc<dyn MessageHandler>, message_path: impl Into<String>) -> Self {
        Self::with_id_generator(handler, message_path, || Uuid::new_v4().to_string())
    }

    /// Like [`SessionRegistry::new`] with a custom session id source.
    pub fn with_id_generator<F>(
        handler: Arc<dyn MessageHandler>,
        message_path: impl Into<String>,
        next_id: F,
    ) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            handler,
            message_path: message_path.into(),
            next_id: Arc::new(next_id),
        }
    }

    /// Path advertised in `endpoint` events.
    pub fn message_path(&self) -> &str {
        &self.message_path
    }

    /// Register a new session around `sink` and send its handshake.
    ///
    /// A fresh id is drawn until one not currently registered comes up, so
    /// an id is never shared by two live sessions.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::TransportClosed`] if the receiving half of
    /// `sink` is already gone; nothing is left registered in that case.
    pub fn open_session(
        &self,
        sink: EventSink,
    ) -> Result<(String, Arc<SseTransport>, SessionGuard), RoutingError> {
        let transport = {
            let mut sessions = self.sessions.lock();
            let session_id = loop {
                let candidate = (self.next_id)();
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
                tracing::debug!("Session id collision, drawing another");
            };

            let transport = Arc::new(SseTransport::new(
                session_id.clone(),
                sink,
                Arc::clone(&self.handler),
            ));
            sessions.insert(session_id, Arc::clone(&transport));
            transport
        };

        let guard = SessionGuard {
            sessions: Arc::clone(&self.sessions),
            transport: Arc::clone(&transport),
        };

        transport.start(&self.message_path)?;

        tracing::info!(session_id = %transport.session_id(), "Session opened");
        Ok((transport.session_id().to_string(), transport, guard))
    }

    /// Look up the transport for `session_id`.
    pub fn get(&self, session_id: &str) -> Option<Arc<SseTransport>> {
        self.sessions.lock().get(session_id).cloned()
    }

    /// `true` if `session_id` is registered.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Remove `session_id`. Returns `true` only when an entry was removed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// `true` when no session is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Deliver `payload` to the transport registered under `session_id`.
    ///
    /// The registry is never modified here.
    ///
    /// # Errors
    ///
    /// - [`RoutingError::SessionNotFound`] for an unknown id.
    /// - Any error from [`SseTransport::deliver`].
    pub fn route_message(
        &self,
        session_id: &str,
        payload: &[u8],
        auth: Option<AuthContext>,
    ) -> Result<(), RoutingError> {
        let Some(transport) = self.get(session_id) else {
            tracing::debug!(session_id = %session_id, "No transport for session");
            return Err(RoutingError::SessionNotFound);
        };

        transport.deliver(payload, auth)
    }
}

/// Removes its session from the registry when dropped.
///
/// Only the entry that still points at this guard's transport is removed, so
/// a guard can never evict a different session.
#[derive(Debug)]
pub struct SessionGuard {
    sessions: Arc<Mutex<SessionMap>>,
    transport: Arc<SseTransport>,
}

impl SessionGuard {
    /// The guarded session id.
    pub fn session_id(&self) -> &str {
        self.transport.session_id()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let session_id = self.transport.session_id();
        let mut sessions = self.sessions.lock();
        let owned = sessions
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.transport));
        if owned {
            sessions.remove(session_id);
            drop(sessions);
            tracing::info!(session_id = %session_id, "Session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::transport::SseEvent;
    use crate::mcp::types::{JsonRpcRequest, JsonRpcResponse};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Debug)]
    struct NullHandler;

    #[async_trait]
    impl MessageHandler for NullHandler {
        async fn handle(
            &self,
            request: JsonRpcRequest,
            _auth: Option<AuthContext>,
        ) -> Option<JsonRpcResponse> {
            request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({})))
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(NullHandler), "/messages")
    }

    #[test]
    fn test_open_session_registers_and_sends_endpoint() {
        let registry = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, transport, _guard) = registry.open_session(tx).unwrap();

        assert_eq!(transport.session_id(), id);
        assert!(registry.contains(&id));
        assert_eq!(
            rx.try_recv().unwrap(),
            SseEvent::Endpoint(format!("/messages?sessionId={}", id))
        );
    }

    #[test]
    fn test_ids_unique_and_len_tracks_open_sessions() {
        let registry = registry();
        let mut ids = HashSet::new();
        let mut held = Vec::new();

        for _ in 0..50 {
            let (tx, rx) = mpsc::unbounded_channel();
            let (id, _, guard) = registry.open_session(tx).unwrap();
            assert!(ids.insert(id));
            held.push((rx, guard));
        }
        assert_eq!(registry.len(), 50);

        held.truncate(20);
        assert_eq!(registry.len(), 20);

        held.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_collision_draws_again() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ids = ["dup", "dup", "dup", "fresh"];
        let c = Arc::clone(&counter);
        let registry = SessionRegistry::with_id_generator(Arc::new(NullHandler), "/m", move || {
            let i = c.fetch_add(1, Ordering::SeqCst).min(ids.len() - 1);
            ids[i].to_string()
        });

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (first, _, _g1) = registry.open_session(tx1).unwrap();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let (second, _, _g2) = registry.open_session(tx2).unwrap();

        assert_eq!(first, "dup");
        assert_eq!(second, "fresh");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (id, _, guard) = registry.open_session(tx).unwrap();

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_guard_does_not_evict_newer_session_with_same_id() {
        let registry = SessionRegistry::with_id_generator(Arc::new(NullHandler), "/m", || {
            "same".to_string()
        });
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (_, _, old_guard) = registry.open_session(tx1).unwrap();
        assert!(registry.remove("same"));

        let (tx2, _rx2) = mpsc::unbounded_channel();
        let (_, newer, _new_guard) = registry.open_session(tx2).unwrap();

        drop(old_guard);
        let current = registry.get("same").unwrap();
        assert!(Arc::ptr_eq(&current, &newer));
    }

    #[test]
    fn test_open_session_with_closed_sink_leaves_nothing() {
        let registry = registry();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let err = registry.open_session(tx).unwrap_err();
        assert_eq!(err, RoutingError::TransportClosed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_route_unknown_session_leaves_registry_unchanged() {
        let registry = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_id, _, _guard) = registry.open_session(tx).unwrap();

        let err = registry
            .route_message("nope", br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, None)
            .unwrap_err();
        assert_eq!(err, RoutingError::SessionNotFound);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_route_after_close_is_not_found() {
        let registry = registry();
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, _, guard) = registry.open_session(tx).unwrap();
        drop(guard);
        drop(rx);

        let err = registry
            .route_message(&id, br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#, None)
            .unwrap_err();
        assert_eq!(err, RoutingError::SessionNotFound);
    }

    #[tokio::test]
    async fn test_route_delivers_to_matching_transport_only() {
        let registry = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (a, _, _ga) = registry.open_session(tx_a).unwrap();
        let (_b, _, _gb) = registry.open_session(tx_b).unwrap();
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        registry
            .route_message(&a, br#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#, None)
            .unwrap();

        let event = rx_a.recv().await.unwrap();
        assert!(matches!(event, SseEvent::Message(ref text) if text.contains("\"id\":9")));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_open_and_close() {
        let registry = registry();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let (tx, _rx) = mpsc::unbounded_channel();
                        let (id, _, guard) = registry.open_session(tx).unwrap();
                        assert!(registry.contains(&id));
                        drop(guard);
                        assert!(!registry.contains(&id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
