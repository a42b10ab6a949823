//! HTTP layer: axum router, request handlers, and server bootstrap
//!
//! Routes:
//!
//! - `GET /.well-known/oauth-authorization-server` -- the identity
//!   provider's metadata, unauthenticated
//! - `GET /sse` -- opens a session event stream (bearer token required)
//! - `POST <message_path>?sessionId=<id>` -- delivers a JSON-RPC message to
//!   a session (bearer token required)

use std::convert::Infallible;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::{Config, ServerConfig};
use crate::error::{Result, RoutingError, WhoamiError};
use crate::mcp::auth::bearer::require_bearer;
use crate::mcp::auth::discovery::{fetch_server_config, AuthorizationServerMetadata};
use crate::mcp::auth::{AuthContext, TokenVerifier, UserinfoVerifier};
use crate::mcp::server::McpServer;
use crate::mcp::session::SessionRegistry;
use crate::mcp::transport::SseEvent;
use crate::tools::ToolRegistry;

/// Path of the delegated discovery route.
pub const DISCOVERY_PATH: &str = "/.well-known/oauth-authorization-server";
/// Path of the event stream route.
pub const SSE_PATH: &str = "/sse";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Open sessions
    pub registry: SessionRegistry,
    /// Bearer-token verifier
    pub verifier: Arc<dyn TokenVerifier>,
    /// Identity provider metadata re-served by the discovery route
    pub metadata: Arc<AuthorizationServerMetadata>,
    /// SSE keep-alive interval
    pub keep_alive: Duration,
}

impl AppState {
    /// Assemble state around `verifier` with the built-in tools.
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        metadata: AuthorizationServerMetadata,
        server: &ServerConfig,
    ) -> Self {
        let mcp = Arc::new(McpServer::new(Arc::new(ToolRegistry::with_builtin_tools())));
        Self {
            registry: SessionRegistry::new(mcp, server.message_path.clone()),
            verifier,
            metadata: Arc::new(metadata),
            keep_alive: Duration::from_secs(server.keep_alive_seconds),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(SSE_PATH, get(sse_handler))
        .route(state.registry.message_path(), post(message_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.verifier),
            require_bearer,
        ));

    Router::new()
        .route(DISCOVERY_PATH, get(discovery_handler))
        .merge(protected)
        .with_state(state)
}

async fn discovery_handler(State(state): State<AppState>) -> Json<AuthorizationServerMetadata> {
    Json(state.metadata.as_ref().clone())
}

async fn sse_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    let (tx, rx) = mpsc::unbounded_channel();
    let (session_id, _transport, guard) = match state.registry.open_session(tx) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open session");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    tracing::debug!(session_id = %session_id, subject = %auth.subject, "Event stream opened");

    // The guard lives as long as the response stream.
    let events = UnboundedReceiverStream::new(rx).map(move |event| {
        let _session = &guard;
        Ok::<_, Infallible>(to_sse_event(&event))
    });

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(state.keep_alive))
        .into_response()
}

fn to_sse_event(event: &SseEvent) -> Event {
    Event::default().event(event.name()).data(event.data())
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(auth): Extension<AuthContext>,
    body: Bytes,
) -> Response {
    let result = match query.session_id.as_deref() {
        Some(session_id) => state.registry.route_message(session_id, &body, Some(auth)),
        None => Err(RoutingError::SessionNotFound),
    };

    match result {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(RoutingError::SessionNotFound | RoutingError::TransportClosed) => (
            StatusCode::BAD_REQUEST,
            RoutingError::SessionNotFound.to_string(),
        )
            .into_response(),
        Err(e @ RoutingError::InvalidMessage(_)) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Discover the identity provider, then serve until interrupted.
///
/// # Errors
///
/// Returns an error if discovery fails, the metadata has no userinfo
/// endpoint, or the listener cannot be bound.
pub async fn serve(config: Config) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(config.verify_timeout())
        .build()
        .map_err(WhoamiError::Http)?;
    let issuer = config.issuer_url()?;
    let metadata = fetch_server_config(&http, &issuer, config.auth.discovery).await?;

    let verifier = UserinfoVerifier::from_metadata(&metadata, config.verify_timeout())?;
    tracing::info!(userinfo = %verifier.userinfo_endpoint(), "Verifying tokens via userinfo");

    let state = AppState::new(Arc::new(verifier), metadata, &config.server);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .map_err(|e| {
            WhoamiError::Server(format!("failed to bind {}: {}", config.bind_address(), e))
        })?;
    tracing::info!(address = %listener.local_addr()?, "whoami-mcp listening");

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result.map_err(|e| WhoamiError::Server(e.to_string()))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
