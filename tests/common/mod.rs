//! Shared helpers for integration tests
//!
//! - a wiremock identity provider serving discovery metadata and userinfo
//! - an in-process whoami-mcp server bound to an ephemeral port
//! - a minimal SSE reader over a `reqwest` byte stream

#![allow(dead_code)]

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use whoami_mcp::config::ServerConfig;
use whoami_mcp::mcp::auth::discovery::AuthorizationServerMetadata;
use whoami_mcp::mcp::auth::UserinfoVerifier;
use whoami_mcp::server::{build_router, AppState};

pub const GOOD_TOKEN: &str = "good-token";

/// Discovery document for a provider rooted at `base_url`.
pub fn metadata_body(base_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{}/authorize", base_url),
        "token_endpoint": format!("{}/token", base_url),
        "userinfo_endpoint": format!("{}/userinfo", base_url),
        "response_types_supported": ["code"]
    })
}

/// Start a mock provider that accepts [`GOOD_TOKEN`] and rejects everything
/// else with `401`.
pub async fn mock_idp() -> MockServer {
    let idp = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", format!("Bearer {}", GOOD_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"sub":"u1","name":"Ann"}"#.as_bytes().to_vec(),
            "application/json",
        ))
        .mount(&idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&idp)
        .await;

    idp
}

/// A running whoami-mcp server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server verifying tokens against `idp`.
pub async fn start_server(idp: &MockServer) -> TestServer {
    let metadata: AuthorizationServerMetadata =
        serde_json::from_value(metadata_body(&idp.uri())).unwrap();
    let verifier = UserinfoVerifier::from_metadata(&metadata, Duration::from_secs(5)).unwrap();
    let state = AppState::new(Arc::new(verifier), metadata, &ServerConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, state }
}

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    pub event: String,
    pub data: String,
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Reads events from an open `text/event-stream` response.
pub struct SseReader {
    stream: ByteStream,
    buffer: String,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    /// Next event within `deadline`, skipping keep-alive comments.
    pub async fn next_event(&mut self, deadline: Duration) -> Option<ReceivedEvent> {
        tokio::time::timeout(deadline, self.read_event())
            .await
            .ok()
            .flatten()
    }

    async fn read_event(&mut self) -> Option<ReceivedEvent> {
        loop {
            while let Some(pos) = self.buffer.find("\n\n") {
                let block = self.buffer[..pos].to_string();
                self.buffer = self.buffer[pos + 2..].to_string();
                if let Some(event) = parse_block(&block) {
                    return Some(event);
                }
            }

            let chunk = self.stream.next().await?.ok()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

fn parse_block(block: &str) -> Option<ReceivedEvent> {
    let mut event = String::from("message");
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim_start().to_string());
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    Some(ReceivedEvent {
        event,
        data: data_lines.join("\n"),
    })
}

/// Open `GET /sse` with `token` and read the `endpoint` handshake.
///
/// Returns the reader and the advertised message URI.
pub async fn open_session(
    client: &reqwest::Client,
    server: &TestServer,
    token: &str,
) -> (SseReader, String) {
    let response = client
        .get(server.url("/sse"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let mut reader = SseReader::new(response);
    let handshake = reader
        .next_event(Duration::from_secs(5))
        .await
        .expect("endpoint event");
    assert_eq!(handshake.event, "endpoint");
    (reader, handshake.data)
}

/// `sessionId` value from an endpoint URI.
pub fn session_id_of(endpoint: &str) -> String {
    endpoint
        .split_once("sessionId=")
        .map(|(_, id)| id.to_string())
        .expect("sessionId in endpoint")
}
