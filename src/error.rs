//! Error types for whoami-mcp
//!
//! This module defines all error types used throughout the server,
//! using `thiserror` for ergonomic error handling.
//!
//! Two small, closed taxonomies sit on the request path:
//!
//! - [`AuthError`] -- produced by the bearer-token verifier; every variant
//!   surfaces to the client as a `401 Unauthorized`.
//! - [`RoutingError`] -- produced when an inbound message cannot be handed to
//!   a live session transport; surfaces as a `400 Bad Request`.
//!
//! Everything else (configuration, discovery, I/O while bootstrapping) is a
//! [`WhoamiError`] carried inside [`anyhow::Error`].

use thiserror::Error;

/// Main error type for whoami-mcp operations
///
/// Covers failures outside the per-request auth and routing paths:
/// configuration loading, identity-provider discovery, and server startup.
#[derive(Error, Debug)]
pub enum WhoamiError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity-provider metadata discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// HTTP server bind or serve failure
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure to authenticate a request's bearer token.
///
/// None of these are retried. The HTTP layer maps all of them to `401`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer credential was presented.
    #[error("Missing bearer token")]
    Unauthenticated,

    /// The identity provider rejected the credential or could not be reached.
    ///
    /// `status` is `None` when no HTTP response was received at all
    /// (connection failure, timeout).
    #[error("Token verification failed (status: {}): {body}", status_text(.status))]
    TokenVerificationFailed {
        /// HTTP status returned by the userinfo endpoint, if any
        status: Option<u16>,
        /// Response body, or the transport error text
        body: String,
    },

    /// The identity provider answered but the profile has no usable subject.
    #[error("Invalid token: userinfo response has no subject")]
    InvalidToken,
}

impl AuthError {
    /// OAuth 2.0 bearer error code (RFC 6750 section 3.1) for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "invalid_request",
            AuthError::TokenVerificationFailed { .. } | AuthError::InvalidToken => "invalid_token",
        }
    }
}

fn status_text(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

/// Failure to deliver an inbound message to a session transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No transport is registered under the requested session id.
    #[error("No transport found for sessionId")]
    SessionNotFound,

    /// The payload is not a JSON-RPC 2.0 message.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The session is registered but its event stream has already closed.
    #[error("Transport closed")]
    TransportClosed,
}

/// Result type alias for whoami-mcp operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = WhoamiError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_discovery_error_display() {
        let error = WhoamiError::Discovery("metadata not found".to_string());
        assert_eq!(error.to_string(), "Discovery error: metadata not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let error: WhoamiError = io_error.into();
        assert!(matches!(error, WhoamiError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: WhoamiError = json_error.into();
        assert!(matches!(error, WhoamiError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: WhoamiError = yaml_error.into();
        assert!(matches!(error, WhoamiError::Yaml(_)));
    }

    #[test]
    fn test_url_error_conversion() {
        let url_error = url::Url::parse("not a url").unwrap_err();
        let error: WhoamiError = url_error.into();
        assert!(matches!(error, WhoamiError::Url(_)));
    }

    #[test]
    fn test_session_not_found_display_is_literal() {
        assert_eq!(
            RoutingError::SessionNotFound.to_string(),
            "No transport found for sessionId"
        );
    }

    #[test]
    fn test_token_verification_failed_display_with_status() {
        let error = AuthError::TokenVerificationFailed {
            status: Some(401),
            body: "expired".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Token verification failed (status: 401): expired"
        );
    }

    #[test]
    fn test_token_verification_failed_display_without_status() {
        let error = AuthError::TokenVerificationFailed {
            status: None,
            body: "connection refused".to_string(),
        };
        assert!(error.to_string().contains("status: none"));
    }

    #[test]
    fn test_auth_error_codes() {
        assert_eq!(AuthError::Unauthenticated.error_code(), "invalid_request");
        assert_eq!(AuthError::InvalidToken.error_code(), "invalid_token");
        assert_eq!(
            AuthError::TokenVerificationFailed {
                status: Some(500),
                body: String::new()
            }
            .error_code(),
            "invalid_token"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WhoamiError>();
        assert_send_sync::<AuthError>();
        assert_send_sync::<RoutingError>();
    }
}
