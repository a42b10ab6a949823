//! Bearer-token middleware for the axum router
//!
//! Every protected route runs [`require_bearer`] first. On success the
//! verified [`AuthContext`] is inserted into the request extensions, where
//! handlers pick it up with `Extension<AuthContext>`. On failure the request
//! never reaches the handler and the client receives `401 Unauthorized`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::AuthError;
use crate::mcp::auth::verifier::TokenVerifier;

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Returns `None` when the header
/// is absent, not valid UTF-8, uses another scheme, or carries an empty
/// token.
///
/// # Examples
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use whoami_mcp::mcp::auth::bearer::extract_bearer;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
/// assert_eq!(extract_bearer(&headers), Some("abc"));
/// ```
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the request's bearer token, then run the rest of the stack.
///
/// Use with [`axum::middleware::from_fn_with_state`].
pub async fn require_bearer(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_bearer(req.headers()).map(str::to_owned);

    match verifier.verify(token.as_deref()).await {
        Ok(auth) => {
            tracing::debug!(subject = %auth.subject, path = %req.uri().path(), "Request authenticated");
            req.extensions_mut().insert(auth);
            next.run(req).await
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %req.uri().path(), "Rejected request");
            Unauthorized(err).into_response()
        }
    }
}

/// `401 Unauthorized` carrying an RFC 6750 challenge.
#[derive(Debug)]
pub struct Unauthorized(pub AuthError);

impl Unauthorized {
    fn challenge(&self) -> HeaderValue {
        if self.0 == AuthError::Unauthenticated {
            return HeaderValue::from_static("Bearer");
        }

        let description: String = self
            .0
            .to_string()
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| if c == '"' || c == '\\' { '\'' } else { c })
            .collect();

        HeaderValue::from_str(&format!(
            "Bearer error=\"{}\", error_description=\"{}\"",
            self.0.error_code(),
            description
        ))
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer error=\"invalid_token\""))
    }
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let challenge = self.challenge();
        let body = json!({
            "error": self.0.error_code(),
            "error_description": self.0.to_string(),
        });

        let mut resp = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        resp.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
        resp
    }
}
