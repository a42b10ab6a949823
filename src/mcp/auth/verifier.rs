//! Bearer-token verification via the OpenID Connect userinfo endpoint
//!
//! A token is considered valid when the identity provider's userinfo
//! endpoint accepts it and answers with a JSON object carrying a `sub`
//! claim. Nothing is cached: every call to [`TokenVerifier::verify`] costs
//! exactly one outbound request.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{AuthError, Result, WhoamiError};
use crate::mcp::auth::context::AuthContext;
use crate::mcp::auth::discovery::AuthorizationServerMetadata;

/// Turns a presented bearer token into an [`AuthContext`].
///
/// The HTTP layer holds an `Arc<dyn TokenVerifier>` so tests can substitute
/// an in-process implementation.
#[async_trait]
pub trait TokenVerifier: Send + Sync + std::fmt::Debug {
    /// Verify `token`.
    ///
    /// `None` or an empty token fails with [`AuthError::Unauthenticated`]
    /// before any network activity.
    async fn verify(&self, token: Option<&str>) -> std::result::Result<AuthContext, AuthError>;
}

/// A userinfo profile that passed shape validation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    /// String form of `sub`
    pub subject: String,
    /// The complete profile object
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Validate a userinfo response body.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] when the body is not JSON, is not a
/// JSON object, or has no `sub` key.
///
/// # Examples
///
/// ```
/// use whoami_mcp::mcp::auth::verifier::parse_profile;
///
/// let profile = parse_profile(br#"{"sub":42}"#).unwrap();
/// assert_eq!(profile.subject, "42");
/// assert!(parse_profile(br#"{"name":"Ann"}"#).is_err());
/// ```
pub fn parse_profile(body: &[u8]) -> std::result::Result<UserProfile, AuthError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| AuthError::InvalidToken)?;

    let serde_json::Value::Object(claims) = value else {
        return Err(AuthError::InvalidToken);
    };

    let subject = claims
        .get("sub")
        .map(subject_string)
        .ok_or(AuthError::InvalidToken)?;

    Ok(UserProfile { subject, claims })
}

/// String form of a `sub` claim: strings verbatim, anything else as JSON text.
pub fn subject_string(sub: &serde_json::Value) -> String {
    match sub {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// [`TokenVerifier`] backed by the provider's userinfo endpoint.
#[derive(Debug, Clone)]
pub struct UserinfoVerifier {
    http: reqwest::Client,
    issuer: String,
    userinfo_endpoint: Url,
}

impl UserinfoVerifier {
    /// Create a verifier for `userinfo_endpoint`.
    ///
    /// # Arguments
    ///
    /// * `issuer` - Issuer string stamped onto every [`AuthContext`]
    /// * `userinfo_endpoint` - Endpoint queried with the bearer token
    /// * `timeout` - Upper bound on each verification request
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(issuer: impl Into<String>, userinfo_endpoint: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(WhoamiError::Http)?;

        Ok(Self {
            http,
            issuer: issuer.into(),
            userinfo_endpoint,
        })
    }

    /// Create a verifier from discovered provider metadata.
    ///
    /// # Errors
    ///
    /// Returns [`WhoamiError::Discovery`] if the metadata has no usable
    /// `userinfo_endpoint`.
    pub fn from_metadata(metadata: &AuthorizationServerMetadata, timeout: Duration) -> Result<Self> {
        Self::new(metadata.issuer.clone(), metadata.userinfo_url()?, timeout)
    }

    /// The issuer this verifier reports.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The endpoint tokens are checked against.
    pub fn userinfo_endpoint(&self) -> &Url {
        &self.userinfo_endpoint
    }
}

#[async_trait]
impl TokenVerifier for UserinfoVerifier {
    async fn verify(&self, token: Option<&str>) -> std::result::Result<AuthContext, AuthError> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::Unauthenticated),
        };

        let resp = self
            .http
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Userinfo request failed");
                AuthError::TokenVerificationFailed {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| AuthError::TokenVerificationFailed {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Identity provider rejected token");
            return Err(AuthError::TokenVerificationFailed {
                status: Some(status.as_u16()),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let profile = parse_profile(&body).map_err(|e| {
            tracing::warn!("Userinfo response has no subject");
            e
        })?;

        tracing::debug!(subject = %profile.subject, "Token verified");
        Ok(AuthContext::new(
            token,
            self.issuer.clone(),
            profile.subject,
            profile.claims,
        ))
    }
}
