//! Authentication context attached to each verified request

use serde::{Deserialize, Serialize};

/// Identity established for one request by a successful token verification.
///
/// Built fresh on every request and never stored. `client_id` is always
/// empty and `scopes` always empty; the provider's profile is kept whole in
/// `claims`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// The raw bearer token presented by the client
    pub token: String,
    /// Issuer identifier from the provider's metadata
    pub issuer: String,
    /// String form of the profile's `sub` claim
    pub subject: String,
    /// OAuth client id; not known from a userinfo lookup
    pub client_id: String,
    /// Granted scopes; not known from a userinfo lookup
    pub scopes: Vec<String>,
    /// Full userinfo profile object
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl AuthContext {
    /// Build a context from a validated profile.
    pub fn new(
        token: impl Into<String>,
        issuer: impl Into<String>,
        subject: impl Into<String>,
        claims: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            token: token.into(),
            issuer: issuer.into(),
            subject: subject.into(),
            client_id: String::new(),
            scopes: Vec::new(),
            claims,
        }
    }
}
