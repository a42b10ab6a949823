//! Identity-provider metadata discovery
//!
//! The server learns everything it needs about the identity provider from a
//! single metadata document fetched at startup: the `issuer` string stamped
//! onto every [`AuthContext`](crate::mcp::auth::AuthContext) and the
//! `userinfo_endpoint` used to verify bearer tokens.
//!
//! Two well-known locations are supported, selected by [`ServerType`]:
//!
//! - [`ServerType::Oidc`]: OpenID Connect Discovery 1.0, path appending
//!   (`<issuer>/.well-known/openid-configuration`).
//! - [`ServerType::OAuth`]: RFC 8414, path insertion
//!   (`<origin>/.well-known/oauth-authorization-server<issuer-path>`).
//!
//! The fetched document is re-served unchanged by the delegated discovery
//! route so MCP clients can find the provider too.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, WhoamiError};

// ---------------------------------------------------------------------------
// Server type
// ---------------------------------------------------------------------------

/// Which metadata document flavour the issuer publishes.
///
/// # Examples
///
/// ```
/// use whoami_mcp::mcp::auth::discovery::ServerType;
///
/// assert_eq!("oauth".parse::<ServerType>().unwrap(), ServerType::OAuth);
/// assert_eq!(ServerType::default(), ServerType::Oidc);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// OpenID Connect provider (`openid-configuration`)
    #[default]
    #[value(name = "oidc")]
    Oidc,
    /// Plain OAuth 2.0 authorization server (`oauth-authorization-server`)
    #[value(name = "oauth")]
    OAuth,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerType::Oidc => write!(f, "oidc"),
            ServerType::OAuth => write!(f, "oauth"),
        }
    }
}

impl FromStr for ServerType {
    type Err = WhoamiError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oidc" => Ok(ServerType::Oidc),
            "oauth" => Ok(ServerType::OAuth),
            other => Err(WhoamiError::Config(format!(
                "unknown discovery type '{}', expected 'oidc' or 'oauth'",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Authorization Server Metadata (RFC 8414 / OIDC Discovery)
// ---------------------------------------------------------------------------

/// Metadata document describing an OAuth 2.0 / OIDC authorization server.
///
/// Only `issuer` is required. Fields this server does not model are kept in
/// `extra` so the document can be re-served without loss.
///
/// # Examples
///
/// ```
/// use whoami_mcp::mcp::auth::discovery::AuthorizationServerMetadata;
///
/// let json = r#"{
///     "issuer": "https://auth.example.com",
///     "userinfo_endpoint": "https://auth.example.com/userinfo",
///     "jwks_uri": "https://auth.example.com/jwks"
/// }"#;
///
/// let meta: AuthorizationServerMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.issuer, "https://auth.example.com");
/// assert!(meta.extra.contains_key("jwks_uri"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthorizationServerMetadata {
    /// The issuer identifier URI for this authorization server.
    pub issuer: String,

    /// The URL of the authorization endpoint (RFC 6749 section 3.1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,

    /// The URL of the token endpoint (RFC 6749 section 3.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// OpenID Connect userinfo endpoint; required for token verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// Optional URL of the Dynamic Client Registration endpoint (RFC 7591).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,

    /// List of OAuth scopes the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    /// List of `response_type` values the server supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types_supported: Option<Vec<String>>,

    /// PKCE challenge methods the server supports (e.g. `["S256"]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,

    /// Additional server metadata fields not explicitly modelled above.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuthorizationServerMetadata {
    /// The userinfo endpoint as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns [`WhoamiError::Discovery`] when the document does not
    /// advertise a userinfo endpoint or the value is not a URL.
    pub fn userinfo_url(&self) -> Result<Url> {
        let raw = self.userinfo_endpoint.as_deref().ok_or_else(|| {
            WhoamiError::Discovery(format!(
                "metadata for issuer {} has no userinfo_endpoint",
                self.issuer
            ))
        })?;
        Url::parse(raw).map_err(|e| {
            WhoamiError::Discovery(format!("invalid userinfo_endpoint '{}': {}", raw, e)).into()
        })
    }
}

// ---------------------------------------------------------------------------
// Discovery helpers
// ---------------------------------------------------------------------------

/// Builds the well-known metadata URL for `issuer`.
///
/// ```text
/// oidc:  https://idp.example.com/t/org/.well-known/openid-configuration
/// oauth: https://idp.example.com/.well-known/oauth-authorization-server/t/org
/// ```
pub fn well_known_url(issuer: &Url, kind: ServerType) -> Url {
    let path = issuer.path().trim_end_matches('/');
    let mut url = issuer.clone();
    url.set_query(None);
    url.set_fragment(None);

    match kind {
        ServerType::Oidc => {
            url.set_path(&format!("{}/.well-known/openid-configuration", path));
        }
        ServerType::OAuth => {
            url.set_path(&format!("/.well-known/oauth-authorization-server{}", path));
        }
    }

    url
}

/// Fetches the identity provider's metadata document.
///
/// Exactly one GET is issued; there is no fallback between flavours.
///
/// # Arguments
///
/// * `http` - Shared [`reqwest::Client`].
/// * `issuer` - The configured issuer URL.
/// * `kind` - Which well-known document to request.
///
/// # Errors
///
/// Returns [`WhoamiError::Discovery`] if the request fails, the status is
/// not 2xx, or the body is not a metadata document.
///
/// # Examples
///
/// ```no_run
/// use url::Url;
/// use whoami_mcp::mcp::auth::discovery::{fetch_server_config, ServerType};
///
/// # async fn example() -> whoami_mcp::error::Result<()> {
/// let http = reqwest::Client::new();
/// let issuer = Url::parse("https://auth.example.com/oauth2/token")?;
/// let meta = fetch_server_config(&http, &issuer, ServerType::Oidc).await?;
/// println!("userinfo: {:?}", meta.userinfo_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_server_config(
    http: &reqwest::Client,
    issuer: &Url,
    kind: ServerType,
) -> Result<AuthorizationServerMetadata> {
    let url = well_known_url(issuer, kind);
    tracing::debug!(url = %url, kind = %kind, "Fetching identity provider metadata");

    let resp = http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| WhoamiError::Discovery(format!("metadata fetch failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(WhoamiError::Discovery(format!(
            "metadata endpoint {} returned {}",
            url, status
        ))
        .into());
    }

    let meta: AuthorizationServerMetadata = resp
        .json()
        .await
        .map_err(|e| WhoamiError::Discovery(format!("failed to parse metadata: {e}")))?;

    tracing::info!(issuer = %meta.issuer, "Discovered identity provider");
    Ok(meta)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
