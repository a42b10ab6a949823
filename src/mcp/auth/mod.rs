//! Bearer-token authentication against an OpenID Connect provider
//!
//! # Module Layout
//!
//! - [`discovery`] -- fetches the provider's metadata document
//! - [`context`]   -- the per-request [`AuthContext`]
//! - [`verifier`]  -- [`TokenVerifier`] trait and the userinfo-backed
//!   implementation
//! - [`bearer`]    -- axum middleware that gates routes on a verified token

pub mod bearer;
pub mod context;
pub mod discovery;
pub mod verifier;

pub use context::AuthContext;
pub use verifier::{TokenVerifier, UserinfoVerifier};
