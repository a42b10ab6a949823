//! whoami-mcp - MCP server exposing the authenticated caller's identity
//!
//! This library provides the pieces of a Model Context Protocol server that
//! serves a single `whoami` tool over HTTP+SSE, with every request gated by a
//! bearer token checked against an OpenID Connect userinfo endpoint.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `mcp`: protocol types, authentication, session registry, SSE transport,
//!   and the JSON-RPC dispatcher
//! - `tools`: tool executor trait, tool registry, and the `whoami` tool
//! - `server`: axum router, handlers, and server bootstrap
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use whoami_mcp::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     whoami_mcp::server::serve(config).await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod server;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use error::{AuthError, Result, RoutingError, WhoamiError};
pub use mcp::auth::AuthContext;
pub use mcp::session::SessionRegistry;
