//! MCP (Model Context Protocol) server support for whoami-mcp
//!
//! Serves the HTTP+SSE transport introduced in protocol revision
//! **2024-11-05** and negotiates up to **2025-11-25** during `initialize`.
//!
//! # Module Layout
//!
//! - `types`     -- JSON-RPC primitives and the MCP types this server speaks
//! - `auth`      -- provider discovery, token verification, bearer middleware
//! - `transport` -- `MessageHandler` trait and the SSE transport
//! - `session`   -- session registry and message routing
//! - `server`    -- JSON-RPC dispatcher bound to the tool registry

pub mod auth;
pub mod server;
pub mod session;
pub mod transport;
pub mod types;

pub use types::*;
