//! Command-line interface definition for whoami-mcp
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the server and to inspect the identity
//! provider's discovery metadata.

use clap::{Parser, Subcommand};

use crate::mcp::auth::discovery::ServerType;

/// whoami-mcp - MCP server exposing the authenticated caller's identity
///
/// Serves a single `whoami` tool over Server-Sent Events. Every request must
/// carry a bearer token that the configured OpenID Connect provider accepts.
#[derive(Parser, Debug, Clone)]
#[command(name = "whoami-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for whoami-mcp
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the MCP server
    Serve {
        /// Address to bind (overrides `server.host`)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides `server.port`)
        #[arg(short, long)]
        port: Option<u16>,

        /// Identity provider issuer URL (overrides `auth.issuer`)
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Fetch and print the identity provider's discovery metadata
    Discover {
        /// Identity provider issuer URL (overrides `auth.issuer`)
        #[arg(long)]
        issuer: Option<String>,

        /// Discovery document flavour (overrides `auth.discovery`)
        #[arg(long, value_enum)]
        discovery: Option<ServerType>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            command: Commands::Serve {
                host: None,
                port: None,
                issuer: None,
            },
        }
    }
}
