//! whoami-mcp - MCP server exposing the authenticated caller's identity
//!
#![doc = "Main entry point for the whoami-mcp server."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use whoami_mcp::cli::{Cli, Commands};
use whoami_mcp::config::Config;
use whoami_mcp::mcp::auth::discovery::fetch_server_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!(issuer = %config.auth.issuer, "Starting whoami-mcp server");
            whoami_mcp::server::serve(config).await?;
            Ok(())
        }
        Commands::Discover { .. } => {
            tracing::info!(issuer = %config.auth.issuer, discovery = %config.auth.discovery, "Fetching provider metadata");
            let http = reqwest::Client::builder()
                .timeout(config.verify_timeout())
                .build()?;
            let metadata =
                fetch_server_config(&http, &config.issuer_url()?, config.auth.discovery).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "whoami_mcp=debug"
    } else {
        "whoami_mcp=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
