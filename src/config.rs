//! Configuration management for whoami-mcp
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, lowest to highest: built-in defaults, YAML file,
//! `WHOAMI_MCP_*` environment variables, command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cli::{Cli, Commands};
use crate::error::{Result, WhoamiError};
use crate::mcp::auth::discovery::ServerType;

/// Main configuration structure for whoami-mcp
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Identity provider settings
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path clients POST session messages to; advertised in the SSE
    /// `endpoint` event
    #[serde(default = "default_message_path")]
    pub message_path: String,

    /// Interval between SSE keep-alive comments (seconds)
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_message_path() -> String {
    "/messages".to_string()
}

fn default_keep_alive_seconds() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            message_path: default_message_path(),
            keep_alive_seconds: default_keep_alive_seconds(),
        }
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Issuer URL of the OpenID Connect / OAuth 2.0 provider
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Which well-known metadata document to fetch from the issuer
    #[serde(default)]
    pub discovery: ServerType,

    /// Upper bound on each userinfo request (seconds)
    #[serde(default = "default_verify_timeout_seconds")]
    pub verify_timeout_seconds: u64,
}

fn default_issuer() -> String {
    "https://api.asgardeo.io/t/sagaraorg/oauth2/token".to_string()
}

fn default_verify_timeout_seconds() -> u64 {
    10
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            discovery: ServerType::default(),
            verify_timeout_seconds: default_verify_timeout_seconds(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WhoamiError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| WhoamiError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(host) = std::env::var("WHOAMI_MCP_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("WHOAMI_MCP_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid WHOAMI_MCP_PORT: {}", port);
            }
        }

        if let Ok(keep_alive) = std::env::var("WHOAMI_MCP_KEEP_ALIVE_SECONDS") {
            if let Ok(value) = keep_alive.parse() {
                self.server.keep_alive_seconds = value;
            } else {
                tracing::warn!("Invalid WHOAMI_MCP_KEEP_ALIVE_SECONDS: {}", keep_alive);
            }
        }

        if let Ok(issuer) = std::env::var("WHOAMI_MCP_ISSUER") {
            tracing::debug!(issuer = %issuer, "Env override: WHOAMI_MCP_ISSUER");
            self.auth.issuer = issuer;
        }

        if let Ok(discovery) = std::env::var("WHOAMI_MCP_DISCOVERY") {
            match discovery.parse::<ServerType>() {
                Ok(kind) => self.auth.discovery = kind,
                Err(_) => {
                    tracing::warn!("Invalid discovery type: {}, using default", discovery);
                }
            }
        }

        if let Ok(timeout) = std::env::var("WHOAMI_MCP_VERIFY_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.auth.verify_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid WHOAMI_MCP_VERIFY_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        match &cli.command {
            Commands::Serve { host, port, issuer } => {
                if let Some(host) = host {
                    self.server.host = host.clone();
                }
                if let Some(port) = port {
                    self.server.port = *port;
                }
                if let Some(issuer) = issuer {
                    self.auth.issuer = issuer.clone();
                }
            }
            Commands::Discover { issuer, discovery } => {
                if let Some(issuer) = issuer {
                    self.auth.issuer = issuer.clone();
                }
                if let Some(discovery) = discovery {
                    self.auth.discovery = *discovery;
                }
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(WhoamiError::Config("server.host cannot be empty".to_string()).into());
        }

        if self.server.port == 0 {
            return Err(
                WhoamiError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        if !self.server.message_path.starts_with('/') {
            return Err(WhoamiError::Config(format!(
                "server.message_path must start with '/': {}",
                self.server.message_path
            ))
            .into());
        }

        if self.server.keep_alive_seconds == 0 {
            return Err(WhoamiError::Config(
                "server.keep_alive_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let issuer = self.issuer_url()?;
        if !matches!(issuer.scheme(), "http" | "https") {
            return Err(WhoamiError::Config(format!(
                "auth.issuer must be an http(s) URL: {}",
                self.auth.issuer
            ))
            .into());
        }

        if self.auth.verify_timeout_seconds == 0 {
            return Err(WhoamiError::Config(
                "auth.verify_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.verify_timeout_seconds > 300 {
            return Err(WhoamiError::Config(
                "auth.verify_timeout_seconds must be less than or equal to 300".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// `host:port` string suitable for binding a listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Parsed issuer URL
    ///
    /// # Errors
    ///
    /// Returns [`WhoamiError::Config`] if `auth.issuer` is not a valid URL
    pub fn issuer_url(&self) -> Result<Url> {
        Url::parse(&self.auth.issuer).map_err(|e| {
            WhoamiError::Config(format!("Invalid auth.issuer '{}': {}", self.auth.issuer, e))
                .into()
        })
    }

    /// Per-request timeout for token verification
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.verify_timeout_seconds)
    }

    /// SSE keep-alive interval
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.server.keep_alive_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "WHOAMI_MCP_HOST",
            "WHOAMI_MCP_PORT",
            "WHOAMI_MCP_KEEP_ALIVE_SECONDS",
            "WHOAMI_MCP_ISSUER",
            "WHOAMI_MCP_DISCOVERY",
            "WHOAMI_MCP_VERIFY_TIMEOUT_SECONDS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.message_path, "/messages");
        assert_eq!(config.auth.discovery, ServerType::Oidc);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bind_address() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3001");
    }

    #[test]
    fn test_parse_partial_yaml_fills_defaults() {
        let yaml = r#"
server:
  port: 9000
auth:
  issuer: https://idp.example.com/oauth2/token
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.issuer, "https://idp.example.com/oauth2/token");
        assert_eq!(config.auth.verify_timeout_seconds, 10);
    }

    #[test]
    fn test_parse_discovery_type_from_yaml() {
        let yaml = "auth:\n  discovery: oauth\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.auth.discovery, ServerType::OAuth);
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_message_path() {
        let mut config = Config::default();
        config.server.message_path = "messages".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_issuer() {
        let mut config = Config::default();
        config.auth.issuer = "not a url".to_string();
        assert!(config.validate().is_err());

        config.auth.issuer = "ftp://idp.example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_timeout_bounds() {
        let mut config = Config::default();
        config.auth.verify_timeout_seconds = 0;
        assert!(config.validate().is_err());

        config.auth.verify_timeout_seconds = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        clear_env();
        let config = Config::load("/nonexistent/whoami.yaml", &Cli::default()).unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    #[serial]
    fn test_load_from_file_then_cli_override() {
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  port: 4000\n").unwrap();

        let cli = Cli {
            config: None,
            verbose: false,
            command: Commands::Serve {
                host: None,
                port: Some(5000),
                issuer: Some("https://cli.example.com".to_string()),
            },
        };

        let config = Config::load(path.to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.issuer, "https://cli.example.com");
    }

    #[test]
    #[serial]
    fn test_load_rejects_malformed_file() {
        clear_env();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [unclosed").unwrap();

        let result = Config::load(path.to_str().unwrap(), &Cli::default());
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        clear_env();
        std::env::set_var("WHOAMI_MCP_PORT", "7777");
        std::env::set_var("WHOAMI_MCP_ISSUER", "https://env.example.com");
        std::env::set_var("WHOAMI_MCP_DISCOVERY", "oauth");
        std::env::set_var("WHOAMI_MCP_VERIFY_TIMEOUT_SECONDS", "3");

        let mut config = Config::default();
        config.apply_env_vars();

        assert_eq!(config.server.port, 7777);
        assert_eq!(config.auth.issuer, "https://env.example.com");
        assert_eq!(config.auth.discovery, ServerType::OAuth);
        assert_eq!(config.verify_timeout(), Duration::from_secs(3));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_ignores_invalid_port() {
        clear_env();
        std::env::set_var("WHOAMI_MCP_PORT", "not-a-port");

        let mut config = Config::default();
        config.apply_env_vars();
        assert_eq!(config.server.port, 3001);

        clear_env();
    }
}
