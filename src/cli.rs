//! Command line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{read_config, validate_config, ConfigError, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "caching-proxy")]
#[command(version, about = "Caching HTTP proxy in front of a single origin", long_about = None)]
pub struct Cli {
    /// Port to listen on [default: 3000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Origin every request is forwarded to [default: https://google.com]
    #[arg(short, long)]
    pub origin: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Merge file, defaults and flags into a validated configuration.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(origin) = self.origin {
            config.upstream.origin = origin;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
