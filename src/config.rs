//! Deployment configuration
//!
//! The redirect-gateway method is chosen by whoever installs the script,
//! never by the VPN client, so it lives in a TOML file rather than in the
//! environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "vpnc-netconf.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// How the tunnel becomes the effective default route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectGatewayMethod {
    /// Give the interface address a gateway; the OS installs the default route
    #[default]
    InterfaceGateway,
    /// Add `0.0.0.0/0` through the tunnel with metric 1
    LowMetricDefaultRoute,
    /// Add `0.0.0.0/1` and `128.0.0.0/1` through the tunnel
    SplitDefaultPair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redirect_gateway_method: RedirectGatewayMethod,
    /// Skip routes that need the pre-existing gateway when it is unknown,
    /// instead of issuing them with no next hop.
    pub skip_routes_without_gateway: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redirect_gateway_method: RedirectGatewayMethod::default(),
            skip_routes_without_gateway: true,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load config from an explicit path or the default locations
    ///
    /// Search order: `explicit`, `./vpnc-netconf.toml`,
    /// `<config dir>/vpnc-netconf/config.toml`. Falls back to defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        for candidate in default_locations() {
            if candidate.exists() {
                debug!("Loading config from {}", candidate.display());
                return Self::load(&candidate);
            }
        }

        info!("No config file found, using defaults");
        Ok(Config::default())
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("vpnc-netconf").join("config.toml"));
    }
    paths
}
