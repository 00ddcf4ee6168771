//! Configuration Module
//!
//! Loads the proxy configuration from a JSON file, falling back to defaults
//! when the file is missing or malformed.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Configuration file used when `CONFIG_PATH` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Server configuration parameters.
///
/// Fixed for the lifetime of the process once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream scheme and host, e.g. `http://localhost`
    pub api_host: String,
    /// Upstream port
    pub api_port: u16,
    /// Port the proxy listens on
    pub frontend_port: u16,
}

impl Config {
    /// Loads the configuration file named by `CONFIG_PATH`, or
    /// `config.json` in the working directory.
    pub fn from_env() -> Self {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Loads configuration from `path`.
    ///
    /// A missing or unparseable file yields [`Config::default`]; fields
    /// absent from a valid file take their individual defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Config file not readable, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config file invalid, using defaults");
                Self::default()
            }
        }
    }

    /// Base URL of the upstream backend, `host:port`.
    pub fn api_base(&self) -> String {
        format!("{}:{}", self.api_host.trim_end_matches('/'), self.api_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "http://localhost".to_string(),
            api_port: 3000,
            frontend_port: 4000,
        }
    }
}
