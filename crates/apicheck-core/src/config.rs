//! Project configuration for contract test runs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::request::Credentials;

/// Default number of requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Contract document (OpenAPI JSON/YAML or simplified suite)
    pub contract: PathBuf,

    /// Base URL override; the contract's first server is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Credentials injected into cases that require auth
    #[serde(default)]
    pub credentials: Credentials,

    /// HTTP headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Maximum requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-request timeout in seconds (no timeout when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Where `report.json` and `reproductions.http` are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".apicheck")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract: PathBuf::from("openapi.yaml"),
            base_url: None,
            credentials: Credentials::default(),
            headers: HashMap::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: None,
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Load from default location (.apicheck.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apicheck.toml", ".apicheck.json", "apicheck.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Timeout as a `Duration`. Unset, zero or negative means no timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the value is NaN, infinite or too large for a `Duration`
    pub fn timeout(&self) -> Result<Option<Duration>, ConfigError> {
        match self.timeout_secs {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs <= 0.0 => Ok(None),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| ConfigError::Invalid {
                    key: "timeout_secs",
                    reason: format!("{secs}: {e}"),
                }),
        }
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# apicheck configuration

# Contract: OpenAPI document (JSON/YAML) or simplified suite (apis: [...])
contract = "openapi.yaml"

# Override the contract's first server URL
# base_url = "http://localhost:8000"

# Requests in flight
concurrency = 5

# Per-request timeout in seconds (no timeout by default)
# timeout_secs = 10.0

# Output directory for report.json and reproductions.http
output_dir = ".apicheck"

# Credentials for secured operations
[credentials]
# api_key = "your-api-key"
# bearer = "your-token-here"

# Extra HTTP headers sent with every request
[headers]
# X-Request-Source = "apicheck"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}
