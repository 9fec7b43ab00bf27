//! CLI configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use vouch_utils::LogFormat;
use vouch_verification::FlowConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(String),
}

/// Configuration for the `vouch` binary.
///
/// Can be loaded from a TOML file via [`CliConfig::from_toml_file`]; flags
/// and `VOUCH_*` environment variables override file values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CliConfig {
    /// Base URL of the marketplace API.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Log output format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Flow timings, signing domain and gate routes (`[flow]` table).
    #[serde(default)]
    pub flow: FlowConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_server_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            flow: FlowConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = CliConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.server_url, "http://localhost:3000");
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.flow.resend_cooldown_secs, 180);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            server_url = "https://api.market.example"
            log_format = "json"

            [flow]
            domain = "market.example"
        "#;
        let config = CliConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.server_url, "https://api.market.example");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.flow.domain, "market.example");
        assert_eq!(config.flow.poll_interval_secs, 10); // default
    }

    #[test]
    fn reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_secs = 5").unwrap();
        let config = CliConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_returns_read_error() {
        let err = CliConfig::from_toml_file("/nonexistent/vouch.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_toml_returns_parse_error() {
        let err = CliConfig::from_toml_str("server_url = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
