//! System configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use walletkit_blockchaindb::HttpBlockchainDb;

use crate::SystemError;

/// Configuration for a wallet system.
///
/// Can be loaded from a TOML file via [`SystemConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Root directory under which each account gets its own subdirectory.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Whether to discover mainnet or testnet blockchains.
    #[serde(default = "default_true")]
    pub is_mainnet: bool,

    /// Base URL of the blockchain query service.
    #[serde(default = "default_blockchaindb_url")]
    pub blockchaindb_url: String,

    /// Base URL of the auxiliary API (token lists, Ethereum proxy).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token for the query service.
    #[serde(default)]
    pub blockchaindb_token: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum addresses per history request.
    #[serde(default = "default_address_chunk_size")]
    pub address_chunk_size: usize,

    /// Keep destroyed systems alive in a process-wide list.
    #[serde(default = "default_true")]
    pub retain_inactive_systems: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_storage_path() -> PathBuf {
    PathBuf::from("./walletkit_data")
}

fn default_true() -> bool {
    true
}

fn default_blockchaindb_url() -> String {
    "https://api.blockset.com".to_string()
}

fn default_api_url() -> String {
    "https://api.breadwallet.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_address_chunk_size() -> usize {
    50
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SystemConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SystemError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SystemError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SystemError> {
        toml::from_str(s).map_err(|e| SystemError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SystemError> {
        toml::to_string_pretty(self).map_err(|e| SystemError::Config(e.to_string()))
    }

    /// Build the HTTP query-service client described by this configuration.
    pub fn blockchain_db(
        &self,
        runtime: tokio::runtime::Handle,
    ) -> Result<HttpBlockchainDb, SystemError> {
        let client = HttpBlockchainDb::with_timeout(
            self.blockchaindb_url.clone(),
            self.api_url.clone(),
            self.blockchaindb_token.clone(),
            runtime,
            self.request_timeout_secs,
        )?;
        Ok(client.with_address_chunk(self.address_chunk_size))
    }

    pub fn log_format(&self) -> crate::logging::LogFormat {
        match self.log_format.as_str() {
            "json" => crate::logging::LogFormat::Json,
            _ => crate::logging::LogFormat::Human,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            is_mainnet: true,
            blockchaindb_url: default_blockchaindb_url(),
            api_url: default_api_url(),
            blockchaindb_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            address_chunk_size: default_address_chunk_size(),
            retain_inactive_systems: true,
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SystemConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = SystemConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.blockchaindb_url, config.blockchaindb_url);
        assert_eq!(parsed.address_chunk_size, config.address_chunk_size);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = SystemConfig::from_toml_str("").expect("empty toml should use defaults");
        assert!(config.is_mainnet);
        assert!(config.retain_inactive_systems);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.log_format(), LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            is_mainnet = false
            storage_path = "/var/lib/walletkit"
            blockchaindb_token = "secret"
            log_format = "json"
        "#;
        let config = SystemConfig::from_toml_str(toml).expect("should parse");
        assert!(!config.is_mainnet);
        assert_eq!(config.storage_path, PathBuf::from("/var/lib/walletkit"));
        assert_eq!(config.blockchaindb_token.as_deref(), Some("secret"));
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.address_chunk_size, 50); // default
    }

    #[tokio::test]
    async fn builds_query_client_from_config() {
        let config = SystemConfig::from_toml_str(r#"blockchaindb_url = "http://localhost:8080/""#)
            .expect("should parse");
        let client = config
            .blockchain_db(tokio::runtime::Handle::current())
            .expect("client should build");
        assert_eq!(client.bdb_url(), "http://localhost:8080");
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = SystemConfig::from_toml_file("/nonexistent/walletkit.toml");
        assert!(matches!(result, Err(SystemError::Config(_))));
    }
}
