//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tx::ReceiptPolicy;
use crate::ClientError;

/// Connection and polling settings, usually read from a `nodelink.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Chain id used for replay protection; asked from the node when absent
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Sleep between receipt lookups
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Receipt lookups before giving up
    #[serde(default = "default_receipt_max_attempts")]
    pub receipt_max_attempts: u32,
    /// Sleep between filter polls in a `LogWatcher`
    #[serde(default = "default_filter_poll_interval_ms")]
    pub filter_poll_interval_ms: u64,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_receipt_poll_interval_ms() -> u64 {
    1_000
}

fn default_receipt_max_attempts() -> u32 {
    40
}

fn default_filter_poll_interval_ms() -> u64 {
    1_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: None,
            request_timeout_ms: default_request_timeout_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_max_attempts: default_receipt_max_attempts(),
            filter_poll_interval_ms: default_filter_poll_interval_ms(),
        }
    }
}

impl ClientConfig {
    /// Parse from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        toml::from_str(content).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// HTTP request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Filter polling interval
    pub fn filter_poll_interval(&self) -> Duration {
        Duration::from_millis(self.filter_poll_interval_ms)
    }

    /// Receipt polling policy built from this config
    pub fn receipt_policy(&self) -> ReceiptPolicy {
        ReceiptPolicy::new(
            Duration::from_millis(self.receipt_poll_interval_ms),
            self.receipt_max_attempts,
        )
    }
}
