//! Service configuration
//!
//! Loaded from an optional JSON file. Every field has a default, so an empty
//! object (or no file at all) yields a runnable local setup.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::depth::DEFAULT_DEPTH;
use crate::engine::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Depth feed service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Instrument to reconcile
    pub symbol: String,
    /// Order book stream endpoint
    pub book_url: String,
    /// Trade stream endpoint
    pub trade_url: String,
    /// Levels kept per side
    pub depth: usize,
    /// Highlight lifetime in milliseconds
    pub highlight_ms: u64,
    /// Read API bind address
    pub listen_addr: String,
    /// Capacity of the inbound frame and control channels
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            book_url: "ws://127.0.0.1:9001/orderbook".to_string(),
            trade_url: "ws://127.0.0.1:9001/trades".to_string(),
            depth: DEFAULT_DEPTH,
            highlight_ms: 500,
            listen_addr: "127.0.0.1:8090".to_string(),
            channel_capacity: 1024,
        }
    }
}

impl FeedConfig {
    /// Read and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: FeedConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".into()));
        }
        if self.depth == 0 {
            return Err(ConfigError::Invalid("depth must be at least 1".into()));
        }
        if self.highlight_ms == 0 {
            return Err(ConfigError::Invalid("highlight_ms must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".into()));
        }
        if !(500..=1000).contains(&self.highlight_ms) {
            warn!(
                highlight_ms = self.highlight_ms,
                "highlight_ms outside the usual 500-1000ms range"
            );
        }
        self.listen_socket()?;
        Ok(())
    }

    pub fn listen_socket(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen_addr {}: {}", self.listen_addr, e)))
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            symbol: self.symbol.clone(),
            depth: self.depth,
            highlight_duration: self.highlight_duration(),
        }
    }
}
