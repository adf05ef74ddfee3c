//! # Node Configuration
//!
//! Layered: built-in defaults, then an optional JSON file named by
//! `ESCROW_CONFIG`, then individual `ESCROW_*` overrides. The result is
//! validated before anything is wired.

use escrow_engine::{CoordinatorConfig, EscrowError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Coordinator and recovery settings.
    pub coordinator: CoordinatorConfig,
    /// Directory holding one JSON file per swap.
    pub data_dir: PathBuf,
    /// Run one swap end to end at startup.
    pub demo_swap: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            data_dir: PathBuf::from("./data/swaps"),
            demo_swap: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for `CoordinatorConfig`.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File path
        path: String,
        /// Underlying error
        source: serde_json::Error,
    },

    /// An override variable did not parse.
    #[error("{key}={value} is not a valid value")]
    InvalidValue {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },

    /// Values parsed but are out of range.
    #[error(transparent)]
    Invalid(#[from] EscrowError),
}

impl NodeConfig {
    /// Load from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `ESCROW_CONFIG`: JSON file with `CoordinatorConfig` fields
    /// - `ESCROW_MAX_CREATE_ATTEMPTS`
    /// - `ESCROW_ADAPTER_TIMEOUT_MS`
    /// - `ESCROW_FINALITY_BUFFER_SECS`
    /// - `ESCROW_RECOVERY_INTERVAL_SECS`
    /// - `ESCROW_DATA_DIR` (default: ./data/swaps)
    /// - `ESCROW_DEMO_SWAP`: `1` or `true` to run a demo swap at startup
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("ESCROW_CONFIG") {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            config.coordinator =
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        }

        let c = &mut config.coordinator;
        override_from(&lookup, "ESCROW_MAX_CREATE_ATTEMPTS", &mut c.max_create_attempts)?;
        override_from(&lookup, "ESCROW_ADAPTER_TIMEOUT_MS", &mut c.adapter_timeout_ms)?;
        override_from(&lookup, "ESCROW_FINALITY_BUFFER_SECS", &mut c.finality_buffer_secs)?;
        override_from(&lookup, "ESCROW_RECOVERY_INTERVAL_SECS", &mut c.recovery.interval_secs)?;

        if let Some(dir) = lookup("ESCROW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.demo_swap = lookup("ESCROW_DEMO_SWAP")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        config.coordinator.validate()?;
        Ok(config)
    }
}

fn override_from<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value })?;
    }
    Ok(())
}
