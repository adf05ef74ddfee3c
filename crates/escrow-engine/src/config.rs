//! # Coordinator Configuration
//!
//! Retry, timeout and recovery settings for the escrow coordinator.

use crate::domain::{EscrowError, EscrowResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default finality buffer between destination and source cancellation (3 minutes).
pub const DEFAULT_FINALITY_BUFFER_SECS: u64 = 180;

/// Coordinator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Escrow creation attempts before giving up on a side.
    pub max_create_attempts: u32,

    /// First retry delay in seconds; doubles per attempt.
    pub backoff_base_secs: u64,

    /// Retry delay cap in seconds.
    pub backoff_max_secs: u64,

    /// Bound on every chain adapter call.
    pub adapter_timeout_ms: u64,

    /// Required gap between destination and source cancellation.
    /// Absorbs differing finality latency between the two chains.
    pub finality_buffer_secs: u64,

    /// Recovery scheduler settings.
    pub recovery: RecoveryConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_create_attempts: 5,
            backoff_base_secs: 2,
            backoff_max_secs: 60,
            adapter_timeout_ms: 30_000,
            finality_buffer_secs: DEFAULT_FINALITY_BUFFER_SECS,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a config for testing: no backoff, no buffer, short timeouts.
    pub fn for_testing() -> Self {
        Self {
            max_create_attempts: 3,
            backoff_base_secs: 0,
            backoff_max_secs: 0,
            adapter_timeout_ms: 1_000,
            finality_buffer_secs: 0,
            recovery: RecoveryConfig {
                interval_secs: 1,
                max_concurrent_swaps: 4,
                drive_in_flight: true,
            },
        }
    }

    /// Adapter timeout as a `Duration`.
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Reject settings the coordinator cannot run with.
    pub fn validate(&self) -> EscrowResult<()> {
        if self.max_create_attempts == 0 {
            return Err(config_error("max_create_attempts must be at least 1"));
        }
        if self.backoff_base_secs > self.backoff_max_secs {
            return Err(config_error("backoff_base_secs exceeds backoff_max_secs"));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(config_error("adapter_timeout_ms must be positive"));
        }
        if self.recovery.interval_secs == 0 {
            return Err(config_error("recovery.interval_secs must be positive"));
        }
        if self.recovery.max_concurrent_swaps == 0 {
            return Err(config_error("recovery.max_concurrent_swaps must be positive"));
        }
        Ok(())
    }
}

fn config_error(reason: &str) -> EscrowError {
    EscrowError::InvalidConfig {
        reason: reason.to_string(),
    }
}

/// Recovery scheduler configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Seconds between scans.
    pub interval_secs: u64,

    /// Swaps processed concurrently per scan.
    pub max_concurrent_swaps: usize,

    /// Also `advance` swaps that are not yet due for cancellation.
    pub drive_in_flight: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_concurrent_swaps: 16,
            drive_in_flight: true,
        }
    }
}

impl RecoveryConfig {
    /// Scan interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
