//! # Escrow Telemetry
//!
//! Logging and metrics export for escrow engine processes.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with env filter, pretty or JSON output
//! - **Metrics**: Prometheus text encoding of the default registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use escrow_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(&TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `ESCROW_SERVICE_NAME` | `escrow-node` | Service name in logs |
//! | `ESCROW_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `ESCROW_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `ESCROW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::encode_metrics;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Global subscriber could not be installed.
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    /// Metric families could not be encoded.
    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),

    /// Bad filter directive or other configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize process telemetry. Call once, before any swap work starts.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_logging(config)
}
