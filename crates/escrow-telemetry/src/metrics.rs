//! Prometheus text exposition of the process-wide default registry.
//!
//! The engine registers its `escrow_*` metrics there when built with its
//! `metrics` feature; this module only encodes what has been registered.

use crate::TelemetryError;
use prometheus::{Encoder, TextEncoder};

/// Encode every registered metric in the Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}
