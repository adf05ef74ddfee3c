//! # Escrow Metrics
//!
//! Prometheus metrics for swap coordination.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! escrow-engine = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `escrow_swaps_initiated_total` - Counter of accepted intents
//! - `escrow_swaps_finished_total` - Counter of swaps reaching a terminal state (by outcome)
//! - `escrow_adapter_errors_total` - Counter of adapter failures (by chain, operation)
//! - `escrow_reveals_rejected_total` - Counter of rejected secret reveals (by reason)
//! - `escrow_recovery_scans_total` - Counter of recovery scans
//! - `escrow_recovery_cancellations_total` - Counter of cancellations started by recovery
//! - `escrow_swaps_in_flight` - Gauge of non-terminal swaps seen by the last scan

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Accepted intents
    pub static ref SWAPS_INITIATED: IntCounter = register_int_counter!(
        "escrow_swaps_initiated_total",
        "Total number of swaps initiated"
    )
    .expect("Failed to create SWAPS_INITIATED metric");

    /// Terminal outcomes, labeled by state
    pub static ref SWAPS_FINISHED: IntCounterVec = register_int_counter_vec!(
        "escrow_swaps_finished_total",
        "Total number of swaps reaching a terminal state",
        &["outcome"]
    )
    .expect("Failed to create SWAPS_FINISHED metric");

    /// Adapter failures, labeled by chain and operation
    pub static ref ADAPTER_ERRORS: IntCounterVec = register_int_counter_vec!(
        "escrow_adapter_errors_total",
        "Total number of chain adapter failures",
        &["chain", "operation"]
    )
    .expect("Failed to create ADAPTER_ERRORS metric");

    /// Rejected reveals, labeled by reason
    pub static ref REVEALS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "escrow_reveals_rejected_total",
        "Total number of rejected secret reveals",
        &["reason"]
    )
    .expect("Failed to create REVEALS_REJECTED metric");

    /// Recovery scans
    pub static ref RECOVERY_SCANS: IntCounter = register_int_counter!(
        "escrow_recovery_scans_total",
        "Total number of recovery scans"
    )
    .expect("Failed to create RECOVERY_SCANS metric");

    /// Cancellations started by recovery
    pub static ref RECOVERY_CANCELLATIONS: IntCounter = register_int_counter!(
        "escrow_recovery_cancellations_total",
        "Total number of cancellations started by the recovery scheduler"
    )
    .expect("Failed to create RECOVERY_CANCELLATIONS metric");

    /// Non-terminal swaps at the last scan
    pub static ref SWAPS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "escrow_swaps_in_flight",
        "Number of non-terminal swaps seen by the last recovery scan"
    )
    .expect("Failed to create SWAPS_IN_FLIGHT metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record an accepted intent
#[cfg(feature = "metrics")]
pub fn record_swap_initiated() {
    SWAPS_INITIATED.inc();
}

/// Record a terminal outcome
#[cfg(feature = "metrics")]
pub fn record_swap_finished(outcome: &str) {
    SWAPS_FINISHED.with_label_values(&[outcome]).inc();
}

/// Record an adapter failure
#[cfg(feature = "metrics")]
pub fn record_adapter_error(chain: &str, operation: &str) {
    ADAPTER_ERRORS.with_label_values(&[chain, operation]).inc();
}

/// Record a rejected reveal
#[cfg(feature = "metrics")]
pub fn record_reveal_rejected(reason: &str) {
    REVEALS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a completed recovery scan
#[cfg(feature = "metrics")]
pub fn record_recovery_scan(in_flight: usize, cancellations: usize) {
    RECOVERY_SCANS.inc();
    RECOVERY_CANCELLATIONS.inc_by(cancellations as u64);
    SWAPS_IN_FLIGHT.set(in_flight as i64);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_swap_initiated() {}

#[cfg(not(feature = "metrics"))]
pub fn record_swap_finished(_outcome: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_adapter_error(_chain: &str, _operation: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reveal_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_recovery_scan(_in_flight: usize, _cancellations: usize) {}
