//! # Recovery Scheduler
//!
//! Periodic sweep over non-terminal swaps. A swap that has not reached
//! `SecretRevealed` when either escrow enters its cancellation phase is
//! cancelled; swaps already recovering (or withdrawing) are driven forward.

use super::coordinator::EscrowCoordinator;
use crate::config::RecoveryConfig;
use crate::domain::{CoordinationState, EscrowError, EscrowResult, SwapId};
use crate::metrics;
use crate::ports::inbound::EscrowCoordinatorApi;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Outcome of one scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Non-terminal swaps examined.
    pub scanned: usize,
    /// Swaps moved toward cancellation by this scan.
    pub cancellations: usize,
    /// Swaps advanced.
    pub advanced: usize,
    /// Swaps whose step returned an error.
    pub errors: usize,
}

enum ScanAction {
    Cancelled,
    Advanced,
    Skipped,
}

/// Drives expired swaps to `Refunded` without outside input.
pub struct RecoveryScheduler {
    coordinator: Arc<EscrowCoordinator>,
    config: RecoveryConfig,
}

impl RecoveryScheduler {
    /// Scheduler using the coordinator's recovery settings.
    pub fn new(coordinator: Arc<EscrowCoordinator>) -> Self {
        let config = coordinator.config().recovery.clone();
        Self {
            coordinator,
            config,
        }
    }

    /// Examine every non-terminal swap once.
    pub async fn scan_once(&self) -> RecoveryReport {
        let ids = self.coordinator.registry().non_terminal_ids();
        let scanned = ids.len();
        let now = self.coordinator.now();

        let cancellations = AtomicUsize::new(0);
        let advanced = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);
        let (cancellations_ref, advanced_ref, errors_ref) = (&cancellations, &advanced, &errors);

        stream::iter(ids)
            .for_each_concurrent(self.config.max_concurrent_swaps, move |swap_id| async move {
                match self.scan_swap(swap_id, now).await {
                    Ok(ScanAction::Cancelled) => {
                        cancellations_ref.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(ScanAction::Advanced) => {
                        advanced_ref.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(ScanAction::Skipped) | Err(EscrowError::AlreadyTerminal(_)) => {}
                    Err(e) => {
                        warn!(swap_id = %swap_id, error = %e, "[escrow] Recovery step failed");
                        errors_ref.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        let report = RecoveryReport {
            scanned,
            cancellations: cancellations.into_inner(),
            advanced: advanced.into_inner(),
            errors: errors.into_inner(),
        };
        metrics::record_recovery_scan(report.scanned, report.cancellations);
        debug!(
            scanned = report.scanned,
            cancellations = report.cancellations,
            advanced = report.advanced,
            errors = report.errors,
            "[escrow] Recovery scan finished"
        );
        report
    }

    async fn scan_swap(&self, swap_id: SwapId, now: u64) -> EscrowResult<ScanAction> {
        let snapshot = self.coordinator.get_swap_state(swap_id)?;
        let state = snapshot.coordination_state;
        if state.is_terminal() {
            return Ok(ScanAction::Skipped);
        }

        if !state.is_secret_revealed() && state != CoordinationState::Recovering {
            if let Some(side) = snapshot.expired_side(now) {
                info!(
                    swap_id = %swap_id,
                    side = %side,
                    from = ?state,
                    "[escrow] Timelock expired before reveal, cancelling"
                );
                self.coordinator.cancel(swap_id).await?;
                return Ok(ScanAction::Cancelled);
            }
        }

        let must_drive = matches!(
            state,
            CoordinationState::Recovering | CoordinationState::SecretRevealed
        );
        if must_drive || self.config.drive_in_flight {
            self.coordinator.advance(swap_id).await?;
            return Ok(ScanAction::Advanced);
        }
        Ok(ScanAction::Skipped)
    }

    /// Scan every `interval_secs` until `shutdown` flips to true or closes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.config.interval_secs,
            max_concurrent = self.config.max_concurrent_swaps,
            "[escrow] Recovery scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.scan_once().await;
                    if report.cancellations > 0 || report.errors > 0 {
                        info!(
                            scanned = report.scanned,
                            cancellations = report.cancellations,
                            errors = report.errors,
                            "[escrow] Recovery scan"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[escrow] Recovery scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Run on the tokio runtime.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
