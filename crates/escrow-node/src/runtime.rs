//! # Node Runtime
//!
//! Owns the coordinator and the background recovery scheduler.
//!
//! ## Startup Sequence
//!
//! 1. Open the swap store and rebuild the registry from it
//! 2. Register one adapter per chain
//! 3. Spawn the recovery scheduler
//! 4. Optionally run a demo swap
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the scheduler through the watch channel
//! 2. Wait (bounded) for the in-progress scan to finish
//! 3. Dump metrics at debug level

use anyhow::{Context, Result};
use escrow_engine::{
    ChainId, Clock, CoordinationState, EscrowCoordinator, EscrowCoordinatorApi, HashlockManager,
    JsonFileSwapStore, RecoveryScheduler, SimulatedChainAdapter, SwapId, SwapIntentBuilder,
    SwapRegistry, SystemClock, TimelockSchedule,
};
use escrow_telemetry::log_swap_event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::NodeConfig;

/// Bound on waiting for the scheduler to stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on `advance` calls the demo swap makes before giving up.
const DEMO_MAX_STEPS: usize = 20;

/// Pause between demo steps; the recovery scheduler may hold the swap's
/// in-flight marker, in which case a step returns without progress.
const DEMO_STEP_DELAY: Duration = Duration::from_millis(100);

/// The running escrow node.
pub struct NodeRuntime {
    coordinator: Arc<EscrowCoordinator>,
    scheduler: Arc<RecoveryScheduler>,
    demo_swap: bool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    scheduler_task: Option<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Wire store, registry, adapters and coordinator.
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let store = Arc::new(
            JsonFileSwapStore::open(&config.data_dir)
                .with_context(|| format!("Failed to open swap store at {:?}", config.data_dir))?,
        );
        let registry = Arc::new(
            SwapRegistry::recover(store).context("Failed to recover swaps from store")?,
        );

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let coordinator = Arc::new(
            EscrowCoordinator::new(config.coordinator.clone(), registry, clock.clone())
                .with_adapter(Arc::new(SimulatedChainAdapter::new(ChainId::Icp, clock.clone())))
                .with_adapter(Arc::new(SimulatedChainAdapter::new(ChainId::Evm(1), clock))),
        );
        let scheduler = Arc::new(RecoveryScheduler::new(coordinator.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            coordinator,
            scheduler,
            demo_swap: config.demo_swap,
            shutdown_tx,
            shutdown_rx,
            scheduler_task: None,
        })
    }

    /// Start background work.
    pub async fn start(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Escrow Node v{}", escrow_engine::VERSION);
        info!("===========================================");

        let registry = self.coordinator.registry();
        let resumed = registry.non_terminal_ids();
        info!(
            swaps = registry.len(),
            resumed = resumed.len(),
            "[escrow] Registry loaded"
        );
        for swap_id in &resumed {
            if let Ok(record) = registry.get_swap_state(*swap_id) {
                log_swap_event!(info, "[escrow] Resuming swap", swap_id, state = ?record.coordination_state);
            }
        }
        if !resumed.is_empty() {
            warn!("[escrow] Simulated chains start empty; resumed swaps with on-chain escrows will retry until cancelled");
        }

        let task = self.scheduler.clone().spawn(self.shutdown_rx.clone());
        self.scheduler_task = Some(task);

        if self.demo_swap {
            let swap_id = self.run_demo_swap().await?;
            let state = self.coordinator.get_swap_state(swap_id)?.coordination_state;
            log_swap_event!(info, "[escrow] Demo swap finished", swap_id, state = ?state);
        }
        Ok(())
    }

    /// Run one swap end to end against the simulated chains.
    pub async fn run_demo_swap(&self) -> Result<SwapId> {
        let (secret, hashlock) = HashlockManager::generate_secret();
        let intent = SwapIntentBuilder::new(hashlock, self.coordinator.now())
            .source_amount(1_000)
            .destination_amount(2_000)
            .safety_deposit(10)
            .source_schedule(TimelockSchedule::new(600, 1_200, 3_600, 4_200))
            .destination_schedule(TimelockSchedule::new(300, 600, 1_800, 2_400))
            .build();

        let swap_id = self.coordinator.initiate_swap(intent).await?;
        log_swap_event!(info, "[escrow] Demo swap initiated", swap_id);

        for _ in 0..DEMO_MAX_STEPS {
            let state = self.coordinator.advance(swap_id).await?;
            debug!(swap_id = %swap_id, state = ?state, "[escrow] Demo swap advanced");
            if state == CoordinationState::BothFunded {
                self.coordinator.reveal_secret(swap_id, secret).await?;
                return Ok(swap_id);
            }
            tokio::time::sleep(DEMO_STEP_DELAY).await;
        }
        anyhow::bail!("demo swap {} did not reach BothFunded", swap_id)
    }

    /// Stop the scheduler and wait for it.
    pub async fn shutdown(mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Some(task) = self.scheduler_task.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Recovery scheduler task failed: {}", e),
                Err(_) => warn!("Recovery scheduler did not stop within {:?}", SHUTDOWN_GRACE),
            }
        }

        match escrow_telemetry::encode_metrics() {
            Ok(text) => debug!(metrics = %text, "Final metrics"),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
        info!("Shutdown complete");
    }

    /// Shared coordinator.
    pub fn coordinator(&self) -> Arc<EscrowCoordinator> {
        Arc::clone(&self.coordinator)
    }
}
