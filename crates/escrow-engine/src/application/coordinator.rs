//! # Escrow Coordinator
//!
//! Drives a swap through its lifecycle: paired escrow creation, funding
//! verification, secret release and withdrawals, or timelock-gated recovery.
//!
//! Every adapter call follows the same three steps:
//!
//! 1. Under the swap lock, check state, mark the escrow in flight, snapshot.
//! 2. Without any lock, call the adapter (bounded by `adapter_timeout_ms`).
//! 3. Under the swap lock again, clear the marker and apply the result.
//!
//! The in-flight marker is what keeps re-entrant `advance` calls from issuing
//! a second call for the same escrow. An [`InFlightGuard`] owns the marker
//! between steps 1 and 3, so a caller dropping its future mid-call (a
//! transport deadline, a `select!` branch losing) releases the escrow for
//! the next attempt instead of stranding it.

use super::registry::SwapRegistry;
use crate::algorithms::{backoff_delay, HashlockManager, TimelockPolicy};
use crate::config::CoordinatorConfig;
use crate::domain::{
    invariant_distinct_parties, invariant_hashlock_well_formed, invariant_non_zero_amounts,
    AdapterError, ChainEscrowStatus, ChainHandle, ChainId, CoordinationState, EscrowError,
    EscrowResult, EscrowSide, EscrowState, InFlightOp, SecureSecret, SwapEventKind, SwapId,
    SwapIntent, SwapRecord, TimelockPhase,
};
use crate::metrics;
use crate::ports::inbound::EscrowCoordinatorApi;
use crate::ports::outbound::{ChainAdapter, Clock};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One adapter call prepared under the swap lock.
struct SideCall {
    side: EscrowSide,
    chain: ChainId,
    handle: ChainHandle,
    adapter: Arc<dyn ChainAdapter>,
    op: InFlightOp,
}

/// Clears in-flight markers on drop unless the call was committed.
struct InFlightGuard {
    registry: Arc<SwapRegistry>,
    swap_id: SwapId,
    sides: Vec<EscrowSide>,
    committed: bool,
}

impl InFlightGuard {
    fn new(registry: &Arc<SwapRegistry>, swap_id: SwapId, sides: Vec<EscrowSide>) -> Self {
        Self {
            registry: Arc::clone(registry),
            swap_id,
            sides,
            committed: false,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for side in &self.sides {
            self.registry.clear_in_flight(self.swap_id, *side);
        }
        warn!(
            swap_id = %self.swap_id,
            sides = ?self.sides,
            "[escrow] Adapter call abandoned, escrow released for retry"
        );
    }
}

enum RevealOutcome {
    Revealed,
    AlreadyRevealed,
    Expired {
        side: EscrowSide,
        phase: TimelockPhase,
    },
}

/// Escrow Coordinator - the only writer of swap records.
pub struct EscrowCoordinator {
    config: CoordinatorConfig,
    registry: Arc<SwapRegistry>,
    adapters: HashMap<ChainId, Arc<dyn ChainAdapter>>,
    clock: Arc<dyn Clock>,
}

impl EscrowCoordinator {
    /// Create a coordinator with no chain adapters.
    pub fn new(config: CoordinatorConfig, registry: Arc<SwapRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            registry,
            adapters: HashMap::new(),
            clock,
        }
    }

    /// Register the adapter for its chain, replacing any previous one.
    pub fn with_adapter(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.register_adapter(adapter);
        self
    }

    /// Register the adapter for its chain, replacing any previous one.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ChainAdapter>) {
        info!(chain = %adapter.chain(), "[escrow] Chain adapter registered");
        self.adapters.insert(adapter.chain(), adapter);
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<SwapRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    fn adapter_for(&self, chain: ChainId) -> EscrowResult<Arc<dyn ChainAdapter>> {
        self.adapters
            .get(&chain)
            .cloned()
            .ok_or(EscrowError::UnsupportedChain(chain))
    }

    fn validate_intent(&self, intent: &SwapIntent) -> EscrowResult<()> {
        invariant_non_zero_amounts(intent)?;
        if !invariant_hashlock_well_formed(&intent.hashlock) {
            return Err(EscrowError::invalid_intent("hashlock is all zeroes"));
        }
        invariant_distinct_parties(intent)?;
        for leg in [&intent.source, &intent.destination] {
            if !self.adapters.contains_key(&leg.chain) {
                return Err(EscrowError::invalid_intent(format!(
                    "no adapter for chain {}",
                    leg.chain
                )));
            }
        }
        TimelockPolicy::validate_pair(
            &intent.source.schedule,
            &intent.destination.schedule,
            self.config.finality_buffer_secs,
        )
    }

    fn retry_at(&self, now: u64, attempts: u32) -> u64 {
        now.saturating_add(backoff_delay(
            attempts,
            self.config.backoff_base_secs,
            self.config.backoff_max_secs,
        ))
    }

    /// Run an adapter future under the configured timeout.
    async fn bounded<T>(
        &self,
        chain: ChainId,
        operation: &'static str,
        call: impl Future<Output = Result<T, AdapterError>>,
    ) -> Result<T, AdapterError> {
        let result = match tokio::time::timeout(self.config.adapter_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout {
                after_ms: self.config.adapter_timeout_ms,
            }),
        };
        if let Err(e) = &result {
            metrics::record_adapter_error(&chain.to_string(), operation);
            debug!(chain = %chain, operation, error = %e, "[escrow] Adapter call failed");
        }
        result
    }

    /// Submit a withdrawal or cancellation, then read back the final status.
    async fn submit_and_confirm(
        &self,
        call: &SideCall,
        secret: Option<&SecureSecret>,
    ) -> Result<ChainEscrowStatus, AdapterError> {
        let submitted = match secret {
            Some(secret) => {
                let submit = call.adapter.submit_withdrawal(&call.handle, secret);
                self.bounded(call.chain, "submit_withdrawal", submit).await
            }
            None => {
                let submit = call.adapter.submit_cancellation(&call.handle);
                self.bounded(call.chain, "submit_cancellation", submit).await
            }
        };
        let status = self
            .bounded(call.chain, "query_state", call.adapter.query_state(&call.handle))
            .await;
        match (submitted, status) {
            (_, Ok(s @ (ChainEscrowStatus::Withdrawn | ChainEscrowStatus::Cancelled))) => Ok(s),
            (Err(e), _) => Err(e),
            (Ok(()), status) => status,
        }
    }

    /// Step 3 helper: clear the marker and apply `f`, never leaving the marker behind.
    fn commit_op<R>(
        &self,
        mut guard: InFlightGuard,
        f: impl FnOnce(&mut SwapRecord) -> EscrowResult<R>,
    ) -> EscrowResult<R> {
        let swap_id = guard.swap_id;
        let result = self.registry.update(swap_id, |r| {
            for side in &guard.sides {
                r.escrow_mut(*side).in_flight = None;
            }
            f(r)
        });
        if result.is_err() {
            for side in &guard.sides {
                self.registry.clear_in_flight(swap_id, *side);
            }
        }
        guard.committed = true;
        result
    }

    fn current_escrow_state(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<EscrowState> {
        Ok(self.registry.get_swap_state(swap_id)?.escrow(side).state)
    }

    fn current_state(&self, swap_id: SwapId) -> EscrowResult<CoordinationState> {
        Ok(self.registry.get_swap_state(swap_id)?.coordination_state)
    }

    // -------------------------------------------------------------------------
    // Escrow creation
    // -------------------------------------------------------------------------

    async fn request_side(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<EscrowState> {
        let now = self.clock.now();
        let max_attempts = self.config.max_create_attempts;
        let prepared = self.registry.update(swap_id, |r| {
            ensure_active(r)?;
            let escrow = r.escrow(side);
            if escrow.state != EscrowState::Requested
                || !escrow.retry_due(now)
                || escrow.create_attempts >= max_attempts
            {
                return Ok(None);
            }
            let target = requested_state(side);
            let entry = match side {
                EscrowSide::Source => CoordinationState::Pending,
                EscrowSide::Destination => CoordinationState::SourceEscrowFunded,
            };
            if r.coordination_state == entry {
                transition(r, target, now)?;
            } else if r.coordination_state != target {
                warn!(
                    swap_id = %swap_id,
                    side = %side,
                    from = ?r.coordination_state,
                    to = ?target,
                    "[escrow] Escrow request out of order"
                );
                return Err(EscrowError::InvalidTransition {
                    from: r.coordination_state,
                    to: target,
                });
            }
            let adapter = self.adapter_for(r.escrow(side).chain)?;

            let escrow = r.escrow_mut(side);
            escrow.in_flight = Some(InFlightOp::Create);
            escrow.create_attempts += 1;
            let attempt = escrow.create_attempts;
            let mut snapshot = escrow.clone();
            if side == EscrowSide::Source {
                // Anchor candidate; committed only if creation succeeds.
                snapshot.deployed_at = Some(now);
            }
            r.record(now, SwapEventKind::EscrowRequested { side, attempt });
            debug!(swap_id = %swap_id, side = %side, attempt, "[escrow] Requesting escrow");
            Ok(Some((snapshot, adapter)))
        })?;

        let Some((snapshot, adapter)) = prepared else {
            return self.current_escrow_state(swap_id, side);
        };
        let guard = InFlightGuard::new(&self.registry, swap_id, vec![side]);

        let result = self
            .bounded(snapshot.chain, "create_escrow", adapter.create_escrow(&snapshot))
            .await;

        let now = self.clock.now();
        self.commit_op(guard, |r| {
            match result {
                Ok(handle) => apply_created(r, side, handle, snapshot.deployed_at, now),
                Err(e) => self.apply_create_failure(r, side, &e, now)?,
            }
            Ok(r.escrow(side).state)
        })
    }

    fn apply_create_failure(
        &self,
        r: &mut SwapRecord,
        side: EscrowSide,
        error: &AdapterError,
        now: u64,
    ) -> EscrowResult<()> {
        let attempt = r.escrow(side).create_attempts;
        warn!(
            swap_id = %r.swap_id,
            side = %side,
            attempt,
            error = %error,
            "[escrow] Escrow creation failed"
        );
        r.record(
            now,
            SwapEventKind::CreationFailed {
                side,
                attempt,
                error: error.to_string(),
            },
        );

        if r.escrow(side).state != EscrowState::Requested {
            return Ok(());
        }
        if attempt < self.config.max_create_attempts {
            r.escrow_mut(side).next_attempt_at = self.retry_at(now, attempt);
            return Ok(());
        }

        warn!(swap_id = %r.swap_id, side = %side, attempt, "[escrow] Escrow creation attempts exhausted");
        if r.funded_sides().contains(&side.other()) {
            if r.coordination_state != CoordinationState::Recovering && !r.is_terminal() {
                transition(r, CoordinationState::Recovering, now)?;
            }
        } else {
            r.escrow_mut(side).try_transition(EscrowState::Failed, now);
            if r.coordination_state.can_transition_to(CoordinationState::Failed) {
                transition(r, CoordinationState::Failed, now)?;
            } else if r.coordination_state != CoordinationState::Recovering && !r.is_terminal() {
                transition(r, CoordinationState::Recovering, now)?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Funding verification
    // -------------------------------------------------------------------------

    async fn verify_side(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<EscrowState> {
        let prepared = self.registry.update(swap_id, |r| {
            ensure_active(r)?;
            let escrow = r.escrow(side);
            if escrow.state != EscrowState::Created || escrow.in_flight.is_some() {
                return Ok(None);
            }
            let Some(handle) = escrow.chain_escrow_address.clone() else {
                return Ok(None);
            };
            let chain = escrow.chain;
            let adapter = self.adapter_for(chain)?;
            r.escrow_mut(side).in_flight = Some(InFlightOp::Query);
            Ok(Some(SideCall {
                side,
                chain,
                handle,
                adapter,
                op: InFlightOp::Query,
            }))
        })?;

        let Some(call) = prepared else {
            return self.current_escrow_state(swap_id, side);
        };
        let guard = InFlightGuard::new(&self.registry, swap_id, vec![call.side]);

        let result = self
            .bounded(call.chain, "query_state", call.adapter.query_state(&call.handle))
            .await;

        let now = self.clock.now();
        self.commit_op(guard, |r| {
            apply_status(r, call.side, result, now)?;
            Ok(r.escrow(call.side).state)
        })
    }

    // -------------------------------------------------------------------------
    // Withdrawals
    // -------------------------------------------------------------------------

    async fn drive_withdrawals(&self, swap_id: SwapId) -> EscrowResult<()> {
        let now = self.clock.now();
        let prepared = self.registry.update(swap_id, |r| {
            if r.coordination_state != CoordinationState::SecretRevealed {
                return Ok(None);
            }
            let Some(secret) = r.secret.clone() else {
                return Ok(None);
            };
            let mut calls = Vec::new();
            for side in EscrowSide::BOTH {
                let escrow = r.escrow(side);
                if escrow.state != EscrowState::Funded || !escrow.retry_due(now) {
                    continue;
                }
                let Some(handle) = escrow.chain_escrow_address.clone() else {
                    continue;
                };
                let chain = escrow.chain;
                let adapter = match self.adapter_for(chain) {
                    Ok(adapter) => adapter,
                    Err(e) => {
                        warn!(swap_id = %swap_id, side = %side, error = %e, "[escrow] Cannot withdraw");
                        continue;
                    }
                };
                r.escrow_mut(side).in_flight = Some(InFlightOp::Withdraw);
                r.record(now, SwapEventKind::WithdrawalSubmitted { side });
                calls.push(SideCall {
                    side,
                    chain,
                    handle,
                    adapter,
                    op: InFlightOp::Withdraw,
                });
            }
            Ok(Some((secret, calls)))
        })?;

        let Some((secret, calls)) = prepared else {
            return Ok(());
        };
        if calls.is_empty() {
            return Ok(());
        }
        let sides = calls.iter().map(|c| c.side).collect();
        let guard = InFlightGuard::new(&self.registry, swap_id, sides);

        // Both sides at once; one side failing never holds back the other.
        let secret = &secret;
        let results = join_all(calls.iter().map(|call| async move {
            (call.side, self.submit_and_confirm(call, Some(secret)).await)
        }))
        .await;

        let now = self.clock.now();
        self.commit_op(guard, |r| {
            for (side, result) in results {
                match result {
                    Ok(ChainEscrowStatus::Withdrawn) => apply_withdrawal_confirmed(r, side, now)?,
                    Ok(ChainEscrowStatus::Cancelled) => {
                        warn!(swap_id = %swap_id, side = %side, "[escrow] Escrow cancelled after secret reveal");
                        if r.escrow_mut(side).try_transition(EscrowState::Cancelled, now) {
                            r.record(now, SwapEventKind::CancellationConfirmed { side });
                        }
                        if r.coordination_state == CoordinationState::SecretRevealed {
                            transition(r, CoordinationState::Recovering, now)?;
                        }
                    }
                    other => {
                        let escrow = r.escrow_mut(side);
                        escrow.action_attempts = escrow.action_attempts.saturating_add(1);
                        let attempt = escrow.action_attempts;
                        escrow.next_attempt_at = self.retry_at(now, attempt);
                        let error = match other {
                            Err(e) => e.to_string(),
                            Ok(status) => format!("status {:?}", status),
                        };
                        warn!(
                            swap_id = %swap_id,
                            side = %side,
                            attempt,
                            error = %error,
                            "[escrow] Withdrawal not confirmed, will retry"
                        );
                    }
                }
            }
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    async fn drive_cancellation(&self, swap_id: SwapId) -> EscrowResult<()> {
        let now = self.clock.now();
        let calls = self.registry.update(swap_id, |r| {
            if r.coordination_state != CoordinationState::Recovering {
                return Ok(Vec::new());
            }
            let mut calls = Vec::new();
            for side in EscrowSide::BOTH {
                let escrow = r.escrow(side);
                if !matches!(escrow.state, EscrowState::Created | EscrowState::Funded)
                    || !escrow.retry_due(now)
                {
                    continue;
                }
                let Some(handle) = escrow.chain_escrow_address.clone() else {
                    continue;
                };
                // Created escrows stay open until cancelled, funded or not.
                let op = if escrow.phase(now).is_cancellable() {
                    InFlightOp::Cancel
                } else if escrow.state == EscrowState::Created {
                    InFlightOp::Query
                } else {
                    debug!(swap_id = %swap_id, side = %side, "[escrow] Waiting for cancellation window");
                    continue;
                };
                let chain = escrow.chain;
                let adapter = match self.adapter_for(chain) {
                    Ok(adapter) => adapter,
                    Err(e) => {
                        warn!(swap_id = %swap_id, side = %side, error = %e, "[escrow] Cannot cancel");
                        continue;
                    }
                };
                r.escrow_mut(side).in_flight = Some(op);
                if op == InFlightOp::Cancel {
                    r.record(now, SwapEventKind::CancellationSubmitted { side });
                }
                calls.push(SideCall {
                    side,
                    chain,
                    handle,
                    adapter,
                    op,
                });
            }
            if calls.is_empty() {
                finish_refund(r, now)?;
            }
            Ok(calls)
        })?;

        if calls.is_empty() {
            return Ok(());
        }
        let sides = calls.iter().map(|c| c.side).collect();
        let guard = InFlightGuard::new(&self.registry, swap_id, sides);

        let results = join_all(calls.iter().map(|call| async move {
            let result = match call.op {
                InFlightOp::Cancel => self.submit_and_confirm(call, None).await,
                _ => {
                    self.bounded(call.chain, "query_state", call.adapter.query_state(&call.handle))
                        .await
                }
            };
            (call.side, call.op, result)
        }))
        .await;

        let now = self.clock.now();
        self.commit_op(guard, |r| {
            for (side, op, result) in results {
                if op == InFlightOp::Query {
                    apply_status(r, side, result, now)?;
                    continue;
                }
                match result {
                    Ok(ChainEscrowStatus::Cancelled) => {
                        if r.escrow_mut(side).try_transition(EscrowState::Cancelled, now) {
                            info!(swap_id = %swap_id, side = %side, "[escrow] Cancellation confirmed");
                            r.record(now, SwapEventKind::CancellationConfirmed { side });
                        }
                    }
                    Ok(ChainEscrowStatus::Withdrawn) => {
                        warn!(swap_id = %swap_id, side = %side, "[escrow] Escrow withdrawn during recovery");
                        if r.escrow_mut(side).try_transition(EscrowState::Withdrawn, now) {
                            r.record(now, SwapEventKind::WithdrawalConfirmed { side });
                        }
                    }
                    other => {
                        let escrow = r.escrow_mut(side);
                        escrow.action_attempts = escrow.action_attempts.saturating_add(1);
                        let attempt = escrow.action_attempts;
                        escrow.next_attempt_at = self.retry_at(now, attempt);
                        let error = match other {
                            Err(e) => e.to_string(),
                            Ok(status) => format!("status {:?}", status),
                        };
                        warn!(
                            swap_id = %swap_id,
                            side = %side,
                            attempt,
                            error = %error,
                            "[escrow] Cancellation not confirmed, will retry"
                        );
                    }
                }
            }
            finish_refund(r, now)
        })
    }
}

#[async_trait]
impl EscrowCoordinatorApi for EscrowCoordinator {
    async fn initiate_swap(&self, intent: SwapIntent) -> EscrowResult<SwapId> {
        if let Err(e) = self.validate_intent(&intent) {
            warn!(error = %e, "[escrow] Intent rejected");
            return Err(e);
        }
        let now = self.clock.now();
        let record = SwapRecord::new(intent, now);
        let swap_id = record.swap_id;
        if let Err(e) = self.registry.insert(record) {
            warn!(swap_id = %swap_id, error = %e, "[escrow] Intent rejected");
            return Err(e);
        }
        metrics::record_swap_initiated();
        info!(swap_id = %swap_id, "[escrow] Swap initiated");
        Ok(swap_id)
    }

    async fn advance(&self, swap_id: SwapId) -> EscrowResult<CoordinationState> {
        let snapshot = self.registry.get_swap_state(swap_id)?;
        ensure_active(&snapshot)?;

        use CoordinationState::*;
        match snapshot.coordination_state {
            Pending | SourceEscrowRequested => {
                self.step_side(swap_id, EscrowSide::Source, &snapshot).await?
            }
            SourceEscrowFunded | DestinationEscrowRequested => {
                self.step_side(swap_id, EscrowSide::Destination, &snapshot).await?
            }
            DestinationEscrowFunded => {
                let now = self.clock.now();
                self.registry.update(swap_id, |r| {
                    // Compare-and-set: concurrent advances apply this once.
                    if r.coordination_state == DestinationEscrowFunded {
                        transition(r, BothFunded, now)?;
                        info!(swap_id = %swap_id, "[escrow] Both escrows funded, ready for secret");
                    }
                    Ok(())
                })?;
            }
            BothFunded => debug!(swap_id = %swap_id, "[escrow] Awaiting secret reveal"),
            SecretRevealed => self.drive_withdrawals(swap_id).await?,
            Recovering => self.drive_cancellation(swap_id).await?,
            Completed | Refunded | Failed => {}
        }
        self.current_state(swap_id)
    }

    async fn request_escrow(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<EscrowState> {
        self.request_side(swap_id, side).await
    }

    async fn verify_funding(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<EscrowState> {
        self.verify_side(swap_id, side).await
    }

    async fn reveal_secret(&self, swap_id: SwapId, secret: SecureSecret) -> EscrowResult<()> {
        let now = self.clock.now();
        let outcome = self.registry.update(swap_id, |r| {
            ensure_active(r)?;
            match r.coordination_state {
                CoordinationState::SecretRevealed => {
                    return if r.secret.as_ref() == Some(&secret) {
                        Ok(RevealOutcome::AlreadyRevealed)
                    } else {
                        Err(EscrowError::HashlockMismatch)
                    };
                }
                CoordinationState::BothFunded => {}
                from => {
                    return Err(EscrowError::InvalidTransition {
                        from,
                        to: CoordinationState::SecretRevealed,
                    })
                }
            }
            if !HashlockManager::verify(&secret, &r.intent.hashlock) {
                return Err(EscrowError::HashlockMismatch);
            }
            if let Some(side) = r.expired_side(now) {
                let phase = r.escrow(side).phase(now);
                transition(r, CoordinationState::Recovering, now)?;
                r.record(
                    now,
                    SwapEventKind::RevealRejected {
                        reason: "timelock_expired".to_string(),
                    },
                );
                return Ok(RevealOutcome::Expired { side, phase });
            }
            r.secret = Some(secret.clone());
            transition(r, CoordinationState::SecretRevealed, now)?;
            r.record(now, SwapEventKind::SecretRevealed);
            Ok(RevealOutcome::Revealed)
        });

        match outcome {
            Err(e) => {
                metrics::record_reveal_rejected(e.label());
                warn!(swap_id = %swap_id, error = %e, "[escrow] Secret reveal rejected");
                Err(e)
            }
            Ok(RevealOutcome::Expired { side, phase }) => {
                let err = EscrowError::TimelockExpired { side, phase };
                metrics::record_reveal_rejected(err.label());
                warn!(swap_id = %swap_id, side = %side, phase = ?phase, "[escrow] Late reveal, recovering");
                Err(err)
            }
            Ok(RevealOutcome::Revealed) | Ok(RevealOutcome::AlreadyRevealed) => {
                self.drive_withdrawals(swap_id).await
            }
        }
    }

    async fn mark_completed(&self, swap_id: SwapId, side: EscrowSide) -> EscrowResult<CoordinationState> {
        let now = self.clock.now();
        self.registry.update(swap_id, |r| {
            ensure_active(r)?;
            let escrow_state = r.escrow(side).state;
            if r.coordination_state != CoordinationState::SecretRevealed
                || !matches!(escrow_state, EscrowState::Funded | EscrowState::Withdrawn)
            {
                warn!(
                    swap_id = %swap_id,
                    side = %side,
                    from = ?r.coordination_state,
                    escrow = ?escrow_state,
                    "[escrow] Withdrawal confirmation out of order"
                );
                return Err(EscrowError::InvalidTransition {
                    from: r.coordination_state,
                    to: CoordinationState::Completed,
                });
            }
            apply_withdrawal_confirmed(r, side, now)?;
            Ok(r.coordination_state)
        })
    }

    async fn cancel(&self, swap_id: SwapId) -> EscrowResult<CoordinationState> {
        let now = self.clock.now();
        self.registry.update(swap_id, |r| {
            ensure_active(r)?;
            if r.coordination_state.is_secret_revealed() {
                warn!(swap_id = %swap_id, "[escrow] Cancel refused, secret already public");
                return Err(EscrowError::InvalidTransition {
                    from: r.coordination_state,
                    to: CoordinationState::Recovering,
                });
            }
            if r.coordination_state != CoordinationState::Recovering {
                transition(r, CoordinationState::Recovering, now)?;
            }
            Ok(())
        })?;
        self.drive_cancellation(swap_id).await?;
        self.current_state(swap_id)
    }

    fn get_swap_state(&self, swap_id: SwapId) -> EscrowResult<SwapRecord> {
        self.registry.get_swap_state(swap_id)
    }
}

impl EscrowCoordinator {
    async fn step_side(&self, swap_id: SwapId, side: EscrowSide, snapshot: &SwapRecord) -> EscrowResult<()> {
        match snapshot.escrow(side).state {
            EscrowState::Requested => {
                self.request_side(swap_id, side).await?;
            }
            EscrowState::Created => {
                self.verify_side(swap_id, side).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// Record mutations (called under the swap lock)
// =============================================================================

fn ensure_active(r: &SwapRecord) -> EscrowResult<()> {
    if r.is_terminal() {
        return Err(EscrowError::AlreadyTerminal(r.coordination_state));
    }
    Ok(())
}

fn requested_state(side: EscrowSide) -> CoordinationState {
    match side {
        EscrowSide::Source => CoordinationState::SourceEscrowRequested,
        EscrowSide::Destination => CoordinationState::DestinationEscrowRequested,
    }
}

fn funded_state(side: EscrowSide) -> CoordinationState {
    match side {
        EscrowSide::Source => CoordinationState::SourceEscrowFunded,
        EscrowSide::Destination => CoordinationState::DestinationEscrowFunded,
    }
}

fn terminal_label(state: CoordinationState) -> &'static str {
    match state {
        CoordinationState::Completed => "completed",
        CoordinationState::Refunded => "refunded",
        _ => "failed",
    }
}

/// Coordination transition with logging on both outcomes.
fn transition(r: &mut SwapRecord, next: CoordinationState, now: u64) -> EscrowResult<()> {
    let from = r.coordination_state;
    match r.transition_to(next, now) {
        Ok(()) => {
            info!(swap_id = %r.swap_id, from = ?from, to = ?next, "[escrow] State transition");
            if next.is_terminal() {
                metrics::record_swap_finished(terminal_label(next));
            }
            Ok(())
        }
        Err(e) => {
            warn!(swap_id = %r.swap_id, from = ?from, to = ?next, "[escrow] Transition rejected");
            Err(e)
        }
    }
}

fn apply_created(
    r: &mut SwapRecord,
    side: EscrowSide,
    handle: ChainHandle,
    anchor: Option<u64>,
    now: u64,
) {
    let escrow = r.escrow_mut(side);
    if !escrow.try_transition(EscrowState::Created, now) {
        return;
    }
    escrow.chain_escrow_address = Some(handle.clone());
    info!(swap_id = %r.swap_id, side = %side, handle = %handle, "[escrow] Escrow created");
    r.record(now, SwapEventKind::EscrowCreated { side, handle });
    if let Some(anchor) = anchor {
        r.anchor_timelocks(anchor);
    }
}

fn apply_status(
    r: &mut SwapRecord,
    side: EscrowSide,
    result: Result<ChainEscrowStatus, AdapterError>,
    now: u64,
) -> EscrowResult<()> {
    let swap_id = r.swap_id;
    match result {
        Ok(ChainEscrowStatus::Funded(amount)) => {
            let required = r.escrow(side).required_funding();
            if amount < required {
                debug!(swap_id = %swap_id, side = %side, amount, required, "[escrow] Escrow underfunded");
                return Ok(());
            }
            if r.escrow_mut(side).try_transition(EscrowState::Funded, now) {
                info!(swap_id = %swap_id, side = %side, amount, "[escrow] Escrow funded");
                r.record(now, SwapEventKind::EscrowFunded { side, amount });
                if r.coordination_state == requested_state(side) {
                    transition(r, funded_state(side), now)?;
                }
            }
        }
        Ok(ChainEscrowStatus::Unfunded) => {
            debug!(swap_id = %swap_id, side = %side, "[escrow] Awaiting funds");
        }
        Ok(ChainEscrowStatus::Cancelled) => {
            if r.escrow_mut(side).try_transition(EscrowState::Cancelled, now) {
                warn!(swap_id = %swap_id, side = %side, "[escrow] Escrow cancelled on chain");
                r.record(now, SwapEventKind::CancellationConfirmed { side });
            }
        }
        Ok(ChainEscrowStatus::Withdrawn) => {
            warn!(swap_id = %swap_id, side = %side, "[escrow] Unexpected withdrawal of unfunded escrow");
        }
        Err(e) => {
            warn!(swap_id = %swap_id, side = %side, error = %e, "[escrow] Funding query failed");
        }
    }
    Ok(())
}

fn apply_withdrawal_confirmed(r: &mut SwapRecord, side: EscrowSide, now: u64) -> EscrowResult<()> {
    if r.escrow_mut(side).try_transition(EscrowState::Withdrawn, now) {
        info!(swap_id = %r.swap_id, side = %side, "[escrow] Withdrawal confirmed");
        r.record(now, SwapEventKind::WithdrawalConfirmed { side });
    }
    let both_withdrawn = EscrowSide::BOTH
        .iter()
        .all(|s| r.escrow(*s).state == EscrowState::Withdrawn);
    if both_withdrawn && r.coordination_state == CoordinationState::SecretRevealed {
        transition(r, CoordinationState::Completed, now)?;
    }
    Ok(())
}

/// Move to `Refunded` once no escrow is open on chain.
fn finish_refund(r: &mut SwapRecord, now: u64) -> EscrowResult<()> {
    if r.coordination_state != CoordinationState::Recovering {
        return Ok(());
    }
    let open = !r.funded_sides().is_empty()
        || EscrowSide::BOTH.iter().any(|side| {
            let escrow = r.escrow(*side);
            escrow.in_flight.is_some() || escrow.state == EscrowState::Created
        });
    if !open {
        transition(r, CoordinationState::Refunded, now)?;
    }
    Ok(())
}
