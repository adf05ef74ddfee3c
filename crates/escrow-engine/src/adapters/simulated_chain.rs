//! Simulated Chain Adapter
//!
//! Implements the `ChainAdapter` port against an in-memory ledger. Enforces
//! the same rules a real escrow contract would: hashlock on withdrawal and
//! the timelock permission table on both withdrawal and cancellation.

use crate::algorithms::{HashlockManager, TimelockPolicy};
use crate::domain::{
    AdapterError, CallerRole, ChainEscrowStatus, ChainHandle, ChainId, EscrowRecord, EscrowSide,
    Hash, SecureSecret, SwapId, TimelockSchedule,
};
use crate::ports::outbound::{ChainAdapter, Clock};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Number of calls received per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `create_escrow`
    pub create: u64,
    /// `query_state`
    pub query: u64,
    /// `submit_withdrawal`
    pub withdraw: u64,
    /// `submit_cancellation`
    pub cancel: u64,
}

#[derive(Clone, Debug)]
struct SimEscrow {
    hashlock: Hash,
    schedule: TimelockSchedule,
    deployed_at: u64,
    balance: u64,
    status: ChainEscrowStatus,
}

/// In-memory chain for tests and the demo node.
pub struct SimulatedChainAdapter {
    chain: ChainId,
    clock: Arc<dyn Clock>,
    escrows: RwLock<HashMap<ChainHandle, SimEscrow>>,
    handles: RwLock<HashMap<(SwapId, EscrowSide), ChainHandle>>,
    auto_fund: AtomicBool,
    fail_creates: AtomicU32,
    fail_withdrawals: AtomicBool,
    fail_cancellations: AtomicBool,
    latency: Mutex<Option<Duration>>,
    create_calls: AtomicU64,
    query_calls: AtomicU64,
    withdraw_calls: AtomicU64,
    cancel_calls: AtomicU64,
}

impl SimulatedChainAdapter {
    /// New adapter that funds escrows as soon as they are created.
    pub fn new(chain: ChainId, clock: Arc<dyn Clock>) -> Self {
        Self {
            chain,
            clock,
            escrows: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
            auto_fund: AtomicBool::new(true),
            fail_creates: AtomicU32::new(0),
            fail_withdrawals: AtomicBool::new(false),
            fail_cancellations: AtomicBool::new(false),
            latency: Mutex::new(None),
            create_calls: AtomicU64::new(0),
            query_calls: AtomicU64::new(0),
            withdraw_calls: AtomicU64::new(0),
            cancel_calls: AtomicU64::new(0),
        }
    }

    /// Whether new escrows are funded at creation.
    pub fn set_auto_fund(&self, enabled: bool) {
        self.auto_fund.store(enabled, Ordering::SeqCst);
    }

    /// Fail the next `n` `create_escrow` calls with a network error.
    pub fn fail_next_creates(&self, n: u32) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// Fail every withdrawal while set.
    pub fn fail_withdrawals(&self, fail: bool) {
        self.fail_withdrawals.store(fail, Ordering::SeqCst);
    }

    /// Fail every cancellation while set.
    pub fn fail_cancellations(&self, fail: bool) {
        self.fail_cancellations.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Deposit into an existing escrow.
    pub fn deposit(&self, handle: &ChainHandle, amount: u64) -> Result<(), AdapterError> {
        let mut escrows = self.escrows.write();
        let escrow = escrows
            .get_mut(handle)
            .ok_or_else(|| AdapterError::UnknownEscrow(handle.clone()))?;
        escrow.balance = escrow.balance.saturating_add(amount);
        Ok(())
    }

    /// Handle of the escrow created for `(swap_id, side)`, if any.
    pub fn handle_for(&self, swap_id: SwapId, side: EscrowSide) -> Option<ChainHandle> {
        self.handles.read().get(&(swap_id, side)).cloned()
    }

    /// On-chain status without counting a call.
    pub fn status_of(&self, handle: &ChainHandle) -> Option<ChainEscrowStatus> {
        self.escrows.read().get(handle).map(Self::project)
    }

    /// Number of escrows on this chain.
    pub fn escrow_count(&self) -> usize {
        self.escrows.read().len()
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            create: self.create_calls.load(Ordering::SeqCst),
            query: self.query_calls.load(Ordering::SeqCst),
            withdraw: self.withdraw_calls.load(Ordering::SeqCst),
            cancel: self.cancel_calls.load(Ordering::SeqCst),
        }
    }

    fn project(escrow: &SimEscrow) -> ChainEscrowStatus {
        match escrow.status {
            ChainEscrowStatus::Unfunded if escrow.balance > 0 => {
                ChainEscrowStatus::Funded(escrow.balance)
            }
            status => status,
        }
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn handle_name(&self, record: &EscrowRecord) -> ChainHandle {
        ChainHandle(format!("{}/{}/{}", self.chain, record.swap_id, record.side))
    }
}

#[async_trait]
impl ChainAdapter for SimulatedChainAdapter {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn create_escrow(&self, record: &EscrowRecord) -> Result<ChainHandle, AdapterError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let remaining = self.fail_creates.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_creates.store(remaining - 1, Ordering::SeqCst);
            return Err(AdapterError::Network(format!("{} unreachable", self.chain)));
        }

        let key = (record.swap_id, record.side);
        if let Some(handle) = self.handles.read().get(&key) {
            debug!(swap_id = %record.swap_id, side = %record.side, "[escrow] Escrow already exists");
            return Ok(handle.clone());
        }

        let handle = self.handle_name(record);
        let balance = if self.auto_fund.load(Ordering::SeqCst) {
            record.required_funding()
        } else {
            0
        };
        let escrow = SimEscrow {
            hashlock: record.hashlock,
            schedule: record.timelock_schedule,
            deployed_at: record.deployed_at.unwrap_or_else(|| self.clock.now()),
            balance,
            status: ChainEscrowStatus::Unfunded,
        };
        self.escrows.write().insert(handle.clone(), escrow);
        self.handles.write().insert(key, handle.clone());

        info!(chain = %self.chain, handle = %handle, "[escrow] Simulated escrow created");
        Ok(handle)
    }

    async fn query_state(&self, handle: &ChainHandle) -> Result<ChainEscrowStatus, AdapterError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.status_of(handle)
            .ok_or_else(|| AdapterError::UnknownEscrow(handle.clone()))
    }

    async fn submit_withdrawal(
        &self,
        handle: &ChainHandle,
        secret: &SecureSecret,
    ) -> Result<(), AdapterError> {
        self.withdraw_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_withdrawals.load(Ordering::SeqCst) {
            return Err(AdapterError::Network(format!("{} unreachable", self.chain)));
        }

        let now = self.clock.now();
        let mut escrows = self.escrows.write();
        let escrow = escrows
            .get_mut(handle)
            .ok_or_else(|| AdapterError::UnknownEscrow(handle.clone()))?;

        match escrow.status {
            ChainEscrowStatus::Withdrawn => return Ok(()),
            ChainEscrowStatus::Cancelled => {
                return Err(AdapterError::Rejected("escrow cancelled".to_string()))
            }
            _ => {}
        }
        if !HashlockManager::verify(secret, &escrow.hashlock) {
            return Err(AdapterError::Rejected("invalid secret".to_string()));
        }
        let phase = TimelockPolicy::phase_of(&escrow.schedule, escrow.deployed_at, now);
        if !TimelockPolicy::may_withdraw(phase, CallerRole::Beneficiary) {
            return Err(AdapterError::Rejected(format!("withdrawal closed in {:?}", phase)));
        }
        if escrow.balance == 0 {
            return Err(AdapterError::Rejected("escrow not funded".to_string()));
        }

        escrow.status = ChainEscrowStatus::Withdrawn;
        escrow.balance = 0;
        debug!(chain = %self.chain, handle = %handle, "[escrow] Simulated withdrawal");
        Ok(())
    }

    async fn submit_cancellation(&self, handle: &ChainHandle) -> Result<(), AdapterError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_cancellations.load(Ordering::SeqCst) {
            return Err(AdapterError::Network(format!("{} unreachable", self.chain)));
        }

        let now = self.clock.now();
        let mut escrows = self.escrows.write();
        let escrow = escrows
            .get_mut(handle)
            .ok_or_else(|| AdapterError::UnknownEscrow(handle.clone()))?;

        match escrow.status {
            ChainEscrowStatus::Cancelled => return Ok(()),
            ChainEscrowStatus::Withdrawn => {
                return Err(AdapterError::Rejected("escrow withdrawn".to_string()))
            }
            _ => {}
        }
        let phase = TimelockPolicy::phase_of(&escrow.schedule, escrow.deployed_at, now);
        if !TimelockPolicy::may_cancel(phase, CallerRole::Owner) {
            return Err(AdapterError::Rejected(format!("cancellation closed in {:?}", phase)));
        }

        escrow.status = ChainEscrowStatus::Cancelled;
        escrow.balance = 0;
        debug!(chain = %self.chain, handle = %handle, "[escrow] Simulated cancellation");
        Ok(())
    }
}
