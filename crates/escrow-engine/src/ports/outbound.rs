//! # Outbound Ports
//!
//! Traits for external dependencies: chain adapters, time, persistence.

use crate::domain::{
    AdapterError, ChainEscrowStatus, ChainHandle, ChainId, EscrowRecord, EscrowResult,
    SecureSecret, SwapRecord,
};
use async_trait::async_trait;

/// Chain adapter - outbound port, one implementation per chain.
///
/// Every call must be idempotent: the coordinator assumes at-least-once
/// delivery and re-issues calls after timeouts and restarts.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain served by this adapter.
    fn chain(&self) -> ChainId;

    /// Create (or find) the escrow described by `record`.
    async fn create_escrow(&self, record: &EscrowRecord) -> Result<ChainHandle, AdapterError>;

    /// Current on-chain status.
    async fn query_state(&self, handle: &ChainHandle) -> Result<ChainEscrowStatus, AdapterError>;

    /// Withdraw to the beneficiary with the secret.
    async fn submit_withdrawal(
        &self,
        handle: &ChainHandle,
        secret: &SecureSecret,
    ) -> Result<(), AdapterError>;

    /// Return the funds to the owner.
    async fn submit_cancellation(&self, handle: &ChainHandle) -> Result<(), AdapterError>;
}

/// Time source in unix seconds.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> u64;
}

/// Swap persistence - outbound port.
pub trait SwapStore: Send + Sync {
    /// Persist one record, replacing any previous version.
    fn save(&self, record: &SwapRecord) -> EscrowResult<()>;

    /// Load every persisted record.
    fn load_all(&self) -> EscrowResult<Vec<SwapRecord>>;
}
