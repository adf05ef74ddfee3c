//! # Inbound Ports
//!
//! API trait defining what the escrow coordinator can do. Exposed to the
//! order-intake boundary and to operational transports (RPC, queues).

use crate::domain::{
    CoordinationState, EscrowResult, EscrowSide, EscrowState, SecureSecret, SwapId, SwapIntent,
    SwapRecord,
};
use async_trait::async_trait;

/// Escrow coordination API - inbound port.
#[async_trait]
pub trait EscrowCoordinatorApi: Send + Sync {
    /// Validate and persist a new swap in `Pending`.
    async fn initiate_swap(&self, intent: SwapIntent) -> EscrowResult<SwapId>;

    /// Perform the next required step. Safe to call repeatedly.
    async fn advance(&self, swap_id: SwapId) -> EscrowResult<CoordinationState>;

    /// Ask the side's chain adapter to create its escrow.
    async fn request_escrow(&self, swap_id: SwapId, side: EscrowSide)
        -> EscrowResult<EscrowState>;

    /// Query the side's escrow and record funding once confirmed.
    async fn verify_funding(&self, swap_id: SwapId, side: EscrowSide)
        -> EscrowResult<EscrowState>;

    /// Release the secret and submit withdrawals on both chains.
    async fn reveal_secret(&self, swap_id: SwapId, secret: SecureSecret) -> EscrowResult<()>;

    /// Record a confirmed withdrawal on one side.
    async fn mark_completed(
        &self,
        swap_id: SwapId,
        side: EscrowSide,
    ) -> EscrowResult<CoordinationState>;

    /// Drive the swap toward `Refunded`.
    async fn cancel(&self, swap_id: SwapId) -> EscrowResult<CoordinationState>;

    /// Read-only snapshot.
    fn get_swap_state(&self, swap_id: SwapId) -> EscrowResult<SwapRecord>;
}
