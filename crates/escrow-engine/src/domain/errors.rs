//! # Domain Errors
//!
//! Error taxonomy for the Escrow Coordination Engine.
//!
//! Only `Adapter` is retryable. Everything else is returned to the caller
//! and leaves the swap untouched (the single exception is a late secret
//! reveal, which moves the swap to `Recovering`).

use super::value_objects::{ChainHandle, ChainId, CoordinationState, EscrowSide, SwapId, TimelockPhase};
use thiserror::Error;

/// Hash type (32-byte SHA-256).
pub type Hash = [u8; 32];

/// Secret type (32-byte preimage).
pub type Secret = [u8; 32];

/// Errors raised by a chain adapter.
///
/// All of them are treated as transient by the coordinator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Transport-level failure (RPC, outcall, connection).
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete within the configured bound.
    #[error("Adapter call timed out after {after_ms}ms")]
    Timeout {
        /// Elapsed bound in milliseconds
        after_ms: u64,
    },

    /// The chain rejected the operation.
    #[error("Rejected by chain: {0}")]
    Rejected(String),

    /// The chain does not know the escrow handle.
    #[error("Unknown escrow: {0}")]
    UnknownEscrow(ChainHandle),
}

/// Escrow coordination errors.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Intent failed validation at initiation.
    #[error("Invalid intent: {reason}")]
    InvalidIntent {
        /// Why the intent was rejected
        reason: String,
    },

    /// Timelock schedule is not strictly increasing.
    #[error("Invalid schedule: {reason}")]
    InvalidSchedule {
        /// Which ordering constraint failed
        reason: String,
    },

    /// Revealed secret does not hash to the swap's hashlock.
    #[error("Hashlock mismatch")]
    HashlockMismatch,

    /// Chain-level failure.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Operation arrived after the relevant timelock window closed.
    #[error("Timelock expired on {side} escrow (phase {phase:?})")]
    TimelockExpired {
        /// Side whose window closed
        side: EscrowSide,
        /// Phase at the time of the attempt
        phase: TimelockPhase,
    },

    /// Swap already reached Completed, Refunded or Failed.
    #[error("Swap already terminal: {0:?}")]
    AlreadyTerminal(CoordinationState),

    /// Swap not found.
    #[error("Swap not found: {0}")]
    SwapNotFound(SwapId),

    /// The same intent was already registered.
    #[error("Duplicate swap: {0}")]
    DuplicateSwap(SwapId),

    /// Operation not valid in the current coordination state.
    #[error("Invalid transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: CoordinationState,
        /// Attempted state
        to: CoordinationState,
    },

    /// No adapter registered for a chain.
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(ChainId),

    /// Persistence failure.
    #[error("Storage error: {reason}")]
    Storage {
        /// Underlying I/O or encoding error
        reason: String,
    },

    /// Coordinator configuration rejected.
    #[error("Invalid config: {reason}")]
    InvalidConfig {
        /// Which setting is out of range
        reason: String,
    },
}

impl EscrowError {
    /// Shorthand for `InvalidIntent`.
    pub fn invalid_intent(reason: impl Into<String>) -> Self {
        Self::InvalidIntent {
            reason: reason.into(),
        }
    }

    /// Shorthand for `InvalidSchedule`.
    pub fn invalid_schedule(reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            reason: reason.into(),
        }
    }

    /// Whether the coordinator may retry the failed operation on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Adapter(_))
    }

    /// Short label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidIntent { .. } => "invalid_intent",
            Self::InvalidSchedule { .. } => "invalid_schedule",
            Self::HashlockMismatch => "hashlock_mismatch",
            Self::Adapter(_) => "adapter",
            Self::TimelockExpired { .. } => "timelock_expired",
            Self::AlreadyTerminal(_) => "already_terminal",
            Self::SwapNotFound(_) => "swap_not_found",
            Self::DuplicateSwap(_) => "duplicate_swap",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::UnsupportedChain(_) => "unsupported_chain",
            Self::Storage { .. } => "storage",
            Self::InvalidConfig { .. } => "invalid_config",
        }
    }
}

/// Result type for coordination operations.
pub type EscrowResult<T> = Result<T, EscrowError>;
