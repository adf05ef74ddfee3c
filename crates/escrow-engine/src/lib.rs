//! # Escrow Coordination Engine
//!
//! Creates, synchronizes and resolves a matched pair of HTLC escrows across
//! two independent ledgers (an ICP-style reverse-gas ledger and an EVM-style
//! chain), in the style of 1inch Fusion+ cross-chain swaps.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Guarantees
//!
//! | Defense | Description |
//! |---------|-------------|
//! | Same hashlock | Both escrows commit to one SHA-256 hash |
//! | Asymmetric timelocks | Destination cancellation opens before source cancellation |
//! | Late reveal rejected | A secret arriving after withdrawals close moves the swap to recovery |
//! | Bounded adapter calls | Every chain call has a timeout and is retried with backoff |
//! | Single writer per swap | Per-swap lock, never held across chain I/O |
//!
//! ## Swap lifecycle
//!
//! ```text
//! Pending -> SourceEscrowRequested -> SourceEscrowFunded
//!         -> DestinationEscrowRequested -> DestinationEscrowFunded
//!         -> BothFunded -> SecretRevealed -> Completed
//!
//! any non-terminal -> Recovering -> Refunded
//! Pending / SourceEscrowRequested -> Failed
//! ```
//!
//! ## Module Structure
//!
//! ```text
//! escrow-engine/
//! ├── domain/          # SwapIntent, EscrowRecord, SwapRecord, state machines, errors
//! ├── algorithms/      # HashlockManager, TimelockPolicy, backoff
//! ├── ports/           # EscrowCoordinatorApi, ChainAdapter, Clock, SwapStore
//! ├── adapters/        # Simulated chain, clocks, swap stores
//! └── application/     # SwapRegistry, EscrowCoordinator, RecoveryScheduler
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;

// Re-exports
pub use adapters::{
    CallCounts, InMemorySwapStore, JsonFileSwapStore, ManualClock, SimulatedChainAdapter,
    SystemClock,
};
pub use algorithms::{backoff_delay, HashlockManager, TimelockPolicy};
pub use application::{EscrowCoordinator, RecoveryReport, RecoveryScheduler, SwapRegistry};
pub use config::{CoordinatorConfig, RecoveryConfig, DEFAULT_FINALITY_BUFFER_SECS};
pub use domain::{
    AdapterError, AssetLeg, CallerRole, ChainEscrowStatus, ChainHandle, ChainId,
    CoordinationState, EscrowError, EscrowRecord, EscrowResult, EscrowSide, EscrowState, Hash,
    InFlightOp, PartyId, Secret, SecureSecret, SwapEvent, SwapEventKind, SwapId, SwapIntent,
    SwapIntentBuilder, SwapRecord, TimelockPhase, TimelockSchedule,
};
pub use ports::{ChainAdapter, Clock, EscrowCoordinatorApi, SwapStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
