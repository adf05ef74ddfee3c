//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the outbound ports: a simulated chain, clocks and
//! swap stores.

mod clock;
mod simulated_chain;
mod swap_store;

pub use clock::{ManualClock, SystemClock};
pub use simulated_chain::{CallCounts, SimulatedChainAdapter};
pub use swap_store::{InMemorySwapStore, JsonFileSwapStore};
