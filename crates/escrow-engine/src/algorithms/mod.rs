//! # Algorithms Module
//!
//! Pure algorithms used by the coordinator: hashlocks, timelock phases and
//! retry backoff.

pub mod backoff;
pub mod hashlock;
pub mod timelock;

pub use backoff::backoff_delay;
pub use hashlock::HashlockManager;
pub use timelock::TimelockPolicy;
