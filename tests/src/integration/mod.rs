//! # Integration Tests
//!
//! Coordinator, registry, recovery scheduler and swap store driven together
//! against two simulated chains (ICP source, EVM destination) and a manual
//! clock.

pub mod concurrency;
pub mod persistence;
pub mod recovery;
pub mod swap_flows;
