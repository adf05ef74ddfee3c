//! # Application Module
//!
//! Application services orchestrating the domain and outbound ports.

pub mod coordinator;
pub mod recovery;
pub mod registry;

pub use coordinator::EscrowCoordinator;
pub use recovery::{RecoveryReport, RecoveryScheduler};
pub use registry::SwapRegistry;
