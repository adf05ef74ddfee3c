//! # Escrow Node
//!
//! Process wiring for the escrow engine.
//!
//! ## Modular Structure
//!
//! - `config` - Layered configuration (defaults, JSON file, `ESCROW_*` env)
//! - `runtime` - Store, registry, adapters, coordinator and recovery scheduler
//!
//! The chain adapters are the in-memory simulated chains; a deployment
//! against real ledgers registers its own `ChainAdapter` implementations.

pub mod config;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use runtime::NodeRuntime;
