//! hashswarm-rs - distributed proof-of-work search in Rust
//!
//! A coordinator hands a pool of untrusted workers disjoint shards of the
//! nonce space and arbitrates the candidates they report:
//! - Shared-secret handshake over a line-oriented TCP protocol
//! - Nonce sharding across any number of workers
//! - A cooperative mining engine that suspends on every candidate
//! - Candidate validation against an external HTTP service
//! - Hashrate and hardware monitoring

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including the hash, target rule and engine
pub mod miner;

/// Network communication components: protocol, handshake, server, client
pub mod network;

/// Coordinator state: registry, dispatcher, validator, progress, console
pub mod coordinator;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use miner::{Algorithm, Scheduler, Sha256Algo};
pub use network::{CoordinatorServer, HttpOracle, WorkerConfig, WorkerSession};
pub use stats::{HardwareStats, MiningStats, StatsReporter};
pub use types::{MiningState, Nonce, WorkerId};
pub use utils::{MinerError, init_logging};
