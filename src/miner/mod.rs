// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains everything that runs on a worker to search for a
//! proof-of-work candidate:
//! - The content hash (SHA-256 over payload ‖ nonce)
//! - The difficulty target rule and nonce sharding
//! - The mining engine searching one shard
//! - The scheduler owning the current search generation

/// Content hash implementations
///
/// Contains the [`Algorithm`] trait and its SHA-256 implementation.
pub mod algorithm;

/// Search generation scheduler
///
/// Receives shard, payload and difficulty from the connection and starts,
/// resumes or stops the engine accordingly.
pub mod scheduler;

/// Mining engine
///
/// The cooperative search loop itself, one thread per generation.
pub mod engine;

/// Difficulty target rule and shard arithmetic
pub mod target;

// Re-export main components for cleaner imports
pub use self::algorithm::{Algorithm, Sha256Algo};
pub use self::engine::{EngineEvent, MiningEngine, SearchTask, Signal};
pub use self::scheduler::Scheduler;
pub use self::target::{Shard, meets_target};
