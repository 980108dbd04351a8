// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! This module contains shared utilities used by both the coordinator and
//! the worker, including error handling and logging infrastructure.

/// Error types and handling utilities
///
/// Contains the [`MinerError`] enum plus the narrower handshake, protocol
/// and oracle errors, along with conversion implementations.
pub mod error;

/// Logging configuration and utilities
///
/// Provides logging initialization and configuration for the application,
/// including formatting and output destinations.
pub mod logging;

// Re-export for easier access
pub use error::{AuthError, MinerError, OracleError, ProtocolError};
pub use logging::{init_bench_logging, init_logging};
