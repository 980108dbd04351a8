//! Statistics collection and reporting module
//!
//! This module provides functionality for tracking and reporting swarm
//! statistics, including:
//! - Hashrate calculations on workers
//! - Candidate accepted/rejected/indeterminate counters on the coordinator
//! - Hardware monitoring (CPU, memory, temperature)
//!
//! The main component is [`StatsReporter`] which collects data and can periodically
//! report statistics to logs.

/// Submodule containing the statistics reporter implementation
///
/// The reporter handles:
/// - Atomic collection of statistics
/// - Hardware monitoring
/// - Periodic reporting of stats
/// - Thread-safe channels for receiving hash counts
pub mod reporter;

// Re-export main components
pub use reporter::{CandidateOutcome, HardwareMonitor, HardwareStats, MiningStats, StatsReporter};
