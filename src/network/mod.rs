// src/network/mod.rs
//! Network communication components
//!
//! This module handles every byte that crosses a process boundary:
//! - The newline-framed channel and the wire messages of the swarm protocol
//! - The connection handshake, both sides
//! - `CoordinatorServer`: the coordinator's TCP accept loop
//! - `WorkerSession`: a worker's connection to the coordinator
//! - `HttpOracle`: the work generation / validation service client

/// Newline-framed text channel over any async stream
pub mod line;

/// Typed wire messages for both directions
pub mod protocol;

/// Connection handshake
///
/// Acceptor and initiator sides of the `WHO_ARE_YOU_?` ... `OK` exchange.
pub mod handshake;

/// Work generation / validation service client
///
/// Fetches task payloads and submits candidates over HTTP with JSON bodies.
pub mod oracle;

/// Coordinator TCP server
pub mod server;

/// Worker connection to the coordinator
///
/// Drives the local scheduler from coordinator commands and reports
/// candidates.
pub mod client;

// Re-export main components for cleaner imports
pub use client::{WorkerConfig, WorkerSession};
pub use oracle::{HttpOracle, OracleConfig, Verdict, WorkOracle};
pub use protocol::{CoordinatorMessage, WorkerMessage};
pub use server::CoordinatorServer;
