// src/miner/algorithm/mod.rs
//! Content hash implementations
//!
//! This module contains the hash used to search for proof-of-work
//! candidates and its common interface. Currently implements:
//! - SHA-256 over payload ‖ big-endian nonce

/// SHA-256 implementation
///
/// The content hash agreed with the validation service.
pub mod sha256;

pub use sha256::Sha256Algo;

use crate::types::Nonce;

/// Common interface for content hashes
///
/// Implementations only provide the raw digest; the framing of the hash
/// input and the hex rendering are shared.
pub trait Algorithm: Send + Sync {
    /// Compute the 32-byte digest of `input`
    fn digest(&self, input: &[u8]) -> [u8; 32];

    /// Compute the hex hash of payload ‖ nonce
    ///
    /// The nonce contributes its 4-byte big-endian two's-complement
    /// representation, appended after the raw payload bytes.
    fn hash(&self, payload: &[u8], nonce: Nonce) -> String {
        let mut data = Vec::with_capacity(payload.len() + 4);
        data.extend_from_slice(payload);
        data.extend_from_slice(&nonce.to_be_bytes());
        hex::encode(self.digest(&data))
    }

    /// Short name for logs
    fn name(&self) -> &'static str;
}
