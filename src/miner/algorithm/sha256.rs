// src/miner/algorithm/sha256.rs
//! SHA-256 content hash
//!
//! Stateless; a single instance is shared by every hasher thread.

use crate::miner::algorithm::Algorithm;
use sha2::{Digest, Sha256};

/// SHA-256 algorithm implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Algo;

impl Sha256Algo {
    /// Creates a new SHA-256 hasher
    pub fn new() -> Self {
        Self
    }
}

impl Algorithm for Sha256Algo {
    fn digest(&self, input: &[u8]) -> [u8; 32] {
        Sha256::digest(input).into()
    }

    fn name(&self) -> &'static str {
        "sha256"
    }
}
