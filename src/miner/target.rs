// src/miner/target.rs
//! Difficulty target and nonce sharding
//!
//! A hash meets difficulty `d` when its first `d` hex characters are `'0'`
//! AND the character right after them is not `'0'`. This is not "at least
//! `d` leading zeros": a hash with more zeros than asked for is rejected.
//! The validation service checks the same rule, so it must not be relaxed.

use crate::types::Nonce;

/// The `d`-character string of `'0'` a qualifying hash starts with
pub fn target_prefix(difficulty: u32) -> String {
    "0".repeat(difficulty as usize)
}

/// Tests a hex hash against the difficulty rule
///
/// A hash not longer than `difficulty` characters never qualifies.
pub fn meets_target(hash: &str, difficulty: u32) -> bool {
    let d = difficulty as usize;
    let bytes = hash.as_bytes();
    bytes.len() > d && bytes[..d].iter().all(|&b| b == b'0') && bytes[d] != b'0'
}

/// The slice of the nonce space searched by one worker
///
/// Worker `index` of `count` tests `index, index + count, index + 2·count, …`
/// with wrapping arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    /// First nonce (the worker's registry position)
    pub start: Nonce,
    /// Distance between consecutive nonces (the number of workers)
    pub stride: Nonce,
}

impl Shard {
    /// Shard for registry position `index` out of `count` workers
    pub fn new(index: usize, count: usize) -> Self {
        Shard {
            start: index as Nonce,
            stride: count as Nonce,
        }
    }

    /// Nonce `steps` positions after `nonce` in this shard
    pub fn advance(&self, nonce: Nonce, steps: u32) -> Nonce {
        nonce.wrapping_add(self.stride.wrapping_mul(steps as Nonce))
    }

    /// Whether `nonce` is tested by this shard (before any wraparound)
    pub fn contains(&self, nonce: i64) -> bool {
        let stride = i64::from(self.stride);
        stride > 0 && nonce >= i64::from(self.start) && (nonce - i64::from(self.start)) % stride == 0
    }

    /// The shard's nonces in search order
    pub fn nonces(&self) -> impl Iterator<Item = Nonce> + use<> {
        let stride = self.stride;
        std::iter::successors(Some(self.start), move |n| Some(n.wrapping_add(stride)))
    }
}
