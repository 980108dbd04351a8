// src/types.rs
use std::fmt;

/// Identifier handed to every accepted connection
///
/// Assigned monotonically starting at 1 and stable for the lifetime of the
/// connection. Ordering by id is the same as registration order.
pub type WorkerId = u64;

/// Nonce width used on the wire and in the hash input
///
/// Arithmetic on nonces always wraps.
pub type Nonce = i32;

/// Renders a nonce the way it travels in `FOUND` lines
///
/// Lowercase two's-complement hexadecimal without padding, so `-1` becomes
/// `ffffffff`.
pub fn nonce_hex(nonce: Nonce) -> String {
    format!("{:x}", nonce as u32)
}

/// Parses the hexadecimal nonce of a `FOUND` line back into a [`Nonce`]
pub fn parse_nonce_hex(text: &str) -> Option<Nonce> {
    if text.is_empty() || text.len() > 8 {
        return None;
    }
    u32::from_str_radix(text, 16).ok().map(|n| n as Nonce)
}

/// Progress of the connection handshake on the accepting side
///
/// Transitions only forward; a failure at any step drops the connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthState {
    /// `WHO_ARE_YOU_?` sent, waiting for `ITS_ME`
    AwaitingIdentity,
    /// `GIMME_PASSWORD` sent, waiting for `PASSWD <secret>`
    AwaitingPassword,
    /// `HELLO_YOU` sent, waiting for `READY`
    Authenticated,
    /// `OK` sent; the connection may carry task traffic
    Ready,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::AwaitingIdentity => write!(f, "awaiting-identity"),
            AuthState::AwaitingPassword => write!(f, "awaiting-password"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Ready => write!(f, "ready"),
        }
    }
}

/// Why a search generation ended for good
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// This worker's candidate was accepted
    Solved,
    /// Another worker solved the task, or the search was superseded
    Paused,
}

/// A (nonce, hash) pair meeting the difficulty target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Nonce that produced the hash
    pub nonce: Nonce,
    /// Lowercase hex SHA-256 of payload ‖ nonce
    pub hash: String,
}

impl Candidate {
    /// Hex form of the nonce as sent in `FOUND`
    pub fn nonce_hex(&self) -> String {
        nonce_hex(self.nonce)
    }
}

/// State of the mining engine on a worker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MiningState {
    /// No task received yet
    #[default]
    Idle,
    /// Hashing; `nonce` is the next nonce to be tested
    Searching {
        /// Next nonce of the shard
        nonce: Nonce,
    },
    /// A candidate was reported, waiting for `CONTINUE` or a stop
    Paused {
        /// The reported candidate
        candidate: Candidate,
    },
    /// Terminal for the generation
    Stopped(StopReason),
}

impl MiningState {
    /// Whether the engine is suspended on a pending candidate
    pub fn is_paused(&self) -> bool {
        matches!(self, MiningState::Paused { .. })
    }
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningState::Idle => write!(f, "IDLE"),
            MiningState::Searching { nonce } => write!(f, "TESTING {}", nonce_hex(*nonce)),
            MiningState::Paused { candidate } => write!(f, "PAUSED {}", candidate.nonce_hex()),
            MiningState::Stopped(StopReason::Solved) => write!(f, "SOLVED"),
            MiningState::Stopped(StopReason::Paused) => write!(f, "STOPPED"),
        }
    }
}
