// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Main error type for the swarm application
///
/// This enum represents all possible error conditions that can occur
/// while coordinating or running workers, including handshake, protocol,
/// transport, oracle and configuration errors.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Connection-level authentication failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// Work generation or validation service failure
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Transport (socket) and other I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid operator input or parameter errors
    #[error("Invalid input: {0}")]
    Input(String),

    /// Task or thread execution errors
    #[error("Task execution error: {0}")]
    Task(String),

    /// A task was requested while no worker is registered
    #[error("No worker connected")]
    NoWorkers,
}

/// Failures of the connection handshake
///
/// Always fatal to the connection it occurred on and to nothing else.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The peer sent something other than the expected handshake line
    #[error("unexpected response: {0:?}")]
    UnexpectedResponse(String),

    /// The shared secret did not match
    #[error("bad credential")]
    BadCredential,

    /// The credential line was not of the form `PASSWD <secret>`
    #[error("malformed message: {0:?}")]
    MalformedMessage(String),

    /// The stream ended before the handshake completed
    #[error("connection closed during handshake")]
    ConnectionClosed,

    /// The handshake did not complete in time
    #[error("handshake timed out")]
    Timeout,

    /// Transport failure during the handshake
    #[error("I/O error during handshake: {0}")]
    Io(#[from] io::Error),
}

/// A line that does not have the shape its keyword requires
///
/// Logged and ignored; the connection carries on.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Empty line
    #[error("empty message")]
    Empty,

    /// Keyword not known in this direction
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of tokens for the keyword
    #[error("{command} expects {expected} argument(s), got {got}")]
    Arity {
        /// Keyword of the offending line
        command: &'static str,
        /// Number of arguments the keyword takes
        expected: usize,
        /// Number of arguments received
        got: usize,
    },

    /// An argument could not be parsed
    #[error("invalid argument for {command}: {value:?}")]
    InvalidArgument {
        /// Keyword of the offending line
        command: &'static str,
        /// Raw argument text
        value: String,
    },

    /// A message arrived in a state where it cannot be honoured
    #[error("out of sequence: {0}")]
    OutOfSequence(String),
}

/// Failures talking to the work generation / validation service
#[derive(Error, Debug)]
pub enum OracleError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("service returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for the operator
        body: String,
    },

    /// The response body lacked an expected field or was not JSON
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Endpoint URL could not be built
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Converts async task join errors into MinerError
///
/// Used when background tasks (connection handlers, validation) fail
/// unexpectedly.
impl From<tokio::task::JoinError> for MinerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MinerError::Task(format!("Async task failed: {}", e))
    }
}

/// Converts rayon thread pool construction errors into MinerError
impl From<rayon::ThreadPoolBuildError> for MinerError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        MinerError::Task(format!("Hasher pool failed to start: {}", e))
    }
}
