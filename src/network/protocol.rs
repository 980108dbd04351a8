// src/network/protocol.rs
//! Wire messages of the swarm protocol
//!
//! One message per line, space separated tokens. The keyword (first token)
//! is matched case-insensitively; arguments are taken verbatim.

use crate::types::{Nonce, nonce_hex, parse_nonce_hex};
use crate::utils::error::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// Sent by the acceptor when the identity claim is wrong
pub const CONNECTION_REJECTED: &str = "Connection rejected";

/// Sent by the acceptor when the credential line lacks the `PASSWD ` prefix
pub const INVALID_PASSWORD_FORMAT: &str = "Invalid password format. Connection rejected";

/// Prefix of the credential line, including the separating space
pub const PASSWD_PREFIX: &str = "PASSWD ";

/// Messages travelling from the coordinator to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorMessage {
    /// `WHO_ARE_YOU_?` - handshake opening
    WhoAreYou,
    /// `GIMME_PASSWORD` - credential request
    GimmePassword,
    /// `HELLO_YOU` - credential accepted
    HelloYou,
    /// `YOU_DONT_FOOL_ME` - credential refused
    YouDontFoolMe,
    /// `OK` - handshake complete
    Ok,
    /// `PROGRESS` - status request
    Progress,
    /// `NONCE <start> <stride>` - shard assignment
    Nonce {
        /// First nonce of the shard
        start: Nonce,
        /// Number of workers sharing the task
        stride: Nonce,
    },
    /// `PAYLOAD <data>` - task payload
    Payload(String),
    /// `SOLVE <difficulty>` - start searching
    Solve {
        /// Number of leading zero hex digits
        difficulty: u32,
    },
    /// `SOLVED` - your candidate was accepted
    Solved,
    /// `CONTINUE` - your candidate was rejected, keep searching
    Continue,
    /// `PAUSE` - someone else solved the task
    Pause,
    /// `bye` - connection closing
    Bye,
}

impl fmt::Display for CoordinatorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorMessage::WhoAreYou => write!(f, "WHO_ARE_YOU_?"),
            CoordinatorMessage::GimmePassword => write!(f, "GIMME_PASSWORD"),
            CoordinatorMessage::HelloYou => write!(f, "HELLO_YOU"),
            CoordinatorMessage::YouDontFoolMe => write!(f, "YOU_DONT_FOOL_ME"),
            CoordinatorMessage::Ok => write!(f, "OK"),
            CoordinatorMessage::Progress => write!(f, "PROGRESS"),
            CoordinatorMessage::Nonce { start, stride } => write!(f, "NONCE {} {}", start, stride),
            CoordinatorMessage::Payload(data) => write!(f, "PAYLOAD {}", data),
            CoordinatorMessage::Solve { difficulty } => write!(f, "SOLVE {}", difficulty),
            CoordinatorMessage::Solved => write!(f, "SOLVED"),
            CoordinatorMessage::Continue => write!(f, "CONTINUE"),
            CoordinatorMessage::Pause => write!(f, "PAUSE"),
            CoordinatorMessage::Bye => write!(f, "bye"),
        }
    }
}

impl FromStr for CoordinatorMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        let message = match keyword.to_ascii_uppercase().as_str() {
            "WHO_ARE_YOU_?" => no_args("WHO_ARE_YOU_?", &args, CoordinatorMessage::WhoAreYou)?,
            "GIMME_PASSWORD" => no_args("GIMME_PASSWORD", &args, CoordinatorMessage::GimmePassword)?,
            "HELLO_YOU" => no_args("HELLO_YOU", &args, CoordinatorMessage::HelloYou)?,
            "YOU_DONT_FOOL_ME" => no_args("YOU_DONT_FOOL_ME", &args, CoordinatorMessage::YouDontFoolMe)?,
            "OK" => no_args("OK", &args, CoordinatorMessage::Ok)?,
            "PROGRESS" => no_args("PROGRESS", &args, CoordinatorMessage::Progress)?,
            "NONCE" => {
                arity("NONCE", &args, 2)?;
                CoordinatorMessage::Nonce {
                    start: number("NONCE", args[0])?,
                    stride: number("NONCE", args[1])?,
                }
            }
            "PAYLOAD" => {
                arity("PAYLOAD", &args, 1)?;
                CoordinatorMessage::Payload(args[0].to_string())
            }
            "SOLVE" => {
                arity("SOLVE", &args, 1)?;
                CoordinatorMessage::Solve {
                    difficulty: number("SOLVE", args[0])?,
                }
            }
            "SOLVED" => no_args("SOLVED", &args, CoordinatorMessage::Solved)?,
            "CONTINUE" => no_args("CONTINUE", &args, CoordinatorMessage::Continue)?,
            "PAUSE" => no_args("PAUSE", &args, CoordinatorMessage::Pause)?,
            "BYE" => CoordinatorMessage::Bye,
            _ => return Err(ProtocolError::UnknownCommand(keyword.to_string())),
        };
        Ok(message)
    }
}

/// Messages travelling from a worker to the coordinator
///
/// Any line that is not a known keyword is a free-form status reply to
/// `PROGRESS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// `ITS_ME` - identity claim
    ItsMe,
    /// `PASSWD <secret>` - credential
    Passwd(String),
    /// `READY` - ready for work
    Ready,
    /// `FOUND <hash> <hexNonce>` - candidate report
    Found {
        /// Lowercase hex hash of payload ‖ nonce
        hash: String,
        /// Nonce that produced the hash
        nonce: Nonce,
    },
    /// `bye` - connection closing
    Bye,
    /// Free-form status line
    Status(String),
}

impl fmt::Display for WorkerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerMessage::ItsMe => write!(f, "ITS_ME"),
            WorkerMessage::Passwd(secret) => write!(f, "{}{}", PASSWD_PREFIX, secret),
            WorkerMessage::Ready => write!(f, "READY"),
            WorkerMessage::Found { hash, nonce } => write!(f, "FOUND {} {}", hash, nonce_hex(*nonce)),
            WorkerMessage::Bye => write!(f, "bye"),
            WorkerMessage::Status(text) => write!(f, "{}", text),
        }
    }
}

impl FromStr for WorkerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = tokens.collect();

        let message = match keyword.to_ascii_uppercase().as_str() {
            "ITS_ME" => no_args("ITS_ME", &args, WorkerMessage::ItsMe)?,
            "READY" => no_args("READY", &args, WorkerMessage::Ready)?,
            "BYE" => WorkerMessage::Bye,
            // the secret may contain spaces, so take the raw remainder
            "PASSWD" => match line.get(PASSWD_PREFIX.len()..) {
                Some(secret) => WorkerMessage::Passwd(secret.to_string()),
                None => return Err(ProtocolError::Arity { command: "PASSWD", expected: 1, got: 0 }),
            },
            "FOUND" => {
                arity("FOUND", &args, 2)?;
                let nonce = parse_nonce_hex(args[1]).ok_or_else(|| ProtocolError::InvalidArgument {
                    command: "FOUND",
                    value: args[1].to_string(),
                })?;
                WorkerMessage::Found {
                    hash: args[0].to_ascii_lowercase(),
                    nonce,
                }
            }
            _ => WorkerMessage::Status(line.to_string()),
        };
        Ok(message)
    }
}

fn arity(command: &'static str, args: &[&str], expected: usize) -> Result<(), ProtocolError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::Arity {
            command,
            expected,
            got: args.len(),
        })
    }
}

fn no_args<T>(command: &'static str, args: &[&str], message: T) -> Result<T, ProtocolError> {
    arity(command, args, 0).map(|_| message)
}

fn number<T: FromStr>(command: &'static str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidArgument {
        command,
        value: value.to_string(),
    })
}
