// src/coordinator/console.rs
//! Operator console
//!
//! Reads one command per line (case-insensitive) and prints the answer to
//! stdout:
//!
//! | Command | Effect |
//! |---|---|
//! | `LIST` | registered workers |
//! | `PROGRESS` | one status line per worker |
//! | `START <d>` | dispatch a task at difficulty `d` |
//! | `STATUS` | current task generation |
//! | `STATS` | candidate counters |
//! | `SHUTDOWN` | say `bye` to every worker and exit |
//! | `HELP` | this list |

use crate::coordinator::Coordinator;
use crate::utils::error::MinerError;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

const HELP: &str = "Commands:
  LIST           list connected workers
  PROGRESS       ask every worker for its status
  START <d>      start a task at difficulty d
  STATUS         show the current task
  STATS          show candidate counters
  SHUTDOWN       disconnect every worker and exit
  HELP           show this help";

/// A parsed console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `LIST`
    List,
    /// `PROGRESS`
    Progress,
    /// `START <difficulty>`
    Start(u32),
    /// `STATUS`
    Status,
    /// `STATS`
    Stats,
    /// `SHUTDOWN`
    Shutdown,
    /// `HELP`
    Help,
}

impl FromStr for OperatorCommand {
    type Err = MinerError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        let args: Vec<&str> = tokens.collect();

        let command = match keyword.to_ascii_uppercase().as_str() {
            "LIST" => OperatorCommand::List,
            "PROGRESS" => OperatorCommand::Progress,
            "STATUS" => OperatorCommand::Status,
            "STATS" => OperatorCommand::Stats,
            "SHUTDOWN" => OperatorCommand::Shutdown,
            "HELP" => OperatorCommand::Help,
            "START" => match args.as_slice() {
                [difficulty] => OperatorCommand::Start(difficulty.parse().map_err(|_| {
                    MinerError::Input(format!("Invalid difficulty: {}", difficulty))
                })?),
                _ => return Err(MinerError::Input("Usage: START <difficulty>".into())),
            },
            _ => return Err(MinerError::Input(format!("Unknown command: {}", line.trim()))),
        };
        Ok(command)
    }
}

/// Runs `command` and returns the text to show the operator
pub async fn execute(coordinator: &Coordinator, command: OperatorCommand) -> String {
    match command {
        OperatorCommand::List => {
            let workers = coordinator.registry().snapshot();
            if workers.is_empty() {
                return "No worker connected".into();
            }
            let mut out = String::new();
            for (index, worker) in workers.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "#{} worker {} at {} (generation {})",
                    index,
                    worker.id(),
                    worker.addr(),
                    worker.generation()
                );
            }
            out.trim_end().to_string()
        }
        OperatorCommand::Progress => {
            let statuses = coordinator.progress().await;
            if statuses.is_empty() {
                return "No worker connected".into();
            }
            statuses
                .iter()
                .map(|(id, status)| format!("worker {}: {}", id, status))
                .collect::<Vec<_>>()
                .join("\n")
        }
        OperatorCommand::Start(difficulty) => match coordinator.dispatch(difficulty).await {
            Ok(summary) => summary.to_string(),
            Err(e) => {
                log::error!("Dispatch at difficulty {} failed: {}", difficulty, e);
                format!("Dispatch failed: {}", e)
            }
        },
        OperatorCommand::Status => match coordinator.current_task().await {
            Some(task) => format!("{} worker(s) connected, {}", coordinator.registry().len(), task),
            None => format!(
                "{} worker(s) connected, no task dispatched",
                coordinator.registry().len()
            ),
        },
        OperatorCommand::Stats => coordinator.stats().get_stats().to_string(),
        OperatorCommand::Shutdown => {
            coordinator.shutdown();
            "Bye".into()
        }
        OperatorCommand::Help => HELP.into(),
    }
}

/// Reads commands from `input` until `SHUTDOWN`
///
/// If the input closes first, waits for a shutdown triggered elsewhere.
pub async fn run<R: AsyncRead + Unpin>(coordinator: Arc<Coordinator>, input: R) -> Result<(), MinerError> {
    let mut shutdown = coordinator.subscribe_shutdown();
    let mut lines = BufReader::new(input).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.recv() => return Ok(()),
        };
        let Some(line) = line else {
            log::info!("Console input closed; waiting for shutdown");
            let _ = shutdown.recv().await;
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<OperatorCommand>() {
            Ok(command) => {
                println!("{}", execute(&coordinator, command).await);
                if command == OperatorCommand::Shutdown {
                    return Ok(());
                }
            }
            Err(MinerError::Input(message)) => println!("{}", message),
            Err(e) => println!("{}", e),
        }
    }
}
