// src/coordinator/dispatcher.rs
//! Task dispatcher
//!
//! Turns `START <difficulty>` into one new task generation: fetches a
//! payload from the work service and hands every registered worker its
//! shard of the nonce space.

use crate::coordinator::board::TaskBoard;
use crate::coordinator::registry::Registry;
use crate::miner::target::Shard;
use crate::network::oracle::WorkOracle;
use crate::network::protocol::CoordinatorMessage;
use crate::utils::error::{MinerError, OracleError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    /// Generation opened by the dispatch
    pub generation: u64,
    /// Requested difficulty
    pub difficulty: u32,
    /// Payload from the work service
    pub payload: String,
    /// Number of workers sharing the nonce space
    pub shard_count: usize,
}

impl fmt::Display for TaskSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Task {} dispatched to {} worker(s) at difficulty {} (payload {})",
            self.generation, self.shard_count, self.difficulty, self.payload
        )
    }
}

/// Splits tasks across the registry
pub struct Dispatcher {
    registry: Arc<Registry>,
    board: Arc<Mutex<TaskBoard>>,
    oracle: Arc<dyn WorkOracle>,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared registry and task board
    pub fn new(registry: Arc<Registry>, board: Arc<Mutex<TaskBoard>>, oracle: Arc<dyn WorkOracle>) -> Self {
        Dispatcher { registry, board, oracle }
    }

    /// Starts a new task at `difficulty`
    ///
    /// Worker `i` of the registry snapshot receives, in order,
    /// `NONCE <i> <n>`, `PAYLOAD <payload>` and `SOLVE <difficulty>`.
    ///
    /// # Errors
    /// - `MinerError::NoWorkers` if nobody is registered (the work service
    ///   is not called)
    /// - `MinerError::Oracle` if the payload cannot be obtained; nothing is
    ///   sent to any worker
    pub async fn dispatch(&self, difficulty: u32) -> Result<TaskSummary, MinerError> {
        if self.registry.is_empty() {
            return Err(MinerError::NoWorkers);
        }

        let payload = self.oracle.generate_work(difficulty).await?;
        if payload.is_empty() || payload.chars().any(char::is_whitespace) {
            return Err(OracleError::Malformed(format!(
                "Payload is not a single token: {:?}",
                payload
            ))
            .into());
        }

        let workers = self.registry.snapshot();
        if workers.is_empty() {
            return Err(MinerError::NoWorkers);
        }
        let shard_count = workers.len();

        // held while stamping so no candidate is arbitrated against a half-dispatched task
        let mut board = self.board.lock().await;
        let generation = board.open(difficulty, payload.clone(), shard_count).generation;

        for (index, worker) in workers.iter().enumerate() {
            let shard = Shard::new(index, shard_count);
            worker.set_generation(generation);

            let delivered = worker.send(&CoordinatorMessage::Nonce {
                start: shard.start,
                stride: shard.stride,
            }) && worker.send(&CoordinatorMessage::Payload(payload.clone()))
                && worker.send(&CoordinatorMessage::Solve { difficulty });

            if !delivered {
                log::warn!("Worker {} left before receiving shard {}", worker.id(), index);
            }
        }
        drop(board);

        let summary = TaskSummary {
            generation,
            difficulty,
            payload,
            shard_count,
        };
        log::info!("{}", summary);
        Ok(summary)
    }
}
