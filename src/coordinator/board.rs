// src/coordinator/board.rs
//! Task board: the one active task and its arbitration state

use crate::types::{Nonce, WorkerId, nonce_hex};
use std::fmt;

/// Arbitration state of a task generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Candidates are still being accepted
    Open,
    /// A candidate was accepted; the generation is over
    Solved {
        /// Worker whose candidate was accepted
        worker: WorkerId,
        /// Accepted nonce
        nonce: Nonce,
        /// Accepted hash
        hash: String,
    },
}

/// The task dispatched most recently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    /// Generation number, starting at 1
    pub generation: u64,
    /// Number of leading zero hex digits required
    pub difficulty: u32,
    /// Payload shared by every shard
    pub payload: String,
    /// Number of workers the nonce space was split across
    pub shard_count: usize,
    /// Whether a candidate was accepted yet
    pub state: TaskState,
}

impl fmt::Display for ActiveTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation {} (difficulty {}, {} shard(s)): ",
            self.generation, self.difficulty, self.shard_count
        )?;
        match &self.state {
            TaskState::Open => write!(f, "searching"),
            TaskState::Solved { worker, nonce, hash } => write!(
                f,
                "solved by worker {} with nonce {} ({})",
                worker,
                nonce_hex(*nonce),
                hash
            ),
        }
    }
}

/// Whether a `FOUND` should be arbitrated
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<'a> {
    /// The candidate belongs to the open, current generation
    Open(&'a ActiveTask),
    /// No task was ever dispatched to the reporter
    NoTask,
    /// The reporter's generation has been superseded
    Stale {
        /// Generation the reporter was dispatched
        reported: u64,
        /// Current generation
        current: u64,
    },
    /// The generation already has an accepted candidate
    AlreadySolved,
}

/// Holder of the current task generation
#[derive(Debug, Default)]
pub struct TaskBoard {
    last_generation: u64,
    active: Option<ActiveTask>,
}

impl TaskBoard {
    /// Creates an empty board
    pub fn new() -> Self {
        TaskBoard::default()
    }

    /// Opens a new generation, superseding the previous one
    pub fn open(&mut self, difficulty: u32, payload: String, shard_count: usize) -> &ActiveTask {
        self.last_generation += 1;
        self.active.insert(ActiveTask {
            generation: self.last_generation,
            difficulty,
            payload,
            shard_count,
            state: TaskState::Open,
        })
    }

    /// The current task, if any was dispatched
    pub fn current(&self) -> Option<&ActiveTask> {
        self.active.as_ref()
    }

    /// Decides whether a candidate attributed to `generation` is arbitrated
    pub fn admit(&self, generation: u64) -> Admission<'_> {
        match &self.active {
            None => Admission::NoTask,
            Some(_) if generation == 0 => Admission::NoTask,
            Some(task) if task.generation != generation => Admission::Stale {
                reported: generation,
                current: task.generation,
            },
            Some(task) if task.state != TaskState::Open => Admission::AlreadySolved,
            Some(task) => Admission::Open(task),
        }
    }

    /// Closes the current generation with an accepted candidate
    ///
    /// Returns `false` if there was no open generation to close.
    pub fn mark_solved(&mut self, worker: WorkerId, nonce: Nonce, hash: String) -> bool {
        match &mut self.active {
            Some(task) if task.state == TaskState::Open => {
                task.state = TaskState::Solved { worker, nonce, hash };
                true
            }
            _ => false,
        }
    }
}
