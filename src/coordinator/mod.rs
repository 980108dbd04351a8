// src/coordinator/mod.rs
//! Coordinator side of the swarm
//!
//! Owns the shared state every connection task works against:
//! - [`Registry`] of authenticated workers
//! - [`TaskBoard`] holding the current task generation
//! - [`Dispatcher`], [`Validator`] and [`ProgressTracker`] operating on them
//!
//! The TCP accept loop lives in `network::server`; the operator console in
//! [`console`].

/// Task board: current generation and its arbitration state
pub mod board;

/// Operator console commands
pub mod console;

/// Task dispatcher
pub mod dispatcher;

/// Progress tracker
pub mod progress;

/// Worker registry
pub mod registry;

/// Candidate arbitration
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{ActiveTask, TaskBoard, TaskState};
pub use dispatcher::{Dispatcher, TaskSummary};
pub use progress::ProgressTracker;
pub use registry::{Registry, WorkerHandle};
pub use validator::{Arbitration, Validator};

use crate::miner::algorithm::Sha256Algo;
use crate::network::oracle::{OracleConfig, WorkOracle};
use crate::network::protocol::CoordinatorMessage;
use crate::stats::StatsReporter;
use crate::types::WorkerId;
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};

/// Coordinator settings (`[coordinator]` section)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address the worker listener binds to
    pub bind: String,
    /// Shared secret workers must present
    pub secret: String,
    /// Upper bound on the whole handshake, in milliseconds
    pub handshake_timeout_ms: u64,
    /// How long `PROGRESS` waits for replies, in milliseconds
    pub progress_timeout_ms: u64,
    /// Work generation / validation service
    pub oracle: OracleConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            bind: "0.0.0.0:1337".into(),
            secret: "password".into(),
            handshake_timeout_ms: 10_000,
            progress_timeout_ms: 2_000,
            oracle: OracleConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Handshake timeout as a [`Duration`]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Shared coordinator state
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<Registry>,
    board: Arc<Mutex<TaskBoard>>,
    dispatcher: Dispatcher,
    validator: Arc<Validator>,
    progress: ProgressTracker,
    stats: StatsReporter,
    shutdown: broadcast::Sender<()>,
}

impl Coordinator {
    /// Wires the coordinator components around `oracle`
    pub fn new(config: CoordinatorConfig, oracle: Arc<dyn WorkOracle>, stats: StatsReporter) -> Self {
        let registry = Arc::new(Registry::new());
        let board = Arc::new(Mutex::new(TaskBoard::new()));
        let dispatcher = Dispatcher::new(registry.clone(), board.clone(), oracle.clone());
        let validator = Validator::new(
            board.clone(),
            registry.clone(),
            oracle,
            Arc::new(Sha256Algo::new()),
            stats.clone(),
            config.oracle.validate_attempts,
        );
        let progress = ProgressTracker::new(
            registry.clone(),
            Duration::from_millis(config.progress_timeout_ms),
        );
        let (shutdown, _) = broadcast::channel(1);

        Coordinator {
            config,
            registry,
            board,
            dispatcher,
            validator: Arc::new(validator),
            progress,
            stats,
            shutdown,
        }
    }

    /// Coordinator settings
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Registered workers
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Candidate arbitration
    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    /// Candidate counters
    pub fn stats(&self) -> &StatsReporter {
        &self.stats
    }

    /// Starts a new task generation at `difficulty`
    pub async fn dispatch(&self, difficulty: u32) -> Result<TaskSummary, MinerError> {
        self.dispatcher.dispatch(difficulty).await
    }

    /// Collects one status line per registered worker
    pub async fn progress(&self) -> BTreeMap<WorkerId, String> {
        self.progress.collect().await
    }

    /// Snapshot of the current task, if one was dispatched
    pub async fn current_task(&self) -> Option<ActiveTask> {
        self.board.lock().await.current().cloned()
    }

    /// Receiver notified once on [`Coordinator::shutdown`]
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Says `bye` to every worker and stops the accept loop
    pub fn shutdown(&self) {
        let notified = self.registry.broadcast(&CoordinatorMessage::Bye);
        log::info!("Shutting down, {} worker(s) notified", notified);
        let _ = self.shutdown.send(());
    }
}
