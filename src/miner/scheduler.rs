// src/miner/scheduler.rs
//! Worker-side search scheduler
//!
//! Collects the shard and payload sent by the coordinator, starts one
//! [`MiningEngine`] per `SOLVE` and routes `CONTINUE` / `SOLVED` / `PAUSE`
//! to the engine of the current generation. Only the most recent `SOLVE`
//! is ever searched: starting a new generation stops the previous one.

use crate::miner::algorithm::Algorithm;
use crate::miner::engine::{EngineEvent, EngineLinks, MiningEngine, SearchTask, Signal};
use crate::miner::target::Shard;
use crate::types::{MiningState, StopReason};
use crate::utils::error::{MinerError, ProtocolError};
use arc_swap::ArcSwap;
use crossbeam_channel::Sender;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Handle on the engine thread of the current generation
struct ActiveSearch {
    cancel: Arc<AtomicBool>,
    signals: Sender<Signal>,
}

impl ActiveSearch {
    fn stop(&mut self, reason: StopReason) {
        self.cancel.store(true, Ordering::Release);
        let _ = self.signals.send(Signal::Stop(reason));
    }
}

/// Coordinates search generations on one worker
pub struct Scheduler {
    /// Content hash shared by every generation
    algorithm: Arc<dyn Algorithm>,
    /// Hasher threads shared by every generation
    pool: Arc<ThreadPool>,
    /// Number of nonces each engine hashes per cancellation check
    batch_size: u32,
    /// Last `NONCE` assignment
    shard: Option<Shard>,
    /// Last `PAYLOAD`
    payload: Option<Arc<[u8]>>,
    /// Generation counter, bumped on every `SOLVE`
    generation: u64,
    /// Engine of the current generation, if any
    active: Option<ActiveSearch>,
    /// Channels handed to every engine
    links: EngineLinks,
}

impl Scheduler {
    /// Creates a new Scheduler instance
    ///
    /// # Arguments
    /// * `algorithm` - The content hash to search with
    /// * `threads` - Hasher threads (0 = number of CPUs)
    /// * `batch_size` - Number of nonces hashed per cancellation check
    /// * `events` - Where candidates are reported
    pub fn new(
        algorithm: Arc<dyn Algorithm>,
        threads: usize,
        batch_size: u32,
        events: UnboundedSender<EngineEvent>,
    ) -> Result<Self, MinerError> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("hasher-{}", i))
            .build()?;

        Ok(Scheduler {
            algorithm,
            pool: Arc::new(pool),
            batch_size,
            shard: None,
            payload: None,
            generation: 0,
            active: None,
            links: EngineLinks {
                events,
                status: Arc::new(ArcSwap::from_pointee(MiningState::Idle)),
                current_generation: Arc::new(AtomicU64::new(0)),
                hash_sender: None,
            },
        })
    }

    /// Streams per-batch hash counts to `sender` (see `StatsReporter::hash_sender`)
    pub fn with_hash_sender(mut self, sender: Sender<u64>) -> Self {
        self.links.hash_sender = Some(sender);
        self
    }

    /// Records the shard of the next generation (`NONCE <start> <stride>`)
    pub fn assign_shard(&mut self, shard: Shard) {
        self.shard = Some(shard);
    }

    /// Records the payload of the next generation (`PAYLOAD <data>`)
    pub fn set_payload(&mut self, payload: &str) {
        self.payload = Some(Arc::from(payload.as_bytes()));
    }

    /// Starts a new generation at `difficulty` (`SOLVE <difficulty>`)
    ///
    /// Any generation still running is stopped first.
    ///
    /// # Errors
    /// `ProtocolError::OutOfSequence` if no shard or payload was received,
    /// or an I/O error if the engine thread cannot be spawned.
    pub fn solve(&mut self, difficulty: u32) -> Result<u64, MinerError> {
        let (shard, payload) = match (self.shard, &self.payload) {
            (Some(shard), Some(payload)) => (shard, payload.clone()),
            _ => {
                return Err(ProtocolError::OutOfSequence(
                    "SOLVE before NONCE and PAYLOAD".to_string(),
                )
                .into());
            }
        };
        if shard.stride <= 0 || shard.start < 0 {
            return Err(ProtocolError::InvalidArgument {
                command: "NONCE",
                value: format!("{} {}", shard.start, shard.stride),
            }
            .into());
        }

        if let Some(mut previous) = self.active.take() {
            previous.stop(StopReason::Paused);
        }

        self.generation += 1;
        let generation = self.generation;
        self.links.current_generation.store(generation, Ordering::Release);
        self.links
            .status
            .store(Arc::new(MiningState::Searching { nonce: shard.start }));

        let (signal_tx, signal_rx) = crossbeam_channel::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let engine = MiningEngine::new(
            SearchTask {
                generation,
                payload,
                difficulty,
                shard,
            },
            self.algorithm.clone(),
            self.pool.clone(),
            self.batch_size,
            cancel.clone(),
            signal_rx,
            self.links.clone(),
        );

        // detached: a stopped engine exits after its current batch
        std::thread::Builder::new()
            .name(format!("search-{}", generation))
            .spawn(move || engine.run())?;

        log::info!(
            "Started search generation {} (difficulty {}, shard {}+{}k)",
            generation,
            difficulty,
            shard.start,
            shard.stride
        );

        self.active = Some(ActiveSearch {
            cancel,
            signals: signal_tx,
        });
        Ok(generation)
    }

    /// Lets a suspended engine continue after its candidate (`CONTINUE`)
    ///
    /// Returns `false` when there is nothing suspended to resume.
    pub fn resume(&self) -> bool {
        match &self.active {
            Some(active) if self.status().is_paused() => {
                active.signals.send(Signal::Continue).is_ok()
            }
            _ => false,
        }
    }

    /// Ends the current generation for good (`SOLVED` / `PAUSE`)
    ///
    /// Returns `false` when no generation was running.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        match self.active.take() {
            Some(mut active) => {
                active.stop(reason);
                self.links.status.store(Arc::new(MiningState::Stopped(reason)));
                log::info!("Search generation {} stopped: {:?}", self.generation, reason);
                true
            }
            None => false,
        }
    }

    /// Current mining state
    pub fn status(&self) -> MiningState {
        (**self.links.status.load()).clone()
    }

    /// Shared view of the mining state, for observers outside the scheduler
    pub fn status_handle(&self) -> Arc<ArcSwap<MiningState>> {
        self.links.status.clone()
    }

    /// Number of `SOLVE` commands acted on so far
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stop(StopReason::Paused);
        }
    }
}
