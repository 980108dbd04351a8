// src/miner/engine.rs
//! Mining engine
//!
//! Searches one shard of the nonce space for a hash meeting the difficulty
//! target. Runs on its own OS thread and fans every step out over a batch
//! of consecutive shard nonces on the hasher pool. When a candidate is
//! found the engine reports it and blocks on its signal channel until it is
//! told to continue or to stop; it never busy-waits and is never suspended
//! from outside.

use crate::miner::algorithm::Algorithm;
use crate::miner::target::{self, Shard};
use crate::types::{Candidate, MiningState, Nonce, StopReason};
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// Control signal delivered to a running engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Resume after the pending candidate
    Continue,
    /// End the generation for good
    Stop(StopReason),
}

/// Event emitted by an engine towards the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A candidate was found; the engine is now suspended
    Found {
        /// Generation the candidate belongs to
        generation: u64,
        /// The candidate itself
        candidate: Candidate,
    },
}

/// Parameters of one search generation
#[derive(Debug, Clone)]
pub struct SearchTask {
    /// Worker-local generation number
    pub generation: u64,
    /// Raw payload bytes, hashed before the nonce
    pub payload: Arc<[u8]>,
    /// Number of leading zero hex digits required
    pub difficulty: u32,
    /// Nonces this worker is responsible for
    pub shard: Shard,
}

/// Shared handles the engine reports through
#[derive(Clone)]
pub struct EngineLinks {
    /// Candidate reports
    pub events: UnboundedSender<EngineEvent>,
    /// Status visible to `PROGRESS`
    pub status: Arc<ArcSwap<MiningState>>,
    /// Generation currently owning `status`
    pub current_generation: Arc<AtomicU64>,
    /// Optional hash counter feed
    pub hash_sender: Option<Sender<u64>>,
}

/// One search generation, consumed by [`MiningEngine::run`]
pub struct MiningEngine {
    task: SearchTask,
    algorithm: Arc<dyn Algorithm>,
    pool: Arc<ThreadPool>,
    batch_size: u32,
    cancel: Arc<AtomicBool>,
    signals: Receiver<Signal>,
    links: EngineLinks,
}

impl MiningEngine {
    /// Creates an engine for `task`
    ///
    /// # Arguments
    /// * `algorithm` - Content hash
    /// * `pool` - Hasher thread pool shared by all generations
    /// * `batch_size` - Nonces hashed per cancellation check (at least 1)
    /// * `cancel` - Polled before every batch
    /// * `signals` - Continue/stop channel, read while suspended
    /// * `links` - Where candidates, status and hash counts go
    pub fn new(
        task: SearchTask,
        algorithm: Arc<dyn Algorithm>,
        pool: Arc<ThreadPool>,
        batch_size: u32,
        cancel: Arc<AtomicBool>,
        signals: Receiver<Signal>,
        links: EngineLinks,
    ) -> Self {
        MiningEngine {
            task,
            algorithm,
            pool,
            batch_size: batch_size.max(1),
            cancel,
            signals,
            links,
        }
    }

    /// Runs the search until it is stopped and returns the final state
    pub fn run(self) -> MiningState {
        let shard = self.task.shard;
        let mut nonce = shard.start;

        log::debug!(
            "generation {}: searching shard {}+{}k at difficulty {}",
            self.task.generation,
            shard.start,
            shard.stride,
            self.task.difficulty
        );

        loop {
            if self.cancel.load(Ordering::Acquire) {
                return self.finish(self.pending_stop_reason());
            }

            self.publish(MiningState::Searching { nonce });

            match self.search_batch(nonce) {
                None => nonce = shard.advance(nonce, self.batch_size),
                Some(candidate) => {
                    let found_at = candidate.nonce;
                    self.publish(MiningState::Paused {
                        candidate: candidate.clone(),
                    });

                    let event = EngineEvent::Found {
                        generation: self.task.generation,
                        candidate,
                    };
                    if self.links.events.send(event).is_err() {
                        // nobody left to report to
                        return self.finish(StopReason::Paused);
                    }

                    match self.wait_for_signal() {
                        Signal::Continue => nonce = shard.advance(found_at, 1),
                        Signal::Stop(reason) => return self.finish(reason),
                    }
                }
            }
        }
    }

    /// Hashes one batch and returns its first qualifying nonce in shard order
    fn search_batch(&self, nonce: Nonce) -> Option<Candidate> {
        let shard = self.task.shard;
        let payload = &self.task.payload;
        let difficulty = self.task.difficulty;
        let algorithm = &self.algorithm;

        let found = self.pool.install(|| {
            (0..self.batch_size)
                .into_par_iter()
                .map(|step| {
                    let n = shard.advance(nonce, step);
                    (step, n, algorithm.hash(payload, n))
                })
                .find_first(|(_, _, hash)| target::meets_target(hash, difficulty))
        });

        let hashed = found.as_ref().map_or(self.batch_size, |(step, _, _)| step + 1);
        if let Some(sender) = &self.links.hash_sender {
            let _ = sender.send(u64::from(hashed));
        }

        found.map(|(_, nonce, hash)| Candidate { nonce, hash })
    }

    fn wait_for_signal(&self) -> Signal {
        match self.signals.recv() {
            Ok(signal) => signal,
            // the scheduler is gone
            Err(_) => Signal::Stop(StopReason::Paused),
        }
    }

    fn pending_stop_reason(&self) -> StopReason {
        loop {
            match self.signals.try_recv() {
                Ok(Signal::Stop(reason)) => return reason,
                Ok(Signal::Continue) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return StopReason::Paused;
                }
            }
        }
    }

    fn finish(&self, reason: StopReason) -> MiningState {
        let state = MiningState::Stopped(reason);
        self.publish(state.clone());
        log::debug!("generation {} finished: {}", self.task.generation, state);
        state
    }

    /// Publishes `state` if this engine still owns the status
    ///
    /// `Stopped` is terminal for a generation: once the scheduler or the
    /// engine stored it, a batch still in flight cannot turn it back into
    /// `Searching` or `Paused`.
    fn publish(&self, state: MiningState) {
        if self.links.current_generation.load(Ordering::Acquire) != self.task.generation {
            return;
        }
        let terminal = matches!(state, MiningState::Stopped(_));
        if !terminal && self.cancel.load(Ordering::Acquire) {
            return;
        }
        let next = Arc::new(state);
        self.links.status.rcu(|current| {
            if !terminal && matches!(**current, MiningState::Stopped(_)) {
                current.clone()
            } else {
                next.clone()
            }
        });
    }
}
