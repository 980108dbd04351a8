// src/coordinator/validator.rs
//! Candidate arbitration
//!
//! Every `FOUND` goes through [`Validator::arbitrate`]. The task board lock
//! is held from admission until the outcome has been sent, including the
//! call to the validation service, so candidates are decided one at a time
//! in arrival order and at most one is ever accepted per generation.
//!
//! A candidate that is admitted but not accepted always gets `CONTINUE`,
//! since the reporting engine stays paused until it hears back. This covers
//! a hash that does not belong to the nonce and current payload.
//!
//! The wire protocol carries no generation, so a `FOUND` still in flight
//! when its worker is re-dispatched is judged against the new generation.
//! Its hash will not match the new payload, and the `CONTINUE` it earns may
//! resume a pause of the new engine before that engine's own candidate is
//! decided. The worker then keeps searching its shard, and the pending
//! candidate still receives its own verdict later, so nothing is lost.

use crate::coordinator::board::{Admission, TaskBoard};
use crate::coordinator::registry::{Registry, WorkerHandle};
use crate::miner::algorithm::Algorithm;
use crate::miner::target;
use crate::network::oracle::{Verdict, WorkOracle};
use crate::network::protocol::CoordinatorMessage;
use crate::stats::{CandidateOutcome, StatsReporter};
use crate::types::{Nonce, nonce_hex};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Pause between two validation attempts
pub const RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Why a candidate was not arbitrated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The reporter was never dispatched a task
    NoTask,
    /// The reporter's generation was superseded
    Stale,
    /// The generation already has an accepted candidate
    AlreadySolved,
}

/// Result of arbitrating one `FOUND`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arbitration {
    /// Accepted: `SOLVED` to the reporter, `PAUSE` to everyone else
    Accepted,
    /// Rejected: `CONTINUE` to the reporter
    Rejected(String),
    /// The service kept failing: `CONTINUE` to the reporter, generation stays open
    Indeterminate(String),
    /// Nothing was sent
    Ignored(IgnoreReason),
}

/// Decides candidates against the validation service
pub struct Validator {
    board: Arc<Mutex<TaskBoard>>,
    registry: Arc<Registry>,
    oracle: Arc<dyn WorkOracle>,
    algorithm: Arc<dyn Algorithm>,
    stats: StatsReporter,
    attempts: u32,
    retry_pause: Duration,
}

impl Validator {
    /// Creates a validator
    ///
    /// # Arguments
    /// * `attempts` - Validation service calls per candidate (at least 1)
    pub fn new(
        board: Arc<Mutex<TaskBoard>>,
        registry: Arc<Registry>,
        oracle: Arc<dyn WorkOracle>,
        algorithm: Arc<dyn Algorithm>,
        stats: StatsReporter,
        attempts: u32,
    ) -> Self {
        Validator {
            board,
            registry,
            oracle,
            algorithm,
            stats,
            attempts: attempts.max(1),
            retry_pause: RETRY_PAUSE,
        }
    }

    /// Overrides the pause between validation attempts
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    /// Arbitrates `FOUND <hash> <nonce>` reported by `reporter`
    pub async fn arbitrate(&self, reporter: &WorkerHandle, nonce: Nonce, hash: &str) -> Arbitration {
        let mut board = self.board.lock().await;

        let (generation, difficulty, matches_payload) = match board.admit(reporter.generation()) {
            Admission::Open(task) => (
                task.generation,
                task.difficulty,
                self.algorithm.hash(task.payload.as_bytes(), nonce) == hash,
            ),
            Admission::NoTask => return self.ignore(reporter, IgnoreReason::NoTask),
            Admission::Stale { reported, current } => {
                log::debug!(
                    "Worker {}: candidate for generation {} ignored (current {})",
                    reporter.id(),
                    reported,
                    current
                );
                return self.ignore(reporter, IgnoreReason::Stale);
            }
            Admission::AlreadySolved => return self.ignore(reporter, IgnoreReason::AlreadySolved),
        };

        if !matches_payload {
            log::warn!(
                "Worker {}: hash {} does not match nonce {} for the current payload",
                reporter.id(),
                hash,
                nonce_hex(nonce)
            );
            return self.reject(reporter, "hash does not match nonce and payload".into());
        }

        if !target::meets_target(hash, difficulty) {
            return self.reject(reporter, format!("hash misses difficulty {}", difficulty));
        }

        let nonce_text = nonce_hex(nonce);
        let mut attempt = 0;
        let verdict = loop {
            attempt += 1;
            match self.oracle.validate_work(difficulty, &nonce_text, hash).await {
                Ok(verdict) => break Ok(verdict),
                Err(e) if attempt < self.attempts => {
                    log::warn!(
                        "Validation attempt {}/{} for worker {} failed: {}",
                        attempt,
                        self.attempts,
                        reporter.id(),
                        e
                    );
                    tokio::time::sleep(self.retry_pause).await;
                }
                Err(e) => break Err(e),
            }
        };

        match verdict {
            Ok(Verdict::Accepted) => {
                board.mark_solved(reporter.id(), nonce, hash.to_string());
                reporter.send(&CoordinatorMessage::Solved);
                let paused = self
                    .registry
                    .broadcast_except(reporter.id(), &CoordinatorMessage::Pause);
                self.stats.record(CandidateOutcome::Accepted);
                log::info!(
                    "Generation {} solved by worker {}: nonce {} hash {} ({} other worker(s) paused)",
                    generation,
                    reporter.id(),
                    nonce_text,
                    hash,
                    paused
                );
                Arbitration::Accepted
            }
            Ok(Verdict::Rejected(reason)) => self.reject(reporter, reason),
            Err(e) => {
                reporter.send(&CoordinatorMessage::Continue);
                self.stats.record(CandidateOutcome::Indeterminate);
                log::error!(
                    "Candidate {} from worker {} is indeterminate after {} attempt(s): {}",
                    nonce_text,
                    reporter.id(),
                    self.attempts,
                    e
                );
                Arbitration::Indeterminate(e.to_string())
            }
        }
    }

    fn reject(&self, reporter: &WorkerHandle, reason: String) -> Arbitration {
        reporter.send(&CoordinatorMessage::Continue);
        self.stats.record(CandidateOutcome::Rejected);
        log::info!("Candidate from worker {} rejected: {}", reporter.id(), reason);
        Arbitration::Rejected(reason)
    }

    fn ignore(&self, reporter: &WorkerHandle, reason: IgnoreReason) -> Arbitration {
        log::debug!("Candidate from worker {} ignored: {:?}", reporter.id(), reason);
        Arbitration::Ignored(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::testing::{ScriptedOracle, drain, register};
    use crate::miner::algorithm::Sha256Algo;
    use crate::miner::target::Shard;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        registry: Arc<Registry>,
        board: Arc<Mutex<TaskBoard>>,
        stats: StatsReporter,
        validator: Arc<Validator>,
    }

    fn fixture(oracle: ScriptedOracle) -> Fixture {
        let registry = Arc::new(Registry::new());
        let board = Arc::new(Mutex::new(TaskBoard::new()));
        let stats = StatsReporter::new(Duration::from_secs(60));
        let validator = Validator::new(
            board.clone(),
            registry.clone(),
            Arc::new(oracle),
            Arc::new(Sha256Algo::new()),
            stats.clone(),
            3,
        )
        .with_retry_pause(Duration::from_millis(1));
        Fixture {
            registry,
            board,
            stats,
            validator: Arc::new(validator),
        }
    }

    impl Fixture {
        /// Opens a generation for every registered worker, as the dispatcher does.
        async fn open(&self, difficulty: u32, payload: &str) -> u64 {
            let workers = self.registry.snapshot();
            let generation = self
                .board
                .lock()
                .await
                .open(difficulty, payload.into(), workers.len())
                .generation;
            for worker in workers {
                worker.set_generation(generation);
            }
            generation
        }
    }

    /// First nonce of `shard` whose hash meets `difficulty`, with the hash.
    fn solution(payload: &str, difficulty: u32, shard: Shard) -> (Nonce, String) {
        let algo = Sha256Algo::new();
        shard
            .nonces()
            .map(|n| (n, algo.hash(payload.as_bytes(), n)))
            .find(|(_, h)| target::meets_target(h, difficulty))
            .unwrap()
    }

    fn worker_pair(f: &Fixture) -> [(Arc<WorkerHandle>, UnboundedReceiver<String>); 2] {
        [register(&f.registry), register(&f.registry)]
    }

    #[tokio::test]
    async fn test_accept_solves_and_pauses_others() {
        let f = fixture(ScriptedOracle::with_payload("abc"));
        let [(a, mut ra), (_b, mut rb)] = worker_pair(&f);
        f.open(1, "abc").await;

        let (nonce, hash) = solution("abc", 1, Shard::new(0, 2));
        assert_eq!(f.validator.arbitrate(&a, nonce, &hash).await, Arbitration::Accepted);
        assert_eq!(drain(&mut ra), vec!["SOLVED"]);
        assert_eq!(drain(&mut rb), vec!["PAUSE"]);
        assert_eq!(f.stats.get_stats().candidates_accepted, 1);

        // a later candidate for the same generation is never re-validated
        assert_eq!(
            f.validator.arbitrate(&a, nonce, &hash).await,
            Arbitration::Ignored(IgnoreReason::AlreadySolved)
        );
        assert!(drain(&mut ra).is_empty());
    }

    #[tokio::test]
    async fn test_reject_continues_reporter_only() {
        let oracle = ScriptedOracle::with_payload("abc").with_verdicts(vec![Some(Verdict::Rejected("no".into()))]);
        let f = fixture(oracle);
        let [(a, mut ra), (_b, mut rb)] = worker_pair(&f);
        f.open(0, "abc").await;

        let (nonce, hash) = solution("abc", 0, Shard::new(0, 2));
        assert_eq!(
            f.validator.arbitrate(&a, nonce, &hash).await,
            Arbitration::Rejected("no".into())
        );
        assert_eq!(drain(&mut ra), vec!["CONTINUE"]);
        assert!(drain(&mut rb).is_empty());
        assert_eq!(f.stats.get_stats().candidates_rejected, 1);
    }

    #[tokio::test]
    async fn test_prescreen_rejects_without_oracle() {
        let oracle = ScriptedOracle::with_payload("abc");
        let calls = oracle.validate_calls();
        let f = fixture(oracle);
        let [(a, mut ra), _] = worker_pair(&f);
        f.open(3, "abc").await;

        // a genuine hash that does not meet difficulty 3
        let algo = Sha256Algo::new();
        let nonce = (0..).find(|&n| !target::meets_target(&algo.hash(b"abc", n), 3)).unwrap();
        let hash = algo.hash(b"abc", nonce);

        assert!(matches!(f.validator.arbitrate(&a, nonce, &hash).await, Arbitration::Rejected(_)));
        assert_eq!(drain(&mut ra), vec!["CONTINUE"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_candidates_are_ignored() {
        let f = fixture(ScriptedOracle::with_payload("abc"));
        let [(a, mut ra), _] = worker_pair(&f);
        let (nonce, hash) = solution("abc", 0, Shard::new(0, 1));

        assert_eq!(
            f.validator.arbitrate(&a, nonce, &hash).await,
            Arbitration::Ignored(IgnoreReason::NoTask)
        );

        f.open(0, "abc").await;
        // the reporter's generation is superseded without it being re-dispatched
        f.board.lock().await.open(0, "abc".into(), 2);
        assert_eq!(
            f.validator.arbitrate(&a, nonce, &hash).await,
            Arbitration::Ignored(IgnoreReason::Stale)
        );
        assert!(drain(&mut ra).is_empty());
    }

    /// A forged hash must still release the paused reporter.
    #[tokio::test]
    async fn test_forged_hash_is_rejected_with_continue() {
        let oracle = ScriptedOracle::with_payload("abc");
        let calls = oracle.validate_calls();
        let f = fixture(oracle);
        let [(a, mut ra), (_b, mut rb)] = worker_pair(&f);
        let generation = f.open(0, "abc").await;

        let forged = "1".repeat(64);
        assert!(matches!(
            f.validator.arbitrate(&a, 0, &forged).await,
            Arbitration::Rejected(_)
        ));
        assert_eq!(drain(&mut ra), vec!["CONTINUE"]);
        assert!(drain(&mut rb).is_empty());
        assert_eq!(f.stats.get_stats().candidates_rejected, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "service never consulted");
        assert!(matches!(f.board.lock().await.admit(generation), Admission::Open(_)));
    }

    /// A candidate for the previous payload that lands after a re-dispatch is
    /// answered, and the new generation can still be solved.
    #[tokio::test]
    async fn test_candidate_from_previous_payload_after_redispatch() {
        let f = fixture(ScriptedOracle::with_payload("abc"));
        let [(a, mut ra), _] = worker_pair(&f);
        f.open(0, "abc").await;
        let (old_nonce, old_hash) = solution("abc", 0, Shard::new(0, 2));

        f.open(0, "xyz").await;
        assert!(matches!(
            f.validator.arbitrate(&a, old_nonce, &old_hash).await,
            Arbitration::Rejected(_)
        ));
        assert_eq!(drain(&mut ra), vec!["CONTINUE"]);

        let (nonce, hash) = solution("xyz", 0, Shard::new(0, 2));
        assert_eq!(f.validator.arbitrate(&a, nonce, &hash).await, Arbitration::Accepted);
        assert_eq!(drain(&mut ra), vec!["SOLVED"]);
    }

    #[tokio::test]
    async fn test_oracle_failures_are_retried() {
        let oracle = ScriptedOracle::with_payload("abc").with_verdicts(vec![None, None]);
        let calls = oracle.validate_calls();
        let f = fixture(oracle);
        let [(a, mut ra), _] = worker_pair(&f);
        f.open(0, "abc").await;

        let (nonce, hash) = solution("abc", 0, Shard::new(0, 2));
        assert_eq!(f.validator.arbitrate(&a, nonce, &hash).await, Arbitration::Accepted);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(drain(&mut ra), vec!["SOLVED"]);
    }

    #[tokio::test]
    async fn test_persistent_failure_is_indeterminate() {
        let oracle = ScriptedOracle::with_payload("abc").with_verdicts(vec![None, None, None]);
        let f = fixture(oracle);
        let [(a, mut ra), (_b, mut rb)] = worker_pair(&f);
        let generation = f.open(0, "abc").await;

        let (nonce, hash) = solution("abc", 0, Shard::new(0, 2));
        assert!(matches!(
            f.validator.arbitrate(&a, nonce, &hash).await,
            Arbitration::Indeterminate(_)
        ));
        assert_eq!(drain(&mut ra), vec!["CONTINUE"]);
        assert!(drain(&mut rb).is_empty());
        assert_eq!(f.stats.get_stats().candidates_indeterminate, 1);
        assert!(matches!(
            f.board.lock().await.admit(generation),
            Admission::Open(_)
        ), "generation stays open");
    }

    /// Two workers report at once: exactly one SOLVED, the other candidate is ignored.
    #[tokio::test]
    async fn test_concurrent_candidates_solve_once() {
        let oracle = ScriptedOracle::with_payload("abc").with_delay(Duration::from_millis(20));
        let calls = oracle.validate_calls();
        let f = fixture(oracle);
        let [(a, mut ra), (b, mut rb)] = worker_pair(&f);
        f.open(0, "abc").await;

        let (na, ha) = solution("abc", 0, Shard::new(0, 2));
        let (nb, hb) = solution("abc", 0, Shard::new(1, 2));

        let (va, vb) = (f.validator.clone(), f.validator.clone());
        let first = tokio::spawn(async move { va.arbitrate(&a, na, &ha).await });
        let second = tokio::spawn(async move { vb.arbitrate(&b, nb, &hb).await });
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| **o == Arbitration::Accepted).count(), 1);
        assert!(outcomes.contains(&Arbitration::Ignored(IgnoreReason::AlreadySolved)));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "loser never reaches the oracle");

        let lines: Vec<_> = drain(&mut ra).into_iter().chain(drain(&mut rb)).collect();
        assert_eq!(lines.iter().filter(|l| *l == "SOLVED").count(), 1);
        assert_eq!(lines.iter().filter(|l| *l == "PAUSE").count(), 1);
    }
}
