// src/network/client.rs
//! Worker connection to the coordinator
//!
//! Runs the initiator handshake and then the command loop: coordinator
//! lines drive the [`Scheduler`], and candidates found by the engine are
//! reported as `FOUND` lines. There is no automatic reconnect; a transport
//! failure ends the session with an error.

use crate::miner::algorithm::Sha256Algo;
use crate::miner::engine::EngineEvent;
use crate::miner::scheduler::Scheduler;
use crate::miner::target::Shard;
use crate::network::handshake;
use crate::network::line::LineChannel;
use crate::network::protocol::{CoordinatorMessage, WorkerMessage};
use crate::stats::StatsReporter;
use crate::types::{MiningState, StopReason};
use crate::utils::error::{MinerError, ProtocolError};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Worker settings (`[worker]` section)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Coordinator address (`host:port`)
    pub coordinator: String,
    /// Shared secret presented during the handshake
    pub secret: String,
    /// Hasher threads (0 = number of CPUs)
    pub threads: usize,
    /// Nonces hashed between two cancellation checks
    pub batch_size: u32,
    /// Interval of the hashrate log line, in seconds
    pub report_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            coordinator: "127.0.0.1:1337".into(),
            secret: "password".into(),
            threads: 0,
            batch_size: 256,
            report_interval_secs: 60,
        }
    }
}

/// What the command loop should do after a line
enum Flow {
    Continue,
    Exit,
}

/// An authenticated worker session
pub struct WorkerSession<R, W> {
    channel: LineChannel<R, W>,
    scheduler: Scheduler,
    events: UnboundedReceiver<EngineEvent>,
    stats: StatsReporter,
}

/// Connects to the configured coordinator and authenticates
///
/// # Errors
/// Returns `MinerError::Io` if the coordinator is unreachable, or
/// `MinerError::Auth` if the handshake fails
pub async fn connect(
    config: &WorkerConfig,
    stats: StatsReporter,
) -> Result<WorkerSession<OwnedReadHalf, OwnedWriteHalf>, MinerError> {
    let stream = TcpStream::connect(&config.coordinator).await?;
    let _ = stream.set_nodelay(true);
    log::info!("Connected to coordinator at {}", config.coordinator);
    WorkerSession::establish(LineChannel::from_tcp(stream), config, stats).await
}

impl<R, W> WorkerSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Authenticates over `channel` and prepares the scheduler
    pub async fn establish(
        mut channel: LineChannel<R, W>,
        config: &WorkerConfig,
        stats: StatsReporter,
    ) -> Result<Self, MinerError> {
        let auth = handshake::initiate(&mut channel, &config.secret).await?;
        log::info!("Authenticated with coordinator in {:?}", auth.elapsed);

        let (events_tx, events) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(
            Arc::new(Sha256Algo::new()),
            config.threads,
            config.batch_size,
            events_tx,
        )?
        .with_hash_sender(stats.hash_sender());

        Ok(WorkerSession {
            channel,
            scheduler,
            events,
            stats,
        })
    }

    /// Shared view of the mining state
    pub fn status_handle(&self) -> Arc<ArcSwap<MiningState>> {
        self.scheduler.status_handle()
    }

    /// Serves the coordinator until `bye`, `shutdown` or a transport failure
    ///
    /// When `shutdown` completes first, `bye` is sent before returning.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), MinerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                line = self.channel.recv_line() => {
                    let Some(line) = line? else {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "coordinator closed the connection",
                        )
                        .into());
                    };
                    if let Flow::Exit = self.handle_line(&line).await? {
                        return Ok(());
                    }
                }
                Some(event) = self.events.recv() => self.report(event).await?,
                _ = &mut shutdown => {
                    log::info!("Leaving the swarm");
                    self.scheduler.stop(StopReason::Paused);
                    self.channel.send_line(&WorkerMessage::Bye.to_string()).await?;
                    return Ok(());
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow, MinerError> {
        log::trace!("<- {}", line);
        let message = match line.parse::<CoordinatorMessage>() {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring line {:?}: {}", line, e);
                return Ok(Flow::Continue);
            }
        };

        match message {
            CoordinatorMessage::Progress => {
                let status = format!("{} hashes={}", self.scheduler.status(), self.stats.hashes());
                self.send(&status).await?;
            }
            CoordinatorMessage::Nonce { start, stride } => {
                self.scheduler.assign_shard(Shard { start, stride });
            }
            CoordinatorMessage::Payload(payload) => self.scheduler.set_payload(&payload),
            CoordinatorMessage::Solve { difficulty } => match self.scheduler.solve(difficulty) {
                Ok(_) => {}
                Err(MinerError::Protocol(e)) => log::warn!("Cannot start search: {}", e),
                Err(e) => return Err(e),
            },
            CoordinatorMessage::Solved => {
                if self.scheduler.stop(StopReason::Solved) {
                    log::info!("Our candidate solved the task");
                }
            }
            CoordinatorMessage::Pause => {
                if self.scheduler.stop(StopReason::Paused) {
                    log::info!("Task solved elsewhere, search paused");
                }
            }
            CoordinatorMessage::Continue => {
                if !self.scheduler.resume() {
                    log::debug!("CONTINUE ignored: no candidate pending");
                }
            }
            CoordinatorMessage::Bye => {
                log::info!("Coordinator said bye");
                self.scheduler.stop(StopReason::Paused);
                return Ok(Flow::Exit);
            }
            handshake => log::warn!("{}", ProtocolError::OutOfSequence(handshake.to_string())),
        }
        Ok(Flow::Continue)
    }

    async fn report(&mut self, event: EngineEvent) -> Result<(), MinerError> {
        let EngineEvent::Found { generation, candidate } = event;
        if generation != self.scheduler.generation() {
            log::debug!("Dropping candidate of superseded generation {}", generation);
            return Ok(());
        }
        log::info!("Candidate found: nonce {} hash {}", candidate.nonce_hex(), candidate.hash);
        let found = WorkerMessage::Found {
            hash: candidate.hash,
            nonce: candidate.nonce,
        };
        self.send(&found.to_string()).await
    }

    async fn send(&mut self, line: &str) -> Result<(), MinerError> {
        log::trace!("-> {}", line);
        self.channel.send_line(line).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::algorithm::Algorithm;
    use crate::miner::target::meets_target;
    use std::time::Duration;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
    use tokio::sync::oneshot;

    type Channel = LineChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn config() -> WorkerConfig {
        WorkerConfig {
            secret: "s3cret".into(),
            threads: 2,
            batch_size: 16,
            ..WorkerConfig::default()
        }
    }

    /// Connects a session to an in-memory coordinator that has completed the handshake.
    async fn session() -> (WorkerSession<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>, Channel) {
        let (a, b) = tokio::io::duplex(4096);
        let mut coordinator = LineChannel::from_stream(a);
        let stats = StatsReporter::new(Duration::from_secs(60));
        let config = config();
        let (session, accepted) = tokio::join!(
            WorkerSession::establish(LineChannel::from_stream(b), &config, stats),
            handshake::accept(&mut coordinator, "s3cret")
        );
        accepted.unwrap();
        (session.unwrap(), coordinator)
    }

    async fn recv(channel: &mut Channel) -> String {
        tokio::time::timeout(Duration::from_secs(10), channel.recv_line())
            .await
            .expect("line in time")
            .unwrap()
            .expect("connection open")
    }

    #[tokio::test]
    async fn test_solve_reports_found_then_stops_on_solved() {
        let (session, mut coordinator) = session().await;
        let status = session.status_handle();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = tokio::spawn(session.run(async move {
            let _ = stop_rx.await;
        }));

        for line in ["NONCE 0 1", "PAYLOAD abc", "SOLVE 0"] {
            coordinator.send_line(line).await.unwrap();
        }

        let found = recv(&mut coordinator).await;
        let WorkerMessage::Found { hash, nonce } = found.parse().unwrap() else {
            panic!("expected FOUND, got {}", found);
        };
        let expected = Shard::new(0, 1)
            .nonces()
            .find(|&n| meets_target(&Sha256Algo::new().hash(b"abc", n), 0))
            .unwrap();
        assert_eq!(nonce, expected);
        assert_eq!(hash, Sha256Algo::new().hash(b"abc", expected));

        coordinator.send_line("SOLVED").await.unwrap();
        coordinator.send_line("PROGRESS").await.unwrap();
        assert!(recv(&mut coordinator).await.starts_with("SOLVED hashes="));
        assert_eq!(**status.load(), MiningState::Stopped(StopReason::Solved));

        stop_tx.send(()).unwrap();
        assert_eq!(recv(&mut coordinator).await, "bye");
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_progress_before_any_task_is_idle() {
        let (session, mut coordinator) = session().await;
        let running = tokio::spawn(session.run(std::future::pending()));

        coordinator.send_line("progress").await.unwrap();
        assert_eq!(recv(&mut coordinator).await, "IDLE hashes=0");

        coordinator.send_line("bye").await.unwrap();
        running.await.unwrap().unwrap();
    }

    /// SOLVE before NONCE/PAYLOAD is logged and ignored; the session stays up.
    #[tokio::test]
    async fn test_out_of_sequence_solve_keeps_session() {
        let (session, mut coordinator) = session().await;
        let running = tokio::spawn(session.run(std::future::pending()));

        coordinator.send_line("SOLVE 1").await.unwrap();
        coordinator.send_line("CONTINUE").await.unwrap();
        coordinator.send_line("NONSENSE").await.unwrap();
        coordinator.send_line("PROGRESS").await.unwrap();
        assert_eq!(recv(&mut coordinator).await, "IDLE hashes=0");

        coordinator.send_line("BYE").await.unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_lost_coordinator_is_an_error() {
        let (session, coordinator) = session().await;
        let running = tokio::spawn(session.run(std::future::pending()));
        drop(coordinator);
        assert!(matches!(running.await.unwrap(), Err(MinerError::Io(_))));
    }
}
