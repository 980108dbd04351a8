// src/network/server.rs
//! Coordinator TCP server
//!
//! One task per accepted connection: handshake, registration, then the
//! inbound line loop. Outbound lines go through the worker's queue and a
//! dedicated writer task, so a connection never has two writers.

use crate::coordinator::Coordinator;
use crate::coordinator::registry::WorkerHandle;
use crate::network::handshake;
use crate::network::line::{self, LineChannel, LineReader};
use crate::network::protocol::WorkerMessage;
use crate::utils::error::{AuthError, MinerError, ProtocolError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

/// Listener accepting worker connections
pub struct CoordinatorServer {
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
}

impl CoordinatorServer {
    /// Binds the listener to the configured address
    ///
    /// # Errors
    /// Returns `MinerError::Io` if the address cannot be bound
    pub async fn bind(coordinator: Arc<Coordinator>) -> Result<Self, MinerError> {
        let listener = TcpListener::bind(&coordinator.config().bind).await?;
        log::info!("Listening for workers on {}", listener.local_addr()?);
        Ok(CoordinatorServer { listener, coordinator })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, MinerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the coordinator shuts down
    pub async fn run(self) -> Result<(), MinerError> {
        let mut shutdown = self.coordinator.subscribe_shutdown();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("Accept failed: {}", e);
                            continue;
                        }
                    };
                    let coordinator = self.coordinator.clone();
                    let shutdown = coordinator.subscribe_shutdown();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, coordinator, shutdown).await {
                            log::warn!("Connection from {} ended: {}", addr, e);
                        }
                    });
                }
                _ = shutdown.recv() => {
                    log::info!("Listener stopped");
                    return Ok(());
                }
            }
        }
    }
}

/// Serves one worker connection from accept to close
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    coordinator: Arc<Coordinator>,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), MinerError> {
    let _ = stream.set_nodelay(true);
    let id = coordinator.registry().next_id();
    log::info!("Connection {} accepted from {}", id, addr);

    let mut channel = LineChannel::from_tcp(stream);
    let config = coordinator.config();
    let auth = tokio::time::timeout(
        config.handshake_timeout(),
        handshake::accept(&mut channel, &config.secret),
    )
    .await
    .map_err(|_| AuthError::Timeout)??;
    log::debug!("Connection {} authenticated in {:?}", id, auth.elapsed);

    let (mut lines, writer) = channel.into_parts();
    let (outbound, queue) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(e) = line::write_lines(writer, queue).await {
            log::debug!("Writer for worker {} stopped: {}", id, e);
        }
    });

    let worker = Arc::new(WorkerHandle::new(id, addr, outbound));
    coordinator.registry().register(worker.clone());

    let result = read_loop(&mut lines, &worker, &coordinator, shutdown).await;
    coordinator.registry().unregister(id);
    result
}

/// Handles inbound lines of a registered worker until it leaves
async fn read_loop(
    lines: &mut LineReader<OwnedReadHalf>,
    worker: &Arc<WorkerHandle>,
    coordinator: &Arc<Coordinator>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), MinerError> {
    loop {
        let line = tokio::select! {
            line = line::next_line(lines) => line?,
            _ = shutdown.recv() => return Ok(()),
        };
        let Some(line) = line else {
            log::info!("Worker {} closed the connection", worker.id());
            return Ok(());
        };
        log::trace!("worker {} -> {}", worker.id(), line);

        match line.parse::<WorkerMessage>() {
            Ok(WorkerMessage::Found { hash, nonce }) => {
                let validator = coordinator.validator().clone();
                let reporter = worker.clone();
                // validated off the read loop so PROGRESS keeps being answered
                tokio::spawn(async move {
                    validator.arbitrate(&reporter, nonce, &hash).await;
                });
            }
            Ok(WorkerMessage::Bye) => {
                log::info!("Worker {} said bye", worker.id());
                return Ok(());
            }
            Ok(WorkerMessage::Status(text)) => {
                if !worker.resolve_status(text) {
                    log::debug!("Worker {}: unsolicited line {:?}", worker.id(), line);
                }
            }
            Ok(other) => log::warn!(
                "Worker {}: {}",
                worker.id(),
                ProtocolError::OutOfSequence(other.to_string())
            ),
            Err(e) => log::warn!("Worker {}: {}", worker.id(), e),
        }
    }
}
