// src/coordinator/registry.rs
//! Registry of connected, authenticated workers
//!
//! Workers enter after a successful handshake and leave when their
//! connection ends. Registration order is shard order: the worker at
//! position `i` of a dispatch-time snapshot searches shard `i`.

use crate::network::protocol::CoordinatorMessage;
use crate::types::WorkerId;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;

/// Coordinator-side record of one registered worker
///
/// Owns the sending end of the connection's outbound queue; the queue is
/// drained by the connection's single writer task.
#[derive(Debug)]
pub struct WorkerHandle {
    /// Stable identifier assigned at accept time
    id: WorkerId,
    /// Peer address, for the operator
    addr: SocketAddr,
    /// Lines to be written to the worker
    outbound: UnboundedSender<String>,
    /// Task generation this worker was last dispatched (0 = none)
    generation: AtomicU64,
    /// Pending `PROGRESS` requests, answered in order
    progress_waiters: Mutex<VecDeque<oneshot::Sender<String>>>,
}

impl WorkerHandle {
    /// Creates a handle writing to `outbound`
    pub fn new(id: WorkerId, addr: SocketAddr, outbound: UnboundedSender<String>) -> Self {
        WorkerHandle {
            id,
            addr,
            outbound,
            generation: AtomicU64::new(0),
            progress_waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Worker identifier
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Peer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues `message` for the worker
    ///
    /// Returns `false` if the connection is already gone. Never blocks.
    pub fn send(&self, message: &CoordinatorMessage) -> bool {
        log::trace!("worker {} <- {}", self.id, message);
        self.outbound.send(message.to_string()).is_ok()
    }

    /// Task generation the worker was last dispatched
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Records the generation the worker is about to be dispatched
    pub fn set_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::Release);
    }

    /// Sends `PROGRESS` and returns a receiver for the reply
    ///
    /// Returns `None` if the connection is gone.
    pub fn request_status(&self) -> Option<oneshot::Receiver<String>> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.waiters();
        // requests that already timed out no longer take a reply
        waiters.retain(|waiter| !waiter.is_closed());
        waiters.push_back(tx);
        if self.send(&CoordinatorMessage::Progress) {
            Some(rx)
        } else {
            waiters.pop_back();
            None
        }
    }

    /// Hands a status line to the oldest pending `PROGRESS` request
    ///
    /// Requests whose caller stopped waiting are skipped, so a missed reply
    /// does not shift every later one onto the wrong request. Returns
    /// `false` if no request was pending.
    pub fn resolve_status(&self, text: String) -> bool {
        let mut waiters = self.waiters();
        while let Some(waiter) = waiters.pop_front() {
            if waiter.is_closed() {
                log::debug!("worker {}: dropping timed out status request", self.id);
                continue;
            }
            if waiter.send(text).is_err() {
                log::debug!("worker {}: late status reply discarded", self.id);
            }
            return true;
        }
        false
    }

    fn waiters(&self) -> MutexGuard<'_, VecDeque<oneshot::Sender<String>>> {
        self.progress_waiters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lock-guarded, ordered collection of registered workers
#[derive(Debug)]
pub struct Registry {
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
    next_id: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    /// Creates an empty registry; the first id handed out is 1
    pub fn new() -> Self {
        Registry {
            workers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates the id of a newly accepted connection
    pub fn next_id(&self) -> WorkerId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Appends a worker that completed its handshake
    pub fn register(&self, worker: Arc<WorkerHandle>) {
        log::info!("Worker {} ({}) registered", worker.id(), worker.addr());
        self.write().push(worker);
    }

    /// Removes a worker, returning its handle if it was registered
    pub fn unregister(&self, id: WorkerId) -> Option<Arc<WorkerHandle>> {
        let mut workers = self.write();
        let position = workers.iter().position(|w| w.id() == id)?;
        let removed = workers.remove(position);
        log::info!("Worker {} ({}) unregistered", removed.id(), removed.addr());
        Some(removed)
    }

    /// Registered workers in registration order
    pub fn snapshot(&self) -> Vec<Arc<WorkerHandle>> {
        self.read().clone()
    }

    /// Looks a worker up by id
    pub fn get(&self, id: WorkerId) -> Option<Arc<WorkerHandle>> {
        self.read().iter().find(|w| w.id() == id).cloned()
    }

    /// Number of registered workers
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no worker is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Calls `f` on every worker in registration order
    ///
    /// Registration and removal wait until the iteration is over.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<WorkerHandle>)) {
        for worker in self.read().iter() {
            f(worker);
        }
    }

    /// Sends `message` to every worker, returning how many were reached
    pub fn broadcast(&self, message: &CoordinatorMessage) -> usize {
        let mut delivered = 0;
        self.for_each(|worker| {
            if worker.send(message) {
                delivered += 1;
            }
        });
        delivered
    }

    /// Sends `message` to every worker but `except`
    pub fn broadcast_except(&self, except: WorkerId, message: &CoordinatorMessage) -> usize {
        let mut delivered = 0;
        self.for_each(|worker| {
            if worker.id() != except && worker.send(message) {
                delivered += 1;
            }
        });
        delivered
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<WorkerHandle>>> {
        self.workers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<WorkerHandle>>> {
        self.workers.write().unwrap_or_else(|e| e.into_inner())
    }
}
