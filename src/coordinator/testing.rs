// src/coordinator/testing.rs
//! Test doubles shared by the coordinator unit tests

use crate::coordinator::registry::{Registry, WorkerHandle};
use crate::network::oracle::{Verdict, WorkOracle};
use crate::utils::error::OracleError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Oracle answering from a script instead of over HTTP
pub struct ScriptedOracle {
    payload: Option<String>,
    verdicts: Mutex<VecDeque<Option<Verdict>>>,
    delay: Duration,
    work_calls: Arc<AtomicUsize>,
    validate_calls: Arc<AtomicUsize>,
}

impl ScriptedOracle {
    pub fn with_payload(payload: &str) -> Self {
        ScriptedOracle {
            payload: Some(payload.to_string()),
            verdicts: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            work_calls: Arc::new(AtomicUsize::new(0)),
            validate_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_work() -> Self {
        ScriptedOracle {
            payload: None,
            ..ScriptedOracle::with_payload("")
        }
    }

    /// Validation answers in order; `None` is a service failure. Once the
    /// script runs out every candidate is accepted.
    pub fn with_verdicts(self, verdicts: Vec<Option<Verdict>>) -> Self {
        ScriptedOracle {
            verdicts: Mutex::new(verdicts.into()),
            ..self
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        ScriptedOracle { delay, ..self }
    }

    pub fn work_calls(&self) -> Arc<AtomicUsize> {
        self.work_calls.clone()
    }

    pub fn validate_calls(&self) -> Arc<AtomicUsize> {
        self.validate_calls.clone()
    }
}

#[async_trait]
impl WorkOracle for ScriptedOracle {
    async fn generate_work(&self, _difficulty: u32) -> Result<String, OracleError> {
        self.work_calls.fetch_add(1, Ordering::SeqCst);
        self.payload
            .clone()
            .ok_or_else(|| OracleError::Malformed("scripted failure".into()))
    }

    async fn validate_work(&self, _d: u32, _nonce_hex: &str, _hash: &str) -> Result<Verdict, OracleError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.verdicts.lock().unwrap().pop_front();
        match next {
            Some(Some(verdict)) => Ok(verdict),
            Some(None) => Err(OracleError::Status {
                status: 503,
                body: "scripted failure".into(),
            }),
            None => Ok(Verdict::Accepted),
        }
    }
}

pub fn register(registry: &Registry) -> (Arc<WorkerHandle>, UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
    let handle = Arc::new(WorkerHandle::new(registry.next_id(), addr, tx));
    registry.register(handle.clone());
    (handle, rx)
}

pub fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}
