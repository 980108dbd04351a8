// src/coordinator/progress.rs
//! Progress tracker
//!
//! `PROGRESS` fans out to every registered worker and the replies are
//! gathered by worker id. A worker that stays silent past the deadline is
//! reported as [`UNREACHABLE`]; its abandoned request is pruned so its next
//! reply is paired with the next request.

use crate::coordinator::registry::Registry;
use crate::types::WorkerId;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

/// Status reported for a worker that did not answer in time
pub const UNREACHABLE: &str = "unreachable";

/// Collects one status line from every registered worker
pub struct ProgressTracker {
    registry: Arc<Registry>,
    timeout: Duration,
}

impl ProgressTracker {
    /// Creates a tracker waiting at most `timeout` for the replies
    pub fn new(registry: Arc<Registry>, timeout: Duration) -> Self {
        ProgressTracker { registry, timeout }
    }

    /// Sends `PROGRESS` to every worker and gathers the replies by worker id
    pub async fn collect(&self) -> BTreeMap<WorkerId, String> {
        let deadline = Instant::now() + self.timeout;
        let pending: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|worker| (worker.id(), worker.request_status()))
            .collect();

        // replies are awaited together against one shared deadline
        let replies = pending.into_iter().map(|(id, reply)| async move {
            let status = match reply {
                Some(rx) => match timeout_at(deadline, rx).await {
                    Ok(Ok(text)) => text,
                    _ => UNREACHABLE.to_string(),
                },
                None => UNREACHABLE.to_string(),
            };
            (id, status)
        });
        join_all(replies).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::testing::register;

    #[tokio::test]
    async fn test_collects_in_registry_order_with_timeout() {
        let registry = Arc::new(Registry::new());
        let (a, mut ra) = register(&registry);
        let (_b, _rb) = register(&registry);
        let (c, mut rc) = register(&registry);

        tokio::spawn(async move {
            if ra.recv().await.as_deref() == Some("PROGRESS") {
                a.resolve_status("IDLE hashes=0".into());
            }
            if rc.recv().await.as_deref() == Some("PROGRESS") {
                c.resolve_status("TESTING 7 hashes=42".into());
            }
        });

        let tracker = ProgressTracker::new(registry, Duration::from_millis(200));
        let statuses = tracker.collect().await;
        assert_eq!(
            statuses.into_iter().collect::<Vec<_>>(),
            vec![
                (1, "IDLE hashes=0".to_string()),
                (2, UNREACHABLE.to_string()),
                (3, "TESTING 7 hashes=42".to_string()),
            ]
        );
    }

    /// A worker that skips one reply is reported correctly on the next round.
    #[tokio::test]
    async fn test_missed_reply_does_not_shift_later_rounds() {
        let registry = Arc::new(Registry::new());
        let (a, mut ra) = register(&registry);
        let tracker = ProgressTracker::new(registry, Duration::from_millis(50));

        let first = tracker.collect().await;
        assert_eq!(first.get(&1).map(String::as_str), Some(UNREACHABLE));

        let responder = tokio::spawn(async move {
            // the first request goes unanswered, the second gets a reply
            assert_eq!(ra.recv().await.as_deref(), Some("PROGRESS"));
            assert_eq!(ra.recv().await.as_deref(), Some("PROGRESS"));
            a.resolve_status("TESTING 2 hashes=77".into());
            ra
        });

        let second = tracker.collect().await;
        assert_eq!(second.get(&1).map(String::as_str), Some("TESTING 2 hashes=77"));
        drop(responder.await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_connection_is_unreachable() {
        let registry = Arc::new(Registry::new());
        let (_a, ra) = register(&registry);
        drop(ra);

        let tracker = ProgressTracker::new(registry, Duration::from_secs(5));
        let statuses = tracker.collect().await;
        assert_eq!(statuses.get(&1).map(String::as_str), Some(UNREACHABLE));
    }
}
