// src/stats/reporter.rs
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Statistics related to search performance and candidate arbitration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiningStats {
    /// Total number of hashes computed
    pub hashes_total: u64,
    /// Number of candidates accepted by the validation service
    pub candidates_accepted: u64,
    /// Number of candidates rejected (by the service or the local pre-screen)
    pub candidates_rejected: u64,
    /// Number of candidates the service could not decide on
    pub candidates_indeterminate: u64,
}

impl fmt::Display for MiningStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} rejected={} indeterminate={}",
            self.candidates_accepted, self.candidates_rejected, self.candidates_indeterminate
        )
    }
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used by the system (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Samples CPU, memory and temperature
///
/// Creating one is expensive, so only the reporting thread and explicit
/// callers own a monitor.
pub struct HardwareMonitor {
    /// System information collector
    system: System,
    /// Hardware component information collector
    components: Components,
}

impl Default for HardwareMonitor {
    fn default() -> Self {
        HardwareMonitor::new()
    }
}

impl HardwareMonitor {
    /// Creates a monitor with freshly loaded component lists
    pub fn new() -> Self {
        HardwareMonitor {
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn sample(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }
}

/// Collects and reports search and arbitration statistics
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct StatsReporter {
    /// Atomic counters shared by every clone
    stats: Arc<MiningStatsAtomic>,
    /// Interval at which stats are reported
    report_interval: Duration,
}

/// Atomic version of MiningStats for thread-safe operations
struct MiningStatsAtomic {
    hashes: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    indeterminate: AtomicU64,
    start_time: Instant,
}

impl StatsReporter {
    /// Creates a new StatsReporter with the specified reporting interval
    ///
    /// # Arguments
    /// * `report_interval` - How often to log statistics
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            stats: Arc::new(MiningStatsAtomic {
                hashes: AtomicU64::new(0),
                accepted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                indeterminate: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
            report_interval,
        }
    }

    /// Creates and returns a channel sender for hash counts
    ///
    /// The returned sender can be used to report completed hashes.
    /// The reporter will automatically listen for these events on a background thread.
    pub fn hash_sender(&self) -> Sender<u64> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.start_hashrate_listener(rx);
        tx
    }

    /// Records the outcome of one candidate arbitration
    pub fn record(&self, outcome: CandidateOutcome) {
        let counter = match outcome {
            CandidateOutcome::Accepted => &self.stats.accepted,
            CandidateOutcome::Rejected => &self.stats.rejected,
            CandidateOutcome::Indeterminate => &self.stats.indeterminate,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of hashes counted so far
    pub fn hashes(&self) -> u64 {
        self.stats.hashes.load(Ordering::Relaxed)
    }

    /// Gets the current mining statistics
    ///
    /// # Returns
    /// A snapshot of the current mining statistics
    pub fn get_stats(&self) -> MiningStats {
        MiningStats {
            hashes_total: self.hashes(),
            candidates_accepted: self.stats.accepted.load(Ordering::Relaxed),
            candidates_rejected: self.stats.rejected.load(Ordering::Relaxed),
            candidates_indeterminate: self.stats.indeterminate.load(Ordering::Relaxed),
        }
    }

    /// Average hashrate since the reporter was created (hashes per second)
    pub fn hashrate_since_start(&self) -> f64 {
        let elapsed = self.stats.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.hashes() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Starts the periodic reporting of statistics
    ///
    /// This spawns a background thread that logs stats at the configured interval.
    pub fn start_reporting(&self) {
        let reporter = self.clone();
        let interval = self.report_interval;

        std::thread::spawn(move || {
            let mut monitor = HardwareMonitor::new();
            let mut last_hashes = 0u64;

            loop {
                std::thread::sleep(interval);
                let mining_stats = reporter.get_stats();
                let hw_stats = monitor.sample();
                let window_rate =
                    (mining_stats.hashes_total - last_hashes) as f64 / interval.as_secs_f64().max(1e-3);
                last_hashes = mining_stats.hashes_total;

                log::info!(
                    "Hashrate: {:.2} H/s | Candidates A/R/I: {}/{}/{} | CPU: {:.1}% | Temp: {:.1}°C",
                    window_rate,
                    mining_stats.candidates_accepted,
                    mining_stats.candidates_rejected,
                    mining_stats.candidates_indeterminate,
                    hw_stats.cpu_usage,
                    hw_stats.temperature
                );
            }
        });
    }

    /// Starts a listener for hash counts on a background thread
    fn start_hashrate_listener(&self, receiver: Receiver<u64>) {
        let stats = self.stats.clone();

        std::thread::spawn(move || {
            for count in receiver {
                stats.hashes.fetch_add(count, Ordering::Relaxed);
            }
        });
    }
}

/// Result of arbitrating one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// The candidate solved the task
    Accepted,
    /// The candidate was refused
    Rejected,
    /// The validation service could not be reached
    Indeterminate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_are_counted_separately() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let clone = reporter.clone();
        reporter.record(CandidateOutcome::Accepted);
        clone.record(CandidateOutcome::Rejected);
        clone.record(CandidateOutcome::Rejected);
        reporter.record(CandidateOutcome::Indeterminate);

        let stats = reporter.get_stats();
        assert_eq!(stats.candidates_accepted, 1);
        assert_eq!(stats.candidates_rejected, 2, "clones share counters");
        assert_eq!(stats.candidates_indeterminate, 1);
        assert_eq!(stats.to_string(), "accepted=1 rejected=2 indeterminate=1");
    }

    #[test]
    fn test_hash_sender_accumulates() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let sender = reporter.hash_sender();
        sender.send(256).unwrap();
        sender.send(44).unwrap();
        drop(sender);

        let deadline = Instant::now() + Duration::from_secs(5);
        while reporter.hashes() < 300 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reporter.hashes(), 300);
    }

    #[test]
    fn test_hashrate_since_start_counts_reported_hashes() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        assert_eq!(reporter.hashrate_since_start(), 0.0);

        let sender = reporter.hash_sender();
        sender.send(1_000).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while reporter.hashes() < 1_000 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(reporter.hashrate_since_start() > 0.0);
    }
}
