// src/cli/commands.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hashswarm-rs - distributed proof-of-work search
#[derive(Parser, Debug)]
#[command(name = "hashswarm-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (run a role, benchmark, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the swarm application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Accept workers and read operator commands from stdin
    Coordinator(CoordinatorOptions),

    /// Connect to a coordinator and search the nonce space
    Worker(WorkerOptions),

    /// Measure the local hashrate of the mining engine
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for running the coordinator
#[derive(Parser, Debug)]
pub struct CoordinatorOptions {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Shared secret workers must present (overrides config)
    #[arg(short, long)]
    pub secret: Option<String>,
}

/// Options for running a worker
#[derive(Parser, Debug)]
pub struct WorkerOptions {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Coordinator address, host:port (overrides config)
    #[arg(long)]
    pub connect: Option<String>,

    /// Shared secret (overrides config)
    #[arg(short, long)]
    pub secret: Option<String>,

    /// Number of hasher threads, 0 = all CPUs (overrides config)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Options for running the mining benchmark
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Nonces hashed between two cancellation checks
    #[arg(short, long, default_value_t = 256)]
    pub batch_size: u32,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "hashswarm.toml")]
    pub output: PathBuf,

    /// Only include the coordinator section
    #[arg(long, conflicts_with = "worker")]
    pub coordinator: bool,

    /// Only include the worker section
    #[arg(long)]
    pub worker: bool,
}

impl ConfigOptions {
    /// Sections to write: both unless one was singled out
    pub fn sections(&self) -> (bool, bool) {
        match (self.coordinator, self.worker) {
            (false, false) => (true, true),
            selected => selected,
        }
    }
}
