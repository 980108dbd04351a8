// src/main.rs
use clap::Parser;
use hashswarm_rs::utils::logging::init_bench_logging;
use hashswarm_rs::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Main entry point for hashswarm-rs
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Coordinator(opts) => start_coordinator(opts),
        cli::Action::Worker(opts) => start_worker(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Runs the coordinator until `SHUTDOWN` or Ctrl+C
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads configuration and applies CLI overrides
/// 3. Binds the worker listener
/// 4. Reads operator commands from stdin
fn start_coordinator(opts: cli::CoordinatorOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = config::load_or_default(opts.config)?.coordinator;
    // Apply CLI overrides
    if let Some(bind) = opts.bind {
        config.bind = bind;
    }
    if let Some(secret) = opts.secret {
        config.secret = secret;
    }

    let oracle = network::HttpOracle::new(&config.oracle)?;
    let stats = stats::StatsReporter::new(Duration::from_secs(60));

    let rt = Runtime::new()?;
    rt.block_on(async {
        let coordinator = Arc::new(Coordinator::new(config, Arc::new(oracle), stats));
        let server = network::CoordinatorServer::bind(coordinator.clone()).await?;
        let listener = tokio::spawn(server.run());

        println!("Type HELP for the list of commands");
        tokio::select! {
            result = coordinator::console::run(coordinator.clone(), tokio::io::stdin()) => result?,
            _ = tokio::signal::ctrl_c() => coordinator.shutdown(),
        }

        // give writer tasks a moment to flush their bye
        tokio::time::sleep(Duration::from_millis(200)).await;
        listener.await?
    })
}

/// Runs a worker until the coordinator says `bye` or Ctrl+C
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads configuration and applies CLI overrides
/// 3. Starts periodic hashrate reporting
/// 4. Connects, authenticates and serves the coordinator
fn start_worker(opts: cli::WorkerOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = config::load_or_default(opts.config)?.worker;
    // Apply CLI overrides
    if let Some(connect) = opts.connect {
        config.coordinator = connect;
    }
    if let Some(secret) = opts.secret {
        config.secret = secret;
    }
    if let Some(threads) = opts.threads {
        config.threads = threads;
    }

    // Statistics reporting
    let reporter = stats::StatsReporter::new(Duration::from_secs(config.report_interval_secs.max(1)));
    reporter.start_reporting();

    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = network::client::connect(&config, reporter).await?;
        session
            .run(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
    })
}

/// Runs the mining engine benchmark
///
/// # Arguments
/// * `opts` - Benchmark configuration options
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Starts a search at an unreachable difficulty
/// 3. Stops it after the requested duration
/// 4. Reports the measured hashrate
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let reporter = stats::StatsReporter::new(Duration::from_secs(1));
    let (events, _events_rx) = tokio::sync::mpsc::unbounded_channel();
    let algorithm = Arc::new(Sha256Algo::new());
    let mut scheduler = miner::Scheduler::new(algorithm.clone(), opts.threads, opts.batch_size, events)?
        .with_hash_sender(reporter.hash_sender());

    log::info!(
        "Starting {} benchmark for {} seconds on {} thread(s)",
        algorithm.name(),
        opts.duration,
        opts.threads
    );

    // 64 hex digits of zeros leave no room for the required non-zero digit
    scheduler.assign_shard(miner::Shard::new(0, 1));
    scheduler.set_payload("benchmark");
    scheduler.solve(64)?;

    let started = std::time::Instant::now();
    while started.elapsed() < Duration::from_secs(opts.duration) {
        std::thread::sleep(Duration::from_secs(1));
        log::debug!("{} hashes, {}", reporter.hashes(), scheduler.status());
    }
    scheduler.stop(types::StopReason::Paused);

    // Report final results
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", reporter.hashes());
    log::info!("Average hashrate: {:.2} H/s", reporter.hashrate_since_start());
    log::logger().flush(); // Ensure final results appear

    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let (coordinator, worker) = opts.sections();
    let template = config::generate_template(coordinator, worker);
    std::fs::write(&opts.output, template)?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}
