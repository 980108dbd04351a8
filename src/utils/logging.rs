// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! One log format for every role of the binary (coordinator, worker,
//! benchmark), written to stdout through `env_logger`. Handshake and
//! protocol lines are emitted at `trace`, so `RUST_LOG=hashswarm_rs=trace`
//! shows the full wire conversation.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes logging for the coordinator and worker processes
///
/// Defaults to `Info`; `RUST_LOG` filters take precedence when set.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    init_with_default(LevelFilter::Info);
}

/// Initializes logging for `benchmark`
///
/// Same format, but defaults to `Debug` so the per-second hash counts show.
pub fn init_bench_logging() {
    init_with_default(LevelFilter::Debug);
}

fn init_with_default(level: LevelFilter) {
    let mut builder = swarm_log_format();
    match env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(level),
    };
    let _ = builder.try_init();
}

/// Base builder: `[ts LEVEL module:line] message` on stdout
///
/// Records from hasher and search threads carry the thread name after the
/// location, which tells generations apart in busy logs.
fn swarm_log_format() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            match std::thread::current().name() {
                Some(thread) if thread.starts_with("search-") || thread.starts_with("hasher-") => writeln!(
                    buf,
                    "[{} {} {}:{} {}] {}",
                    ts,
                    record.level(),
                    module,
                    line,
                    thread,
                    record.args()
                ),
                _ => writeln!(buf, "[{} {} {}:{}] {}", ts, record.level(), module, line, record.args()),
            }
        })
        .target(Target::Stdout);

    builder
}
