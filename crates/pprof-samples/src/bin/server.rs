//! Leaky server: serves /debug/pprof/ while a worker burns CPU and grows a
//! sequence that is never trimmed.
//!
//! Run:     ./target/release/server
//! Inspect: curl -o cpu.prof 'http://localhost:6060/debug/pprof/profile?seconds=10'
//!          curl http://localhost:6060/debug/pprof/heap

use anyhow::Context;
use pprof_samples::debug_server;
use pprof_samples::error::exit_code;
use pprof_samples::leak::{LeakPlan, LeakyWorker};
use std::process::ExitCode;
use std::time::Duration;

pprof_samples::track_heap!();

/// Everything the server needs, fixed at startup
#[derive(Debug, Clone)]
struct ServerConfig {
    listen_addr: String,
    plan: LeakPlan,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: debug_server::DEFAULT_ADDR.to_string(),
            plan: LeakPlan::default(),
        }
    }
}

fn main() -> ExitCode {
    pprof_samples::logging::init("info");

    // A capture still running on the debug endpoint must not hold up exit
    let result = pprof_samples::runtime::block_on_detached(run(ServerConfig::default()))
        .context("Failed to start tokio runtime")
        .and_then(|r| r);

    match result {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(err) = e.downcast_ref::<pprof_samples::Error>() {
                ExitCode::from(err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    // Detached: never joined, dies with the runtime
    drop(debug_server::spawn(config.listen_addr.clone()));

    println!("hello world");

    let mut worker = LeakyWorker::new(config.plan)?;
    let handle = tokio::task::spawn_blocking(move || {
        let stats = worker.run();
        (worker, stats)
    });

    let (worker, stats) = handle
        .await
        .map_err(|e| pprof_samples::Error::Worker(e.to_string()))
        .context("Leaky worker did not complete")?;

    tracing::info!(
        iterations = stats.iterations,
        len = stats.len,
        pauses = stats.pauses,
        calls = stats.calls,
        elapsed = %humantime::format_duration(Duration::from_secs(stats.elapsed.as_secs())),
        "worker done"
    );

    let retained = worker.into_retained();
    tracing::debug!(len = retained.len(), "sequence retained until exit");
    Ok(())
}
