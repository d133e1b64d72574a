//! CPU burner: runs the busy-work rounds, optionally under a CPU profiler.
//!
//! Run:     ./target/release/simple -cpuprofile=cpu.prof
//! Inspect: pprof -top target/release/simple cpu.prof

use anyhow::Context;
use pprof_samples::burner;
use pprof_samples::cli::SimpleCli;
use pprof_samples::error::exit_code;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() -> ExitCode {
    let cli = match SimpleCli::parse_from_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here too, with exit code 0
            let _ = e.print();
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    pprof_samples::logging::init("warn");

    match run(cli) {
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

fn run(cli: SimpleCli) -> anyhow::Result<()> {
    let config = cli.into_config();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl-C handler")?;

    let profile = burner::start_profile(&config);

    let stats = burner::run(&config.plan, &running);
    tracing::info!(
        iterations = stats.iterations,
        calls = stats.calls,
        elapsed = %round_to_millis(stats.elapsed),
        "burn complete"
    );
    if stats.iterations < config.plan.iterations {
        tracing::warn!(
            iterations = stats.iterations,
            planned = config.plan.iterations,
            "interrupted"
        );
    }

    if let Some(profile) = profile {
        let path = profile.path().to_path_buf();
        let bytes = profile
            .finish()
            .with_context(|| format!("Failed to write cpu profile {}", path.display()))?;
        tracing::info!(path = %path.display(), bytes, "cpu profile written");
    }

    Ok(())
}

fn round_to_millis(d: std::time::Duration) -> humantime::FormattedDuration {
    humantime::format_duration(std::time::Duration::from_millis(d.as_millis() as u64))
}
