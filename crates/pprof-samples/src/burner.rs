//! The CPU burner loop behind the `simple` binary.

use crate::cpu::{self, CpuProfile};
use crate::workload::{self, Workload};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnPlan {
    /// Top-level rounds to run
    pub iterations: u64,
    /// Multiplications per subroutine call
    pub multiplies: u32,
}

impl Default for BurnPlan {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            multiplies: workload::DEFAULT_MULTIPLIES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BurnerConfig {
    /// Where to write the CPU profile; `None` disables profiling
    pub cpuprofile: Option<PathBuf>,
    pub frequency: i32,
    pub plan: BurnPlan,
}

impl Default for BurnerConfig {
    fn default() -> Self {
        Self {
            cpuprofile: None,
            frequency: cpu::DEFAULT_FREQUENCY,
            plan: BurnPlan::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnStats {
    pub iterations: u64,
    pub calls: u64,
    pub elapsed: Duration,
}

/// Run rounds until the plan is done or `running` is cleared.
pub fn run(plan: &BurnPlan, running: &AtomicBool) -> BurnStats {
    let start = Instant::now();
    let mut work = Workload::new(plan.multiplies);
    let mut iterations = 0;

    while iterations < plan.iterations && running.load(Ordering::Relaxed) {
        work.round();
        iterations += 1;
    }

    BurnStats {
        iterations,
        calls: work.calls(),
        elapsed: start.elapsed(),
    }
}

/// Start the configured CPU profile, if any.
///
/// A profile that cannot be started is logged and skipped: the burn goes
/// ahead unprofiled.
pub fn start_profile(config: &BurnerConfig) -> Option<CpuProfile> {
    let path = config.cpuprofile.as_deref()?;
    match CpuProfile::start(path, config.frequency) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cpu profiling disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::CALLS_PER_ROUND;

    fn small_plan() -> BurnPlan {
        BurnPlan {
            iterations: 25,
            multiplies: 100,
        }
    }

    #[test]
    fn test_default_plan() {
        let plan = BurnPlan::default();
        assert_eq!(plan.iterations, 10_000);
        assert_eq!(plan.multiplies, 100_000);
    }

    #[test]
    fn test_run_counts() {
        let running = AtomicBool::new(true);
        let stats = run(&small_plan(), &running);
        assert_eq!(stats.iterations, 25);
        assert_eq!(stats.calls, 25 * CALLS_PER_ROUND);
    }

    #[test]
    fn test_run_is_repeatable() {
        let running = AtomicBool::new(true);
        let first = run(&small_plan(), &running);
        let second = run(&small_plan(), &running);
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(first.calls, second.calls);
    }

    #[test]
    fn test_run_stops_when_cleared() {
        let running = AtomicBool::new(false);
        let stats = run(&small_plan(), &running);
        assert_eq!(stats.iterations, 0);
        assert_eq!(stats.calls, 0);
    }

    #[test]
    fn test_no_profile_without_path() {
        let config = BurnerConfig {
            plan: small_plan(),
            ..Default::default()
        };
        assert!(start_profile(&config).is_none());
    }

    #[test]
    fn test_unwritable_profile_path_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("cpu.prof");
        let config = BurnerConfig {
            cpuprofile: Some(path.clone()),
            plan: small_plan(),
            ..Default::default()
        };

        assert!(start_profile(&config).is_none());
        let stats = run(&config.plan, &AtomicBool::new(true));
        assert_eq!(stats.iterations, 25);
        assert!(!path.exists());
    }
}
