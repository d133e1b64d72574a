//! The leaky worker behind the `server` binary.
//!
//! Burns CPU like the burner, but also appends to a sequence on every
//! iteration and never trims it, so heap usage climbs for the whole run.
//! Every `throttle_every` iterations the worker sleeps to keep CPU usage
//! below a full core.

use crate::error::{Error, Result};
use crate::workload::{self, Workload};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakPlan {
    pub iterations: u64,
    /// Empty entries the sequence starts with
    pub initial_slots: usize,
    /// Sleep on every iteration index divisible by this
    pub throttle_every: u64,
    pub pause: Duration,
    /// Multiplications per subroutine call
    pub multiplies: u32,
    /// Value appended on every iteration
    pub payload: &'static str,
}

impl Default for LeakPlan {
    fn default() -> Self {
        Self {
            iterations: 10_000_000,
            initial_slots: 3,
            throttle_every: 100_000,
            pause: Duration::from_millis(50),
            multiplies: workload::DEFAULT_MULTIPLIES,
            payload: "magical pandas",
        }
    }
}

impl LeakPlan {
    pub fn validate(&self) -> Result<()> {
        if self.throttle_every == 0 {
            return Err(Error::InvalidArgument(
                "throttle_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of indices in `0..iterations` that trigger a pause
    pub fn expected_pauses(&self) -> u64 {
        self.iterations.div_ceil(self.throttle_every)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakStats {
    pub iterations: u64,
    /// Sequence length after the run
    pub len: usize,
    pub pauses: u64,
    pub calls: u64,
    pub elapsed: Duration,
}

pub struct LeakyWorker {
    plan: LeakPlan,
    sequence: Vec<String>,
}

impl LeakyWorker {
    pub fn new(plan: LeakPlan) -> Result<Self> {
        plan.validate()?;
        let sequence = vec![String::new(); plan.initial_slots];
        Ok(Self { plan, sequence })
    }

    pub fn plan(&self) -> &LeakPlan {
        &self.plan
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Give up ownership of the sequence without freeing it, so it stays
    /// resident until the process exits.
    pub fn into_retained(self) -> &'static [String] {
        self.sequence.leak()
    }

    /// Run the whole plan on the calling thread. Sleeps block the thread, so
    /// call this from a dedicated or blocking-pool thread.
    pub fn run(&mut self) -> LeakStats {
        let start = Instant::now();
        let mut work = Workload::new(self.plan.multiplies);
        let mut pauses = 0;

        for i in 0..self.plan.iterations {
            work.round();
            self.sequence.push(self.plan.payload.to_owned());

            if i % self.plan.throttle_every == 0 {
                tracing::debug!(iteration = i, len = self.sequence.len(), "worker pausing");
                std::thread::sleep(self.plan.pause);
                pauses += 1;
            }
        }

        LeakStats {
            iterations: self.plan.iterations,
            len: self.sequence.len(),
            pauses,
            calls: work.calls(),
            elapsed: start.elapsed(),
        }
    }
}
