//! Busy-work subroutines.
//!
//! Four functions that do nothing but multiply a local integer, so a profile
//! has distinct frames to attribute CPU time to. `delta` also calls `alpha`
//! and `beta`, which gives the call graph one level of nesting.

use std::hint::black_box;

/// Multiplications each subroutine performs per call.
pub const DEFAULT_MULTIPLIES: u32 = 100_000;

/// Subroutine invocations in one [`Workload::round`]: four top-level calls
/// plus the two made from inside `delta`.
pub const CALLS_PER_ROUND: u64 = 6;

pub struct Workload {
    multiplies: u32,
    calls: u64,
}

impl Workload {
    pub fn new(multiplies: u32) -> Self {
        Self {
            multiplies,
            calls: 0,
        }
    }

    /// Total subroutine invocations so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// One top-level iteration: alpha, beta, delta, gamma
    #[inline(never)]
    pub fn round(&mut self) {
        self.alpha();
        self.beta();
        self.delta();
        self.gamma();
    }

    #[inline(never)]
    pub fn alpha(&mut self) {
        self.calls += 1;
        black_box(multiply(self.multiplies));
    }

    #[inline(never)]
    pub fn beta(&mut self) {
        self.calls += 1;
        black_box(multiply(self.multiplies));
    }

    #[inline(never)]
    pub fn delta(&mut self) {
        self.calls += 1;
        black_box(multiply(self.multiplies));
        self.alpha();
        self.beta();
    }

    #[inline(never)]
    pub fn gamma(&mut self) {
        self.calls += 1;
        black_box(multiply(self.multiplies));
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self::new(DEFAULT_MULTIPLIES)
    }
}

// Inlined so the samples land in the calling subroutine's frame.
#[inline(always)]
fn multiply(times: u32) -> u64 {
    let mut z = 3u64;
    for _ in 0..times {
        z = black_box(z).wrapping_mul(3);
    }
    z
}
