//! CPU profile capture via the `pprof` sampler.
//!
//! The sampler is process-global: only one [`CpuProfile`] or [`capture`] can
//! be active at a time, a second one fails with a profiler error.

use crate::error::Result;
use pprof::protos::Message;
use pprof::{ProfilerGuard, ProfilerGuardBuilder};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sampling frequency in Hz
pub const DEFAULT_FREQUENCY: i32 = 100;

/// Frames from these libraries are dropped from sampled stacks
const BLOCKLIST: &[&str] = &["libc", "libgcc", "pthread", "vdso"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    /// Uncompressed pprof protobuf
    Pprof,
    /// Rendered SVG flamegraph
    Flamegraph,
}

impl ProfileFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ProfileFormat::Pprof => "application/octet-stream",
            ProfileFormat::Flamegraph => "image/svg+xml",
        }
    }
}

fn start_sampling(frequency: i32) -> Result<ProfilerGuard<'static>> {
    let guard = ProfilerGuardBuilder::default()
        .frequency(frequency)
        .blocklist(BLOCKLIST)
        .build()?;
    Ok(guard)
}

fn encode(guard: &ProfilerGuard<'_>, format: ProfileFormat) -> Result<Vec<u8>> {
    let report = guard.report().build()?;
    match format {
        ProfileFormat::Pprof => Ok(report.pprof()?.encode_to_vec()),
        ProfileFormat::Flamegraph => {
            let mut svg = Vec::new();
            report.flamegraph(&mut svg)?;
            Ok(svg)
        }
    }
}

/// Sample the whole process for `duration`, blocking the calling thread.
pub fn capture(duration: Duration, frequency: i32, format: ProfileFormat) -> Result<Vec<u8>> {
    let guard = start_sampling(frequency)?;
    tracing::debug!(?duration, frequency, "cpu capture started");
    std::thread::sleep(duration);
    encode(&guard, format)
}

/// A CPU profile being recorded into a file.
///
/// Call [`CpuProfile::finish`] to write it out and see the result. A profile
/// dropped without `finish` (early return, panic unwinding) is still written,
/// with any failure logged.
pub struct CpuProfile {
    guard: Option<ProfilerGuard<'static>>,
    file: File,
    path: PathBuf,
}

impl CpuProfile {
    /// Create `path` and start sampling. The file is created first, so a bad
    /// path fails before the sampler is touched.
    pub fn start(path: &Path, frequency: i32) -> Result<Self> {
        let file = File::create(path)?;
        let guard = start_sampling(frequency)?;
        tracing::debug!(path = %path.display(), frequency, "cpu profiling started");

        Ok(CpuProfile {
            guard: Some(guard),
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop sampling and write the profile. Returns the bytes written.
    pub fn finish(mut self) -> Result<u64> {
        self.write_out()
    }

    fn write_out(&mut self) -> Result<u64> {
        let Some(guard) = self.guard.take() else {
            return Ok(0);
        };

        let encoded = encode(&guard, ProfileFormat::Pprof)?;
        // Stop sampling before touching the file
        drop(guard);

        self.file.write_all(&encoded)?;
        self.file.sync_all()?;
        tracing::debug!(path = %self.path.display(), bytes = encoded.len(), "cpu profile written");

        Ok(encoded.len() as u64)
    }
}

impl Drop for CpuProfile {
    fn drop(&mut self) {
        if self.guard.is_some()
            && let Err(e) = self.write_out()
        {
            tracing::error!(path = %self.path.display(), error = %e, "failed to write cpu profile");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(
            ProfileFormat::Pprof.content_type(),
            "application/octet-stream"
        );
        assert_eq!(ProfileFormat::Flamegraph.content_type(), "image/svg+xml");
    }

    #[test]
    fn test_start_fails_on_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("cpu.prof");

        let result = CpuProfile::start(&path, DEFAULT_FREQUENCY);
        assert!(matches!(result, Err(crate::Error::Io(_))));
        assert!(!path.exists());
    }
}
