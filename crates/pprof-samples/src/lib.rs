//! Sample programs to point a profiler at.
//!
//! Two targets live in this crate:
//! - **simple**: burns CPU in four busy-work functions and optionally writes a
//!   pprof CPU profile to a file
//! - **server**: serves `/debug/pprof/` endpoints while a worker burns CPU and
//!   grows a sequence that is never trimmed
//!
//! All of the logic lives in the library so both loops can be driven with
//! small plans from tests.

pub mod burner;
pub mod cli;
pub mod cpu;
pub mod debug_server;
pub mod error;
pub mod heap;
pub mod leak;
pub mod logging;
pub mod process;
pub mod runtime;
pub mod workload;

pub use error::{Error, Result};
