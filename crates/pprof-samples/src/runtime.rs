//! Tokio runtime for the `server` binary.
//!
//! `#[tokio::main]` drops its runtime on return, and dropping waits for every
//! blocking task. A CPU capture on the debug endpoint runs on the blocking
//! pool for up to its full `seconds`, so the process would hang around after
//! the worker is done. [`block_on_detached`] shuts down without waiting.

use std::future::Future;

/// Run `future` to completion on a fresh multi-threaded runtime, then shut the
/// runtime down in the background: spawned and blocking tasks still running
/// are abandoned.
pub fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
