//! Heap accounting through a counting global allocator.
//!
//! [`TrackingAllocator`] forwards to the system allocator and keeps
//! process-wide counters that the `/debug/pprof/heap` endpoint reports.
//! Install it with the [`track_heap!`](crate::track_heap) macro:
//!
//! ```rust,ignore
//! pprof_samples::track_heap!();
//! ```
//!
//! Without the macro the counters stay at zero and [`is_tracking`] is false.

use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

static TOTAL_ALLOCS: AtomicU64 = AtomicU64::new(0);
static TOTAL_FREES: AtomicU64 = AtomicU64::new(0);
static TOTAL_ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static TOTAL_FREE_BYTES: AtomicU64 = AtomicU64::new(0);
static LIVE_BYTES: AtomicI64 = AtomicI64::new(0);
static PEAK_LIVE_BYTES: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_bytes: i64,
    pub peak_live_bytes: i64,
    pub total_allocs: u64,
    pub total_frees: u64,
    pub total_alloc_bytes: u64,
    pub total_free_bytes: u64,
}

impl HeapStats {
    pub fn live_allocs(&self) -> u64 {
        self.total_allocs.saturating_sub(self.total_frees)
    }

    /// Plain-text report, one `key: value` per line
    pub fn render(&self, generated_at: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "heap profile: generated {generated_at}");
        if self.total_allocs == 0 {
            let _ = writeln!(out, "# allocation tracking is not installed");
        }
        let _ = writeln!(out, "live_bytes: {}", self.live_bytes);
        let _ = writeln!(out, "peak_live_bytes: {}", self.peak_live_bytes);
        let _ = writeln!(out, "live_allocs: {}", self.live_allocs());
        let _ = writeln!(out, "total_allocs: {}", self.total_allocs);
        let _ = writeln!(out, "total_frees: {}", self.total_frees);
        let _ = writeln!(out, "total_alloc_bytes: {}", self.total_alloc_bytes);
        let _ = writeln!(out, "total_free_bytes: {}", self.total_free_bytes);
        out
    }
}

/// Current values of the process-wide counters
pub fn snapshot() -> HeapStats {
    HeapStats {
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        peak_live_bytes: PEAK_LIVE_BYTES.load(Ordering::Relaxed),
        total_allocs: TOTAL_ALLOCS.load(Ordering::Relaxed),
        total_frees: TOTAL_FREES.load(Ordering::Relaxed),
        total_alloc_bytes: TOTAL_ALLOC_BYTES.load(Ordering::Relaxed),
        total_free_bytes: TOTAL_FREE_BYTES.load(Ordering::Relaxed),
    }
}

/// Whether any allocation has gone through [`TrackingAllocator`]
pub fn is_tracking() -> bool {
    TOTAL_ALLOCS.load(Ordering::Relaxed) > 0
}

#[inline]
fn record_alloc(size: usize) {
    TOTAL_ALLOCS.fetch_add(1, Ordering::Relaxed);
    TOTAL_ALLOC_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    let live = LIVE_BYTES.fetch_add(size as i64, Ordering::Relaxed) + size as i64;
    PEAK_LIVE_BYTES.fetch_max(live, Ordering::Relaxed);
}

#[inline]
fn record_free(size: usize) {
    TOTAL_FREES.fetch_add(1, Ordering::Relaxed);
    TOTAL_FREE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    LIVE_BYTES.fetch_sub(size as i64, Ordering::Relaxed);
}

/// Counting wrapper around [`System`].
pub struct TrackingAllocator;

impl TrackingAllocator {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for TrackingAllocator {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        record_free(layout.size());
        unsafe { System.dealloc(ptr, layout) }
    }

    #[inline]
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        // On failure the old block is untouched and still live
        if !new_ptr.is_null() {
            record_free(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// Install [`TrackingAllocator`](crate::heap::TrackingAllocator) as the
/// global allocator.
#[macro_export]
macro_rules! track_heap {
    () => {
        #[global_allocator]
        static __PPROF_SAMPLES_ALLOC: $crate::heap::TrackingAllocator =
            $crate::heap::TrackingAllocator::new();
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_dealloc_are_counted() {
        let alloc = TrackingAllocator::new();
        let layout = Layout::from_size_align(4096, 8).unwrap();
        let before = snapshot();

        let ptr = unsafe { alloc.alloc(layout) };
        assert!(!ptr.is_null());
        let during = snapshot();
        assert!(during.total_allocs > before.total_allocs);
        assert!(during.total_alloc_bytes >= before.total_alloc_bytes + 4096);
        assert!(during.peak_live_bytes >= 4096);
        assert!(is_tracking());

        unsafe { alloc.dealloc(ptr, layout) };
        let after = snapshot();
        assert!(after.total_frees > before.total_frees);
        assert!(after.total_free_bytes >= before.total_free_bytes + 4096);
    }

    #[test]
    fn test_render_lists_counters() {
        let stats = HeapStats {
            live_bytes: 300,
            peak_live_bytes: 500,
            total_allocs: 5,
            total_frees: 2,
            total_alloc_bytes: 800,
            total_free_bytes: 500,
        };
        let text = stats.render("2026-01-01T00:00:00Z");

        assert!(text.starts_with("heap profile: generated 2026-01-01T00:00:00Z\n"));
        assert!(text.contains("live_bytes: 300\n"));
        assert!(text.contains("live_allocs: 3\n"));
        assert!(!text.contains("not installed"));
    }

    #[test]
    fn test_render_flags_missing_allocator() {
        let text = HeapStats::default().render("now");
        assert!(text.contains("# allocation tracking is not installed"));
    }
}
