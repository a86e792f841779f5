use loadlab_common::MemoryUsage;
use parking_lot::Mutex;
use std::alloc::{GlobalAlloc, Layout, System as SystemAlloc};
use std::sync::atomic::{AtomicUsize, Ordering};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

static HEAP_LIVE: AtomicUsize = AtomicUsize::new(0);
static HEAP_PEAK: AtomicUsize = AtomicUsize::new(0);

/// Global allocator that forwards to the system allocator and tracks live heap bytes.
///
/// Register it in a binary with `#[global_allocator]`; when it is not registered the heap
/// figures stay at zero.
pub struct CountingAllocator;

fn track_grow(bytes: usize) {
    let live = HEAP_LIVE.fetch_add(bytes, Ordering::Relaxed) + bytes;
    HEAP_PEAK.fetch_max(live, Ordering::Relaxed);
}

fn track_shrink(bytes: usize) {
    HEAP_LIVE.fetch_sub(bytes, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = SystemAlloc.alloc(layout);
        if !ptr.is_null() {
            track_grow(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = SystemAlloc.alloc_zeroed(layout);
        if !ptr.is_null() {
            track_grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        SystemAlloc.dealloc(ptr, layout);
        track_shrink(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = SystemAlloc.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                track_grow(new_size - layout.size());
            } else {
                track_shrink(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

/// Bytes currently allocated through `CountingAllocator`.
pub fn heap_live_bytes() -> usize {
    HEAP_LIVE.load(Ordering::Relaxed)
}

/// High-water mark of `heap_live_bytes`.
pub fn heap_peak_bytes() -> usize {
    HEAP_PEAK.load(Ordering::Relaxed)
}

/// Raw memory figures in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
    pub heap_used_bytes: u64,
    pub heap_total_bytes: u64,
}

impl MemorySample {
    /// Figures reported by `/memory`.
    pub fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            rss_mb: bytes_to_mb(self.rss_bytes),
            heap_used_mb: bytes_to_mb(self.heap_used_bytes),
            heap_total_mb: bytes_to_mb(self.heap_total_bytes),
            external_mb: None,
        }
    }

    /// Figures reported by `/stats`, which adds the virtual size as `external_mb`.
    pub fn usage_with_external(&self) -> MemoryUsage {
        MemoryUsage { external_mb: Some(bytes_to_mb(self.virtual_bytes)), ..self.usage() }
    }
}

/// Bytes to MiB, rounded to the nearest integer.
pub fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes as f64 / (1024.0 * 1024.0)).round() as u64
}

/// Reads this process's memory usage from the OS.
pub struct MemoryProbe {
    pid: Pid,
    system: Mutex<System>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self { pid: Pid::from_u32(std::process::id()), system: Mutex::new(System::new()) }
    }

    pub fn sample(&self) -> MemorySample {
        let mut system = self.system.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );

        let (rss_bytes, virtual_bytes) = system
            .process(self.pid)
            .map(|process| (process.memory(), process.virtual_memory()))
            .unwrap_or_default();

        let heap_used = heap_live_bytes();
        MemorySample {
            rss_bytes,
            virtual_bytes,
            heap_used_bytes: heap_used as u64,
            heap_total_bytes: heap_peak_bytes().max(heap_used) as u64,
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}
