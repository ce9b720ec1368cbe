//! POD measurement types stored in the record ring.
//!
//! Everything here is `Copy` with a fixed layout: records are written in
//! place into pre-allocated seqlock slots and must support torn-read
//! detection by bitwise copy. No heap pointers, no drop glue.

use crate::label::Label;
use crate::milestone::MilestoneKind;
use metron_clock::Timestamp;

/// OS memory figures plus voluntary heap counters, all point-in-time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct MemorySnapshot {
    /// Resident set size in KB. Zero when the probe could not report it.
    pub rss_kb: u64,
    /// Virtual size in KB. Zero when unavailable.
    pub virt_kb: u64,
    /// Peak resident set size in KB. Zero when unavailable.
    pub peak_rss_kb: u64,
    /// Heap bytes voluntarily reported via allocation tracking.
    pub heap_allocated: u64,
    /// Heap bytes voluntarily reported as freed.
    pub heap_freed: u64,
    pub allocation_count: u64,
    pub free_count: u64,
}

/// Process CPU-time figures and the rolling utilization percentage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct CpuSnapshot {
    /// `Δcpu / Δwall × 100` against the probe's previous sample; zero on the
    /// probe's first call.
    pub cpu_percent: f64,
    /// User-mode CPU seconds since process start.
    pub user_time: f64,
    /// Kernel-mode CPU seconds since process start.
    pub system_time: f64,
    /// Voluntary + involuntary context switches. Zero when unavailable.
    pub context_switches: u64,
    /// Reserved; no portable source, always zero today.
    pub cache_misses: u64,
}

/// One completed measurement, published once and never mutated.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct Record {
    pub kind: MilestoneKind,
    /// Acquisition time (the `end` side for timed milestones).
    pub timestamp: Timestamp,
    /// Elapsed milliseconds for timed milestones; the raw value for events.
    pub duration_ms: f64,
    pub memory: MemorySnapshot,
    pub cpu: CpuSnapshot,
    /// Registered threads at acquisition.
    pub thread_count: i32,
    /// Iteration index for iterative phases, zero otherwise.
    pub iteration: u64,
    /// Convergence metric for iterative phases, zero otherwise.
    pub convergence: f64,
    pub label: Label,
    pub context: Label,
}

/// Per-registered-thread bookkeeping. Written only by the owning thread.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct ThreadInfo {
    /// Dense slot index assigned at registration.
    pub index: u32,
    /// External thread-pool id, -1 when the thread is unpooled.
    pub pool_id: i32,
    pub started: Timestamp,
    /// Zero until the thread unregisters.
    pub ended: Timestamp,
    /// Records published by this thread.
    pub ops: u64,
    pub label: Label,
}
