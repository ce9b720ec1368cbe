//! Pure reductions over drained records: per-milestone duration statistics
//! and the whole-run summary. No I/O, no shared state; everything operates
//! on slices and snapshots the caller already holds.

pub use metron_core::CounterSnapshot;
use metron_events::{MilestoneKind, Record};

// ─── Per-milestone statistics ───────────────────────────────────────────────

/// Duration statistics for one milestone kind, in milliseconds.
///
/// All fields are zero when no records of the kind exist; `samples`
/// disambiguates "no data" from a genuine zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MilestoneStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    /// Population standard deviation (divide by N).
    pub stddev_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub samples: usize,
}

/// Computes duration statistics over every record of `kind` in `records`.
pub fn milestone_stats(records: &[Record], kind: MilestoneKind) -> MilestoneStats {
    let mut samples: Vec<f64> = records
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.duration_ms)
        .collect();
    compute_stats(&mut samples)
}

/// Sorts `samples` in place and reduces them. Zeroed stats on empty input.
pub fn compute_stats(samples: &mut [f64]) -> MilestoneStats {
    if samples.is_empty() {
        return MilestoneStats::default();
    }
    samples.sort_unstable_by(f64::total_cmp);

    let count = samples.len();
    let sum: f64 = samples.iter().sum();
    let mean = sum / count as f64;

    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    MilestoneStats {
        min_ms: samples[0],
        max_ms: samples[count - 1],
        mean_ms: mean,
        stddev_ms: variance.sqrt(),
        median_ms: percentile_sorted(samples, 50.0),
        p95_ms: percentile_sorted(samples, 95.0),
        p99_ms: percentile_sorted(samples, 99.0),
        samples: count,
    }
}

/// Nearest-rank percentile (ceil of pct/100 × N) over a sorted slice.
fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}

// ─── Run summary ────────────────────────────────────────────────────────────

/// Whole-run aggregate handed to the sink and the report binary.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub total_runtime_ms: f64,
    /// Highest resident-set figure any record observed, in KB.
    pub peak_memory_kb: u64,
    /// Mean over records carrying a nonzero utilization sample.
    pub avg_cpu_percent: f64,
    pub max_threads: u64,
    pub total_allocations: u64,
    pub total_bytes_allocated: u64,
    pub records: usize,
    pub dropped: u64,
    /// Stats for each kind with at least one record, in discriminant order.
    pub per_milestone: Vec<(MilestoneKind, MilestoneStats)>,
}

/// Reduces a drained record slice plus the counter snapshot into a
/// [`Summary`]. `elapsed_ms` is the run time measured by the caller.
pub fn summarize(
    records: &[Record],
    counters: CounterSnapshot,
    dropped: u64,
    elapsed_ms: f64,
) -> Summary {
    let peak_memory_kb = records
        .iter()
        .map(|r| r.memory.peak_rss_kb.max(r.memory.rss_kb))
        .max()
        .unwrap_or(0);

    let cpu_samples: Vec<f64> = records
        .iter()
        .map(|r| r.cpu.cpu_percent)
        .filter(|&p| p > 0.0)
        .collect();
    let avg_cpu_percent = if cpu_samples.is_empty() {
        0.0
    } else {
        cpu_samples.iter().sum::<f64>() / cpu_samples.len() as f64
    };

    let per_milestone = MilestoneKind::ALL
        .iter()
        .filter_map(|&kind| {
            let stats = milestone_stats(records, kind);
            (stats.samples > 0).then_some((kind, stats))
        })
        .collect();

    Summary {
        total_runtime_ms: elapsed_ms,
        peak_memory_kb,
        avg_cpu_percent,
        max_threads: counters.peak_threads,
        total_allocations: counters.allocation_count,
        total_bytes_allocated: counters.bytes_allocated,
        records: records.len(),
        dropped,
        per_milestone,
    }
}
