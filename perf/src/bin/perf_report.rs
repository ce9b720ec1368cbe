use std::collections::BTreeMap;
use std::hint::black_box;
use std::mem::{align_of, size_of};
use std::path::PathBuf;
use std::time::Instant;

use metron_clock::Timestamp;
use metron_events::{CpuSnapshot, MemorySnapshot, Record, ThreadInfo};
use metron_perf::*;
use metron_recorder::{MAX_LOG_ENTRIES, MilestoneKind, Recorder, format_bytes, format_duration};
use metron_ring::SeqlockSlot;

fn main() {
    let rusage_start = capture_rusage();
    let cache = get_cache_info();

    let mut results: Vec<BenchResult> = Vec::new();
    let mut workload_json = serde_json::Value::Null;
    let mut soak_stats: Option<Stats> = None;
    let mut soak_windows: Vec<serde_json::Value> = Vec::new();

    // ═══════════════════════════════════════════════════════════════════════
    // 1. Banner
    // ═══════════════════════════════════════════════════════════════════════
    print_banner(&cache);

    // ═══════════════════════════════════════════════════════════════════════
    // 2. Memory Layout
    // ═══════════════════════════════════════════════════════════════════════
    section_memory_layout(&cache);

    // ═══════════════════════════════════════════════════════════════════════
    // 3. Clock Calibration
    // ═══════════════════════════════════════════════════════════════════════
    section_clock(&mut results);

    // ═══════════════════════════════════════════════════════════════════════
    // 4. Criterion Hot Path Results (read from criterion JSON)
    // ═══════════════════════════════════════════════════════════════════════
    let criterion_dir = criterion_target_dir();
    let estimates = read_criterion_estimates(&criterion_dir);
    section_criterion_paths(&estimates);

    // ═══════════════════════════════════════════════════════════════════════
    // 5. Replayed Workload (per-milestone profile + drain costs)
    // ═══════════════════════════════════════════════════════════════════════
    section_workload(&mut results, &mut workload_json);

    // ═══════════════════════════════════════════════════════════════════════
    // 6. Soak Test
    // ═══════════════════════════════════════════════════════════════════════
    section_soak(&mut soak_windows, &mut soak_stats, &mut results);

    // ═══════════════════════════════════════════════════════════════════════
    // 7. Resource Usage
    // ═══════════════════════════════════════════════════════════════════════
    let rusage_end = capture_rusage();
    section_resources(&rusage_start, &rusage_end);

    // ═══════════════════════════════════════════════════════════════════════
    // 8. JSON Output
    // ═══════════════════════════════════════════════════════════════════════
    save_results(
        &results,
        &cache,
        &estimates,
        &workload_json,
        &soak_stats,
        &soak_windows,
        &rusage_start,
        &rusage_end,
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Criterion target directory
// ═══════════════════════════════════════════════════════════════════════════

fn criterion_target_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR = perf/, criterion output is in <workspace>/target/criterion
    let manifest = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest)
        .parent()
        .unwrap()
        .join("target")
        .join("criterion")
}

// ═══════════════════════════════════════════════════════════════════════════
// Banner
// ═══════════════════════════════════════════════════════════════════════════

fn print_banner(cache: &CacheInfo) {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  METRON PERFORMANCE REPORT");
    println!("  criterion micro + replayed workload + sustained soak");
    println!("{bar}\n");

    let os = run_cmd("uname", &["-srm"]).unwrap_or_else(|| "unknown".into());
    let date = run_cmd("date", &["+%Y-%m-%d %H:%M:%S"]).unwrap_or_default();

    println!("  CPU:     {}  ({} cores)", cache.cpu_brand, cache.ncpu);
    println!("  RAM:     {}", format_bytes(cache.ram_bytes));
    println!("  OS:      {}", os.trim());
    println!("  Date:    {}", date.trim());

    println!("\n  Cache Hierarchy:");
    if cache.l1d_bytes > 0 {
        println!(
            "    L1 Data:        {} / core",
            format_bytes(cache.l1d_bytes)
        );
    }
    if cache.l1i_bytes > 0 {
        println!(
            "    L1 Instruction: {} / core",
            format_bytes(cache.l1i_bytes)
        );
    }
    if cache.l2_bytes > 0 {
        println!("    L2:             {}", format_bytes(cache.l2_bytes));
    }
    println!("    Cache Line:     {} B", cache.line_size);
}

// ═══════════════════════════════════════════════════════════════════════════
// Memory Layout
// ═══════════════════════════════════════════════════════════════════════════

fn section_memory_layout(cache: &CacheInfo) {
    section_header("MEMORY LAYOUT & CACHE ANALYSIS");

    let line = cache.line_size.max(1);
    let l1d = cache.l1d_bytes;
    let l2 = cache.l2_bytes;

    let record_size = size_of::<Record>() as u64;
    let slot_size = size_of::<SeqlockSlot<Record>>() as u64;

    println!(
        "  {:<26} {:>8} {:>8} {:>12} {:>10} {:>10}",
        "Type", "Size", "Align", "Cache Lines", "Fit/L1d", "Fit/L2"
    );
    println!("  {}", "\u{2500}".repeat(80));

    let types: &[(&str, u64, u64)] = &[
        (
            "Timestamp",
            size_of::<Timestamp>() as u64,
            align_of::<Timestamp>() as u64,
        ),
        (
            "MemorySnapshot",
            size_of::<MemorySnapshot>() as u64,
            align_of::<MemorySnapshot>() as u64,
        ),
        (
            "CpuSnapshot",
            size_of::<CpuSnapshot>() as u64,
            align_of::<CpuSnapshot>() as u64,
        ),
        ("Record", record_size, align_of::<Record>() as u64),
        (
            "SeqlockSlot<Record>",
            slot_size,
            align_of::<SeqlockSlot<Record>>() as u64,
        ),
        (
            "ThreadInfo",
            size_of::<ThreadInfo>() as u64,
            align_of::<ThreadInfo>() as u64,
        ),
    ];

    for &(name, size, align) in types {
        let lines = size.div_ceil(line);
        let fit_l1 = if l1d > 0 && size > 0 {
            format!("{}", l1d / size)
        } else {
            "\u{2014}".into()
        };
        let fit_l2 = if l2 > 0 && size > 0 {
            format!("{}", l2 / size)
        } else {
            "\u{2014}".into()
        };
        println!(
            "  {:<26} {:>6} B {:>6} B {:>12} {:>10} {:>10}",
            name, size, align, lines, fit_l1, fit_l2
        );
    }

    println!("\n  Notes:");
    println!(
        "    * SeqlockSlot<Record> stride is {} B ({} cache lines), no slot sharing",
        slot_size,
        slot_size.div_ceil(line)
    );
    println!(
        "    * Full ring footprint: {}  ({} slots)",
        format_bytes(slot_size * MAX_LOG_ENTRIES as u64),
        MAX_LOG_ENTRIES
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock Calibration
// ═══════════════════════════════════════════════════════════════════════════

fn section_clock(results: &mut Vec<BenchResult>) {
    section_header("CLOCK CALIBRATION");
    print_table_header();

    let r_prod = measure_batched("Timestamp::now()", 1000, 10_000, 100, || {
        black_box(Timestamp::now());
    });
    print_result_row(&r_prod);
    results.push(r_prod.clone());

    let r_mono = measure_batched("mono_now_ns()", 1000, 10_000, 100, || {
        black_box(mono_now_ns());
    });
    print_result_row(&r_mono);
    results.push(r_mono.clone());

    let r_instant = measure_batched("Instant::now()", 1000, 10_000, 100, || {
        black_box(Instant::now());
    });
    print_result_row(&r_instant);
    results.push(r_instant.clone());

    let floor = r_prod
        .stats
        .p50
        .min(r_mono.stats.p50)
        .min(r_instant.stats.p50);

    println!("\n  * Measurement floor: ~{floor} ns");
    println!("  * All timings below use batched amortisation (10k ops/batch) for ~1ns accuracy");
}

// ═══════════════════════════════════════════════════════════════════════════
// Criterion Hot Path Display (reads JSON from criterion runs)
// ═══════════════════════════════════════════════════════════════════════════

fn section_criterion_paths(estimates: &BTreeMap<String, CriterionEstimate>) {
    if estimates.is_empty() {
        section_header("CRITERION HOT PATH RESULTS");
        println!("  No criterion data found. Run: cargo bench -p metron-perf");
        return;
    }

    // Timed milestone path
    let milestone_steps: &[(&str, &str)] = &[
        ("clock/timestamp_now", "timestamp_now"),
        ("recorder/registry_lookup", "registry_lookup"),
        ("ring/push", "ring_push"),
    ];
    let milestone_e2e = ("recorder/start_end_pair", "start_end_pair");

    print_criterion_path(
        "MILESTONE HOT PATH",
        "timestamp \u{2192} interval close \u{2192} ring publish",
        milestone_steps,
        milestone_e2e,
        estimates,
    );

    // Event path
    let event_steps: &[(&str, &str)] = &[
        ("clock/timestamp_now", "timestamp_now"),
        ("ring/push", "ring_push"),
    ];
    let event_e2e = ("recorder/event", "event");

    print_criterion_path(
        "EVENT HOT PATH",
        "timestamp \u{2192} label \u{2192} ring publish",
        event_steps,
        event_e2e,
        estimates,
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Replayed Workload — per-milestone profile + drain-side costs
// ═══════════════════════════════════════════════════════════════════════════

const WORKLOAD_ROUNDS: u64 = 1000;

fn section_workload(results: &mut Vec<BenchResult>, out: &mut serde_json::Value) {
    section_header("REPLAYED WORKLOAD (1000 rounds, per-milestone profile)");

    let rec = Recorder::new(report_config());
    let elapsed_ns = replay_workload(&rec, WORKLOAD_ROUNDS);
    let records = rec.records();
    let summary = rec.summary();

    println!(
        "  {} records in {} ({:.2} M records/s) | {} dropped | peak RSS probe {}",
        format_count(records.len() as u64),
        format_ns(elapsed_ns as f64),
        records.len() as f64 / (elapsed_ns as f64 / 1e9) / 1e6,
        rec.dropped_count(),
        format_bytes(summary.peak_memory_kb * 1024),
    );

    println!(
        "\n  {:<26} {:>7} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Milestone", "count", "total", "mean", "p50", "p95", "p99"
    );
    println!("  {}", "\u{2500}".repeat(88));

    let mut rows = Vec::new();
    for kind in MilestoneKind::ALL {
        let stats = rec.milestone_stats(kind);
        if stats.samples == 0 {
            continue;
        }
        let total_ms = stats.mean_ms * stats.samples as f64;
        println!(
            "  {:<26} {:>7} {:>10} {:>10} {:>10} {:>10} {:>10}",
            kind.name(),
            stats.samples,
            format_duration(total_ms),
            format_duration(stats.mean_ms),
            format_duration(stats.median_ms),
            format_duration(stats.p95_ms),
            format_duration(stats.p99_ms),
        );
        rows.push(serde_json::json!({
            "milestone": kind.name(),
            "count": stats.samples,
            "total_ms": total_ms,
            "mean_ms": stats.mean_ms,
            "p50_ms": stats.median_ms,
            "p95_ms": stats.p95_ms,
            "p99_ms": stats.p99_ms,
        }));
    }

    // Drain-side costs against the populated buffer
    println!();
    print_table_header();

    let r_snapshot = measure_batched("records() snapshot", 200, 10, 2, || {
        black_box(rec.records());
    });
    print_result_row(&r_snapshot);
    results.push(r_snapshot);

    let r_summary = measure_batched("summary()", 200, 10, 2, || {
        black_box(rec.summary());
    });
    print_result_row(&r_summary);
    results.push(r_summary);

    let csv_path = temp_export_path("report.csv");
    let t0 = Instant::now();
    let csv_ok = rec.export_csv(&csv_path).is_ok();
    let csv_ns = t0.elapsed().as_nanos() as u64;

    let json_path = temp_export_path("report.json");
    let t0 = Instant::now();
    let json_ok = rec.export_json(&json_path).is_ok();
    let json_ns = t0.elapsed().as_nanos() as u64;

    println!(
        "\n  export_csv:  {:>10} for {} records{}",
        format_ns(csv_ns as f64),
        records.len(),
        if csv_ok { "" } else { "  (FAILED)" },
    );
    println!(
        "  export_json: {:>10} for {} records{}",
        format_ns(json_ns as f64),
        records.len(),
        if json_ok { "" } else { "  (FAILED)" },
    );
    let _ = std::fs::remove_file(&csv_path);
    let _ = std::fs::remove_file(&json_path);

    *out = serde_json::json!({
        "rounds": WORKLOAD_ROUNDS,
        "elapsed_ns": elapsed_ns,
        "records": records.len(),
        "dropped": rec.dropped_count(),
        "max_threads": summary.max_threads,
        "per_milestone": rows,
        "export_csv_ns": csv_ns,
        "export_json_ns": json_ns,
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// Soak Test — operational sanity gate
// Catches: thermal/freq drift, throughput stability, tail growth, regressions
// ═══════════════════════════════════════════════════════════════════════════

fn section_soak(
    windows: &mut Vec<serde_json::Value>,
    out_stats: &mut Option<Stats>,
    results: &mut Vec<BenchResult>,
) {
    section_header("SOAK TEST (3s sustained recording)");

    let rec = Recorder::new(report_config());
    rec.register_thread();

    let duration_ns = 3_000_000_000u64;
    let sample_interval = 64u64;
    let check_interval = 4096u64;

    let mut total = 0u64;
    let mut all_latencies = Vec::with_capacity(200_000);
    let mut window_latencies: Vec<u64> = Vec::with_capacity(50_000);
    let mut window_count = 0u64;
    let mut window_idx = 1usize;

    let start = mono_now_ns();
    let mut window_start = start;

    loop {
        total += 1;
        window_count += 1;

        let sample = total.is_multiple_of(sample_interval);
        let t0 = if sample { mono_now_ns() } else { 0 };

        rec.start(MilestoneKind::DistanceCalculation);
        rec.end(MilestoneKind::DistanceCalculation);

        if sample {
            let t1 = mono_now_ns();
            let lat = t1.saturating_sub(t0);
            all_latencies.push(lat);
            window_latencies.push(lat);
        }

        if total.is_multiple_of(check_interval) {
            // Single-producer loop, quiescent here: the reset is safe and
            // keeps the ring off the drop path for the whole soak.
            rec.reset();

            let now = mono_now_ns();
            if now - window_start >= 1_000_000_000 {
                let elapsed = now - window_start;
                let tput = window_count as f64 / (elapsed as f64 / 1e9);

                let (wp50, wp99, wmax) = if !window_latencies.is_empty() {
                    let mut wl = std::mem::take(&mut window_latencies);
                    let ws = compute_stats(&mut wl);
                    (ws.p50, ws.p99, ws.max)
                } else {
                    (0, 0, 0)
                };

                windows.push(serde_json::json!({
                    "second": window_idx,
                    "pairs": window_count,
                    "elapsed_ns": elapsed,
                    "throughput_mps": tput / 1e6,
                    "latency_p50_ns": wp50,
                    "latency_p99_ns": wp99,
                    "latency_max_ns": wmax,
                }));
                println!(
                    "  Second {:<3}: {:>10} pairs  {:>8.2} M/s  p50={:>5} ns  p99={:>5} ns  max={:>7} ns",
                    window_idx,
                    format_count(window_count),
                    tput / 1e6,
                    wp50,
                    wp99,
                    wmax,
                );
                window_idx += 1;
                window_start = now;
                window_count = 0;
                window_latencies = Vec::with_capacity(50_000);
            }
            if now - start >= duration_ns {
                break;
            }
        }
    }

    let total_elapsed = mono_now_ns() - start;
    let overall_tput = total as f64 / (total_elapsed as f64 / 1e9);

    println!(
        "\n  Total: {} start/end pairs in {:.2}s ({:.2} M/s) | {} dropped",
        format_count(total),
        total_elapsed as f64 / 1e9,
        overall_tput / 1e6,
        rec.dropped_count(),
    );

    if !all_latencies.is_empty() {
        let stats = compute_stats(&mut all_latencies);
        println!(
            "  Aggregate pair latency: p50={} ns  p90={} ns  p99={} ns  p99.9={} ns  max={} ns",
            stats.p50, stats.p90, stats.p99, stats.p999, stats.max
        );

        // Throughput stability (CV%)
        if windows.len() >= 2 {
            let tputs: Vec<f64> = windows
                .iter()
                .filter_map(|w| w.get("throughput_mps").and_then(|v| v.as_f64()))
                .collect();
            if !tputs.is_empty() {
                let mean = tputs.iter().sum::<f64>() / tputs.len() as f64;
                let var = tputs.iter().map(|&t| (t - mean) * (t - mean)).sum::<f64>()
                    / tputs.len() as f64;
                let cv = if mean > 0.0 {
                    var.sqrt() / mean * 100.0
                } else {
                    0.0
                };
                println!("  Throughput CV: {cv:.2}%");
            }
        }

        *out_stats = Some(stats.clone());
        results.push(BenchResult {
            name: "soak_pair_latency".into(),
            unit: "ns".into(),
            stats,
        });
    }

    rec.unregister_thread();
}

// ═══════════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════════

fn section_resources(start: &ResourceSnapshot, end: &ResourceSnapshot) {
    section_header("RESOURCE USAGE");

    let delta_minor = end.minor_faults.saturating_sub(start.minor_faults);
    let delta_major = end.major_faults.saturating_sub(start.major_faults);
    let delta_vol = end.vol_ctx_switches.saturating_sub(start.vol_ctx_switches);
    let delta_invol = end
        .invol_ctx_switches
        .saturating_sub(start.invol_ctx_switches);
    let delta_user_us = end.user_time_us.saturating_sub(start.user_time_us);
    let delta_sys_us = end.sys_time_us.saturating_sub(start.sys_time_us);

    println!(
        "  Peak RSS:                    {}",
        format_bytes(end.max_rss_bytes as u64)
    );
    println!("  Minor page faults:           {}", delta_minor);
    println!("  Major page faults:           {}", delta_major);
    println!("  Voluntary ctx switches:      {}", delta_vol);
    println!("  Involuntary ctx switches:    {}", delta_invol);
    println!(
        "  User CPU time:               {:.3}s",
        delta_user_us as f64 / 1e6
    );
    println!(
        "  System CPU time:             {:.3}s",
        delta_sys_us as f64 / 1e6
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Save JSON — includes criterion data
// ═══════════════════════════════════════════════════════════════════════════

#[allow(clippy::too_many_arguments)]
fn save_results(
    results: &[BenchResult],
    cache: &CacheInfo,
    criterion_estimates: &BTreeMap<String, CriterionEstimate>,
    workload: &serde_json::Value,
    soak_stats: &Option<Stats>,
    soak_windows: &[serde_json::Value],
    rusage_start: &ResourceSnapshot,
    rusage_end: &ResourceSnapshot,
) {
    let timestamp = run_cmd("date", &["+%Y%m%d_%H%M%S"])
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into());

    let results_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/results");
    let _ = std::fs::create_dir_all(results_dir);
    let json_path = format!("{results_dir}/{timestamp}_report.json");

    let crit_json: Vec<&CriterionEstimate> = criterion_estimates.values().collect();

    let output = serde_json::json!({
        "report_type": "recorder",
        "timestamp": timestamp,
        "system": cache,
        "stage_benchmarks": results,
        "criterion_benchmarks": crit_json,
        "workload": workload,
        "soak": {
            "windows": soak_windows,
            "latency": soak_stats,
        },
        "resources": {
            "start": rusage_start,
            "end": rusage_end,
            "delta": {
                "minor_faults": rusage_end.minor_faults.saturating_sub(rusage_start.minor_faults),
                "major_faults": rusage_end.major_faults.saturating_sub(rusage_start.major_faults),
                "vol_ctx_switches": rusage_end.vol_ctx_switches.saturating_sub(rusage_start.vol_ctx_switches),
                "invol_ctx_switches": rusage_end.invol_ctx_switches.saturating_sub(rusage_start.invol_ctx_switches),
                "user_time_us": rusage_end.user_time_us.saturating_sub(rusage_start.user_time_us),
                "sys_time_us": rusage_end.sys_time_us.saturating_sub(rusage_start.sys_time_us),
            }
        },
    });

    let bar = "\u{2550}".repeat(90);
    match std::fs::write(&json_path, serde_json::to_string_pretty(&output).unwrap()) {
        Ok(()) => {
            println!("\n{bar}");
            println!("  Results saved to: {json_path}");
            println!("{bar}\n");
        }
        Err(e) => eprintln!("\n  [failed to save results: {e}]\n"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn run_cmd(cmd: &str, args: &[&str]) -> Option<String> {
    std::process::Command::new(cmd)
        .args(args)
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                String::from_utf8(o.stdout).ok()
            } else {
                None
            }
        })
}
