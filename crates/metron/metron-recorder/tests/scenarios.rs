//! End-to-end scenarios driven through the public facade.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use metron_recorder::{
    CpuProbe, CpuSnapshot, MAX_LABEL_LEN, MemoryProbe, MemoryReading, MilestoneKind, Recorder,
    RecorderConfig,
};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("metron_scenarios_{}_{name}", std::process::id()))
}

#[test]
fn timed_milestone_measures_a_sleep() {
    let rec = Recorder::new(RecorderConfig::default());
    rec.start(MilestoneKind::ClusteringStart);
    thread::sleep(Duration::from_millis(5));
    rec.end(MilestoneKind::ClusteringStart);

    let records = rec.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, MilestoneKind::ClusteringStart);
    let d = records[0].duration_ms;
    assert!((4.0..100.0).contains(&d), "slept 5 ms, measured {d} ms");
}

#[test]
fn eight_threads_hammer_one_milestone_without_tearing() {
    let rec = Arc::new(Recorder::new(RecorderConfig::default()));
    let barrier = Arc::new(Barrier::new(8));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let rec = Arc::clone(&rec);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            assert!(rec.register_thread() >= 0);
            barrier.wait();
            for _ in 0..1000 {
                rec.start(MilestoneKind::DistanceCalculation);
                rec.end(MilestoneKind::DistanceCalculation);
            }
            rec.unregister_thread();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // Interleaved start/end on one shared kind may cancel each other, so
    // the count is bounded, not exact.
    let records = rec.records();
    assert!(records.len() <= 8000);
    assert_eq!(rec.dropped_count(), 0);
    for r in &records {
        assert_eq!(r.kind, MilestoneKind::DistanceCalculation);
        assert!(r.duration_ms >= 0.0);
        assert!(r.label.as_str().is_ascii());
    }
    assert!(rec.summary().max_threads >= 8);
}

#[test]
fn events_round_trip_through_csv_export() {
    let rec = Recorder::new(RecorderConfig::default());
    rec.event("distance_batch", 1.25);
    rec.event("distance_batch", 2.5);

    let path = temp_path("events.csv");
    rec.export_csv(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("timestamp,milestone,duration_ms,"));
    assert!(lines[1].contains(",USER_1,1.250,"));
    assert!(lines[2].contains(",USER_1,2.500,"));
    assert!(lines[1].ends_with(",distance_batch,"));
}

#[test]
fn disabled_recorder_is_inert() {
    let rec = Recorder::new(RecorderConfig::disabled());
    for _ in 0..10_000 {
        rec.start(MilestoneKind::DistanceCalculation);
        rec.end(MilestoneKind::DistanceCalculation);
    }
    rec.event("ignored", 1.0);
    rec.iteration(1, 0.5);
    assert_eq!(rec.record_count(), 0);
    assert_eq!(rec.dropped_count(), 0);
    assert_eq!(rec.register_thread(), -1);
}

#[test]
fn iteration_records_carry_convergence() {
    let rec = Recorder::new(RecorderConfig::default());
    rec.iteration(3, 0.42);

    let r = rec.records()[0];
    assert_eq!(r.kind, MilestoneKind::ClusteringIteration);
    assert_eq!(r.iteration, 3);
    assert_eq!(r.convergence, 0.42);
    assert_eq!(r.duration_ms, 0.0);
    assert_eq!(r.label.as_str(), "iteration_3");
    assert_eq!(r.context.as_str(), "convergence=0.420000");
}

#[test]
fn worker_registration_lifecycle() {
    let rec = Arc::new(Recorder::new(RecorderConfig::default()));
    let before = rec.thread_count();

    let worker = {
        let rec = Arc::clone(&rec);
        thread::spawn(move || {
            let idx = rec.register_thread();
            assert!(idx >= 0);
            assert_eq!(rec.register_thread(), idx);
            for _ in 0..100 {
                rec.start(MilestoneKind::TreeNodeCreation);
                rec.end(MilestoneKind::TreeNodeCreation);
            }
            rec.unregister_thread();
            idx
        })
    };
    let idx = worker.join().unwrap();

    let info = rec.thread_info(idx as u32).unwrap();
    assert!(info.ended.as_ns() >= info.started.as_ns());
    assert_eq!(info.ops, 100);
    assert_eq!(rec.thread_count(), before);
    assert_eq!(rec.registered_threads(), 1);
}

#[test]
fn full_buffer_counts_drops_instead_of_blocking() {
    let rec = Recorder::with_capacity(RecorderConfig::default(), 64);
    for i in 0..164 {
        rec.event("spin", f64::from(i));
    }
    assert_eq!(rec.record_count(), 64);
    assert_eq!(rec.dropped_count(), 100);

    let summary = rec.summary();
    assert_eq!(summary.records, 64);
    assert_eq!(summary.dropped, 100);
}

#[test]
fn oversized_labels_truncate_silently() {
    let rec = Recorder::new(RecorderConfig::default());
    let long = "x".repeat(500);
    rec.event(&long, 1.0);
    rec.event_with_context("short", 2.0, &long);

    let records = rec.records();
    assert_eq!(records[0].label.as_str().len(), MAX_LABEL_LEN - 1);
    assert_eq!(records[1].context.as_str().len(), MAX_LABEL_LEN - 1);
}

#[test]
fn scope_guard_closes_on_panic() {
    let rec = Recorder::new(RecorderConfig::default());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _guard = rec.scope(MilestoneKind::Wfa2Execution);
        panic!("alignment failed");
    }));
    assert!(outcome.is_err());

    let records = rec.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, MilestoneKind::Wfa2Execution);
}

#[test]
fn labeled_scope_tags_the_record() {
    let rec = Recorder::new(RecorderConfig::default());
    {
        let _guard = rec.scope_labeled(MilestoneKind::KalignExecution, "chunk_12");
    }
    assert_eq!(rec.records()[0].label.as_str(), "chunk_12");
}

struct FixedMemory;

impl MemoryProbe for FixedMemory {
    fn probe(&mut self) -> MemoryReading {
        MemoryReading {
            rss_kb: 4096,
            virt_kb: 8192,
            peak_rss_kb: 6144,
        }
    }
}

struct FixedCpu;

impl CpuProbe for FixedCpu {
    fn probe(&mut self) -> CpuSnapshot {
        CpuSnapshot {
            cpu_percent: 50.0,
            user_time: 1.0,
            system_time: 0.5,
            context_switches: 7,
            cache_misses: 0,
        }
    }
}

#[test]
fn injected_probes_feed_milestone_records() {
    let rec = Recorder::with_probes(
        RecorderConfig::default(),
        Box::new(FixedMemory),
        Box::new(FixedCpu),
    );
    rec.track_allocation(1000);
    rec.start(MilestoneKind::AlignmentStart);
    rec.end(MilestoneKind::AlignmentStart);

    let r = rec.records()[0];
    assert_eq!(r.memory.rss_kb, 4096);
    assert_eq!(r.memory.virt_kb, 8192);
    assert_eq!(r.memory.peak_rss_kb, 6144);
    assert_eq!(r.memory.heap_allocated, 1000);
    assert_eq!(r.memory.allocation_count, 1);
    assert_eq!(r.cpu.cpu_percent, 50.0);
    assert_eq!(r.cpu.context_switches, 7);

    let summary = rec.summary();
    assert_eq!(summary.peak_memory_kb, 6144);
    assert_eq!(summary.avg_cpu_percent, 50.0);
}

#[test]
fn json_export_is_a_complete_document() {
    let rec = Recorder::new(RecorderConfig::default());
    rec.start(MilestoneKind::ClusteringStart);
    rec.end(MilestoneKind::ClusteringStart);
    rec.iteration(1, 0.9);

    let path = temp_path("run.json");
    rec.export_json(&path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let log = &doc["performance_log"];
    assert_eq!(log["metadata"]["records"], 2);
    assert_eq!(log["metadata"]["config"]["enabled"], true);
    assert_eq!(log["milestones"].as_array().unwrap().len(), 2);
    assert_eq!(log["milestones"][1]["algorithm"]["iteration"], 1);
    let per = log["summary"]["milestones"].as_object().unwrap();
    assert_eq!(per["CLUSTERING_START"]["samples"], 1);
}

#[test]
fn per_milestone_stats_come_from_the_buffer() {
    let rec = Recorder::new(RecorderConfig::default());
    for _ in 0..5 {
        rec.start(MilestoneKind::NeedlemanWunsch);
        rec.end(MilestoneKind::NeedlemanWunsch);
    }
    rec.event("noise", 9.0);

    let stats = rec.milestone_stats(MilestoneKind::NeedlemanWunsch);
    assert_eq!(stats.samples, 5);
    assert!(stats.min_ms <= stats.median_ms && stats.median_ms <= stats.max_ms);

    let absent = rec.milestone_stats(MilestoneKind::TaxonomyLoad);
    assert_eq!(absent.samples, 0);
    assert_eq!(absent.mean_ms, 0.0);
}

#[test]
fn thread_registration_is_gated_by_tracking_flag() {
    let rec = Recorder::new(RecorderConfig {
        track_threads: false,
        ..RecorderConfig::default()
    });
    assert_eq!(rec.register_thread(), -1);
    assert_eq!(rec.thread_count(), 0);

    rec.set_tracking(true, true, true);
    let observed = Arc::new(AtomicI32::new(-1));
    let rec = Arc::new(rec);
    {
        let rec = Arc::clone(&rec);
        let observed = Arc::clone(&observed);
        thread::spawn(move || {
            observed.store(rec.register_thread_in_pool(4), Ordering::SeqCst);
            rec.unregister_thread();
        })
        .join()
        .unwrap();
    }
    let idx = observed.load(Ordering::SeqCst);
    assert!(idx >= 0);
    assert_eq!(rec.thread_info(idx as u32).unwrap().pool_id, 4);
}
