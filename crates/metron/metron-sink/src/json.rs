//! Assembly of the structured JSON document.
//!
//! One top-level `performance_log` object: run metadata, every drained
//! record as a milestone object with nested `memory` / `cpu` / `threading`
//! / `algorithm` groups, and the whole-run summary. Record times are
//! rendered as ISO-8601 dates against the run's wall-clock anchor.

use std::time::Duration;

use metron_clock::Timestamp;
use metron_config::RecorderConfig;
use metron_events::Record;
use metron_stats::Summary;
use serde_json::{Map, Value, json};

use crate::RunMeta;

pub fn build_document(
    records: &[Record],
    meta: &RunMeta,
    summary: &Summary,
    config: &RecorderConfig,
) -> Value {
    let milestones: Vec<Value> = records.iter().map(|r| milestone_object(r, meta)).collect();
    let ended = meta.wall_anchor
        + Duration::try_from_secs_f64(summary.total_runtime_ms / 1000.0).unwrap_or_default();
    json!({
        "performance_log": {
            "metadata": {
                "version": env!("CARGO_PKG_VERSION"),
                "pid": std::process::id(),
                "started": iso8601(meta, meta.mono_anchor),
                "ended": rfc3339(ended),
                "total_runtime_ms": summary.total_runtime_ms,
                "records": summary.records,
                "dropped": summary.dropped,
                "config": serde_json::to_value(config).unwrap_or(Value::Null),
            },
            "milestones": milestones,
            "summary": summary_object(summary),
        }
    })
}

fn milestone_object(r: &Record, meta: &RunMeta) -> Value {
    json!({
        "timestamp": iso8601(meta, r.timestamp),
        "milestone": r.kind.name(),
        "duration_ms": r.duration_ms,
        "memory": {
            "rss_kb": r.memory.rss_kb,
            "virt_kb": r.memory.virt_kb,
            "peak_rss_kb": r.memory.peak_rss_kb,
            "heap_allocated": r.memory.heap_allocated,
            "heap_freed": r.memory.heap_freed,
            "allocation_count": r.memory.allocation_count,
            "free_count": r.memory.free_count,
        },
        "cpu": {
            "cpu_percent": r.cpu.cpu_percent,
            "user_time": r.cpu.user_time,
            "system_time": r.cpu.system_time,
            "context_switches": r.cpu.context_switches,
            "cache_misses": r.cpu.cache_misses,
        },
        "threading": {
            "thread_count": r.thread_count,
        },
        "algorithm": {
            "iteration": r.iteration,
            "convergence": r.convergence,
        },
        "label": r.label.as_str(),
        "context": r.context.as_str(),
    })
}

fn summary_object(s: &Summary) -> Value {
    let mut per = Map::new();
    for (kind, stats) in &s.per_milestone {
        per.insert(
            kind.name().to_string(),
            json!({
                "samples": stats.samples,
                "min_ms": stats.min_ms,
                "max_ms": stats.max_ms,
                "mean_ms": stats.mean_ms,
                "stddev_ms": stats.stddev_ms,
                "median_ms": stats.median_ms,
                "p95_ms": stats.p95_ms,
                "p99_ms": stats.p99_ms,
            }),
        );
    }
    json!({
        "total_runtime_ms": s.total_runtime_ms,
        "peak_memory_kb": s.peak_memory_kb,
        "avg_cpu_percent": s.avg_cpu_percent,
        "max_threads": s.max_threads,
        "total_allocations": s.total_allocations,
        "total_bytes_allocated": s.total_bytes_allocated,
        "milestones": Value::Object(per),
    })
}

fn iso8601(meta: &RunMeta, ts: Timestamp) -> String {
    rfc3339(meta.wall_time_of(ts))
}

fn rfc3339(t: std::time::SystemTime) -> String {
    chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_events::{Label, MilestoneKind};
    use metron_stats::{CounterSnapshot, summarize};

    fn sample_records(meta: &RunMeta) -> Vec<Record> {
        let mut a = Record {
            kind: MilestoneKind::ClusteringIteration,
            timestamp: meta.mono_anchor,
            duration_ms: 3.5,
            iteration: 2,
            convergence: 0.25,
            label: Label::new("iteration_2"),
            context: Label::new("convergence=0.250000"),
            ..Record::default()
        };
        a.memory.rss_kb = 1024;
        let b = Record {
            kind: MilestoneKind::User1,
            timestamp: meta.mono_anchor,
            duration_ms: 42.0,
            label: Label::new("cache_hits"),
            ..Record::default()
        };
        vec![a, b]
    }

    #[test]
    fn document_shape() {
        let meta = RunMeta::capture();
        let records = sample_records(&meta);
        let summary = summarize(&records, CounterSnapshot::default(), 0, 100.0);
        let doc = build_document(&records, &meta, &summary, &RecorderConfig::default());

        let log = &doc["performance_log"];
        assert!(log["metadata"]["pid"].as_u64().is_some());
        assert_eq!(log["metadata"]["records"], 2);
        assert_eq!(log["metadata"]["total_runtime_ms"], 100.0);
        assert_eq!(log["metadata"]["config"]["enabled"], true);
        assert_eq!(log["metadata"]["config"]["output_format"], "human");

        let milestones = log["milestones"].as_array().unwrap();
        assert_eq!(milestones.len(), 2);
        assert_eq!(milestones[0]["milestone"], "CLUSTERING_ITERATION");
        assert_eq!(milestones[0]["algorithm"]["iteration"], 2);
        assert_eq!(milestones[0]["algorithm"]["convergence"], 0.25);
        assert_eq!(milestones[0]["memory"]["rss_kb"], 1024);
        assert_eq!(milestones[0]["label"], "iteration_2");
        assert_eq!(milestones[1]["milestone"], "USER_1");
        assert_eq!(milestones[1]["duration_ms"], 42.0);

        let per = log["summary"]["milestones"].as_object().unwrap();
        assert!(per.contains_key("CLUSTERING_ITERATION"));
        assert!(per.contains_key("USER_1"));
        assert_eq!(per["USER_1"]["samples"], 1);
    }

    #[test]
    fn timestamps_parse_as_rfc3339() {
        let meta = RunMeta::capture();
        let records = sample_records(&meta);
        let summary = summarize(&records, CounterSnapshot::default(), 0, 0.0);
        let doc = build_document(&records, &meta, &summary, &RecorderConfig::default());

        let meta_obj = &doc["performance_log"]["metadata"];
        for key in ["started", "ended"] {
            let stamp = meta_obj[key].as_str().unwrap();
            assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{key}");
        }
        let ts = doc["performance_log"]["milestones"][0]["timestamp"]
            .as_str()
            .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
