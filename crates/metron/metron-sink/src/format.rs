//! Line-oriented formats: CSV and TSV rows, the human-readable log line,
//! the summary block, and the display helpers they share.
//!
//! Row layouts are load-bearing; downstream tooling parses these columns.
//! Label and context are written unquoted, so callers keep commas and
//! newlines out of them (truncation to 63 bytes bounds the damage).

use std::io::{self, Write};

use metron_events::Record;
use metron_stats::Summary;

pub const CSV_HEADER: &str = "timestamp,milestone,duration_ms,memory_rss_kb,memory_virt_kb,\
thread_count,iteration,convergence_metric,cpu_percent,label,context";

pub const TSV_HEADER: &str = "timestamp\tmilestone\tduration_ms\tmemory_rss_kb\tmemory_virt_kb\t\
thread_count\titeration\tconvergence_metric\tcpu_percent\tlabel\tcontext";

pub fn write_csv_row<W: Write>(w: &mut W, r: &Record) -> io::Result<()> {
    writeln!(
        w,
        "{}.{:09},{},{:.3},{},{},{},{},{:.6},{:.2},{},{}",
        r.timestamp.secs,
        r.timestamp.nanos,
        r.kind.name(),
        r.duration_ms,
        r.memory.rss_kb,
        r.memory.virt_kb,
        r.thread_count,
        r.iteration,
        r.convergence,
        r.cpu.cpu_percent,
        r.label,
        r.context,
    )
}

pub fn write_tsv_row<W: Write>(w: &mut W, r: &Record) -> io::Result<()> {
    writeln!(
        w,
        "{}.{:09}\t{}\t{:.3}\t{}\t{}\t{}\t{}\t{:.6}\t{:.2}\t{}\t{}",
        r.timestamp.secs,
        r.timestamp.nanos,
        r.kind.name(),
        r.duration_ms,
        r.memory.rss_kb,
        r.memory.virt_kb,
        r.thread_count,
        r.iteration,
        r.convergence,
        r.cpu.cpu_percent,
        r.label,
        r.context,
    )
}

pub fn write_human_line<W: Write>(w: &mut W, r: &Record) -> io::Result<()> {
    writeln!(
        w,
        "[{}.{:09}] {}: {:.3} ms, RSS: {} KB, Threads: {}, {}",
        r.timestamp.secs,
        r.timestamp.nanos,
        r.kind.name(),
        r.duration_ms,
        r.memory.rss_kb,
        r.thread_count,
        r.label,
    )
}

/// The end-of-run block printed by the demo and the report binary.
pub fn write_summary<W: Write>(w: &mut W, s: &Summary) -> io::Result<()> {
    writeln!(w, "\n=== Performance Summary ===")?;
    writeln!(w, "Total Runtime: {}", format_duration(s.total_runtime_ms))?;
    writeln!(
        w,
        "Peak Memory Usage: {}",
        format_bytes(s.peak_memory_kb * 1024)
    )?;
    if s.avg_cpu_percent > 0.0 {
        writeln!(w, "Avg CPU: {:.1}%", s.avg_cpu_percent)?;
    }
    writeln!(w, "Max Threads Used: {}", s.max_threads)?;
    writeln!(w, "Total Log Entries: {} ({} dropped)", s.records, s.dropped)?;
    writeln!(w, "Total Allocations: {}", s.total_allocations)?;
    writeln!(
        w,
        "Total Bytes Allocated: {}",
        format_bytes(s.total_bytes_allocated)
    )?;
    writeln!(w, "===========================")
}

/// Scaled duration for display: sub-millisecond through minutes.
pub fn format_duration(ms: f64) -> String {
    if ms < 1.0 {
        format!("{ms:.3} ms")
    } else if ms < 1000.0 {
        format!("{ms:.1} ms")
    } else if ms < 60_000.0 {
        format!("{:.2} s", ms / 1000.0)
    } else {
        format!("{:.1} min", ms / 60_000.0)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_clock::Timestamp;
    use metron_events::{Label, MilestoneKind};

    fn sample_record() -> Record {
        let mut r = Record {
            kind: MilestoneKind::DistanceMatrixStart,
            timestamp: Timestamp {
                secs: 1,
                nanos: 5,
                cycles: 0,
            },
            duration_ms: 1.25,
            thread_count: 4,
            iteration: 0,
            convergence: 0.0,
            label: Label::new("phase"),
            context: Label::new("note"),
            ..Record::default()
        };
        r.memory.rss_kb = 2048;
        r.memory.virt_kb = 4096;
        r.cpu.cpu_percent = 12.339;
        r
    }

    #[test]
    fn csv_row_is_exact() {
        let mut buf = Vec::new();
        write_csv_row(&mut buf, &sample_record()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "1.000000005,DISTANCE_MATRIX_START,1.250,2048,4096,4,0,0.000000,12.34,phase,note\n"
        );
    }

    #[test]
    fn tsv_row_is_csv_with_tabs() {
        let mut buf = Vec::new();
        write_tsv_row(&mut buf, &sample_record()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "1.000000005\tDISTANCE_MATRIX_START\t1.250\t2048\t4096\t4\t0\t0.000000\t12.34\tphase\tnote\n"
        );
    }

    #[test]
    fn human_line_is_exact() {
        let mut buf = Vec::new();
        write_human_line(&mut buf, &sample_record()).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "[1.000000005] DISTANCE_MATRIX_START: 1.250 ms, RSS: 2048 KB, Threads: 4, phase\n"
        );
    }

    #[test]
    fn header_columns_match_between_formats() {
        assert_eq!(CSV_HEADER.split(',').count(), 11);
        assert_eq!(
            CSV_HEADER.split(',').collect::<Vec<_>>(),
            TSV_HEADER.split('\t').collect::<Vec<_>>()
        );
    }

    #[test]
    fn duration_scaling_thresholds() {
        assert_eq!(format_duration(0.5), "0.500 ms");
        assert_eq!(format_duration(1.5), "1.5 ms");
        assert_eq!(format_duration(999.94), "999.9 ms");
        assert_eq!(format_duration(1500.0), "1.50 s");
        assert_eq!(format_duration(90_000.0), "1.5 min");
    }

    #[test]
    fn byte_scaling_thresholds() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.0 GB");
    }

    #[test]
    fn summary_block_mentions_totals() {
        let s = Summary {
            total_runtime_ms: 1750.0,
            peak_memory_kb: 2048,
            max_threads: 8,
            records: 12,
            total_allocations: 3,
            total_bytes_allocated: 4096,
            ..Summary::default()
        };
        let mut buf = Vec::new();
        write_summary(&mut buf, &s).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Total Runtime: 1.75 s"));
        assert!(text.contains("Peak Memory Usage: 2.0 MB"));
        assert!(text.contains("Max Threads Used: 8"));
        assert!(text.contains("Total Log Entries: 12 (0 dropped)"));
        assert!(text.contains("Total Bytes Allocated: 4.0 KB"));
    }
}
