//! Emission side of the recorder: drained records go out here, as human
//! lines, CSV/TSV rows, or one JSON document, to stderr/stdout/a file.
//!
//! Nothing in this crate touches the recording hot path. Errors are plain
//! `io::Error`s propagated to the caller; the recorder decides whether to
//! warn or ignore.

pub mod format;
pub mod json;

pub use format::{CSV_HEADER, TSV_HEADER, format_bytes, format_duration, write_summary};

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use metron_clock::Timestamp;
use metron_config::{OutputFormat, RecorderConfig};
use metron_events::Record;
use metron_stats::Summary;

/// A wall-clock and a monotonic reading taken at the same instant.
///
/// Record timestamps are monotonic and only meaningful within a run; this
/// anchor lets the JSON emitter render them as absolute dates.
#[derive(Clone, Copy, Debug)]
pub struct RunMeta {
    pub wall_anchor: SystemTime,
    pub mono_anchor: Timestamp,
}

impl RunMeta {
    pub fn capture() -> RunMeta {
        RunMeta {
            wall_anchor: SystemTime::now(),
            mono_anchor: Timestamp::now(),
        }
    }

    /// Projects a monotonic stamp from this run onto the wall clock.
    pub fn wall_time_of(&self, ts: Timestamp) -> SystemTime {
        self.wall_anchor + Duration::from_nanos(ts.ns_since(self.mono_anchor))
    }
}

/// Where the configured stream points.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SinkTarget {
    #[default]
    Stderr,
    Stdout,
    File(PathBuf),
}

impl SinkTarget {
    /// Maps the config's `output_file` field: absent selects stderr, the
    /// conventional `-` selects stdout, anything else is a path.
    pub fn from_output_file(path: Option<&Path>) -> SinkTarget {
        match path {
            None => SinkTarget::Stderr,
            Some(p) if p.as_os_str() == "-" => SinkTarget::Stdout,
            Some(p) => SinkTarget::File(p.to_path_buf()),
        }
    }
}

enum Stream {
    Stderr,
    Stdout,
    File(BufWriter<File>),
}

impl Stream {
    /// Opens the stream for `target`. A file that cannot be created degrades
    /// to stderr so recording continues.
    fn open(target: &SinkTarget) -> Stream {
        match target {
            SinkTarget::Stderr => Stream::Stderr,
            SinkTarget::Stdout => Stream::Stdout,
            SinkTarget::File(path) => match File::create(path) {
                Ok(f) => Stream::File(BufWriter::new(f)),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        %err,
                        "cannot open output file, writing to stderr instead"
                    );
                    Stream::Stderr
                }
            },
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Stderr => io::stderr().write(buf),
            Stream::Stdout => io::stdout().write(buf),
            Stream::File(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Stderr => io::stderr().flush(),
            Stream::Stdout => io::stdout().flush(),
            Stream::File(f) => f.flush(),
        }
    }
}

/// The configured output stream plus its format.
pub struct Sink {
    format: OutputFormat,
    target: SinkTarget,
    stream: Stream,
}

impl Sink {
    pub fn new(format: OutputFormat, target: SinkTarget) -> Sink {
        let stream = Stream::open(&target);
        Sink {
            format,
            target,
            stream,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    /// Re-points the stream, truncating an existing file at the new target.
    pub fn set_target(&mut self, target: SinkTarget) {
        self.stream = Stream::open(&target);
        self.target = target;
    }

    /// Writes every record in the configured format, then flushes.
    ///
    /// The caller hands the whole drained range each time; this mirrors the
    /// drain contract where flush re-emits from the start of the buffer.
    /// JSON mode ignores per-row emission and writes the full document.
    pub fn flush(
        &mut self,
        records: &[Record],
        meta: &RunMeta,
        summary: &Summary,
        config: &RecorderConfig,
    ) -> io::Result<()> {
        match self.format {
            OutputFormat::Human => {
                for r in records {
                    format::write_human_line(&mut self.stream, r)?;
                }
            }
            OutputFormat::Csv => {
                for r in records {
                    format::write_csv_row(&mut self.stream, r)?;
                }
            }
            OutputFormat::Tsv => {
                for r in records {
                    format::write_tsv_row(&mut self.stream, r)?;
                }
            }
            OutputFormat::Json => {
                let doc = json::build_document(records, meta, summary, config);
                serde_json::to_writer_pretty(&mut self.stream, &doc)?;
                self.stream.write_all(b"\n")?;
            }
        }
        self.stream.flush()
    }
}

/// Writes header plus every record as CSV to `path`.
///
/// Uses its own file handle; the configured sink is not involved, so a
/// failure here never disturbs ongoing recording.
pub fn export_csv(path: &Path, records: &[Record]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{CSV_HEADER}")?;
    for r in records {
        format::write_csv_row(&mut w, r)?;
    }
    w.flush()
}

/// Writes the full JSON document to `path` on an independent handle.
pub fn export_json(
    path: &Path,
    records: &[Record],
    meta: &RunMeta,
    summary: &Summary,
    config: &RecorderConfig,
) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    let doc = json::build_document(records, meta, summary, config);
    serde_json::to_writer_pretty(&mut w, &doc)?;
    w.write_all(b"\n")?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_events::{Label, MilestoneKind};
    use metron_stats::{CounterSnapshot, summarize};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("metron_sink_{}_{name}", std::process::id()))
    }

    fn two_records() -> Vec<Record> {
        let mut a = Record {
            kind: MilestoneKind::User1,
            timestamp: Timestamp {
                secs: 10,
                nanos: 0,
                cycles: 0,
            },
            duration_ms: 1.25,
            label: Label::new("d"),
            ..Record::default()
        };
        a.memory.rss_kb = 100;
        let b = Record {
            kind: MilestoneKind::User1,
            timestamp: Timestamp {
                secs: 11,
                nanos: 500,
                cycles: 0,
            },
            duration_ms: 2.5,
            label: Label::new("d"),
            ..Record::default()
        };
        vec![a, b]
    }

    #[test]
    fn wall_time_projection() {
        let meta = RunMeta::capture();
        let later = Timestamp {
            secs: meta.mono_anchor.secs + 1,
            nanos: meta.mono_anchor.nanos,
            cycles: 0,
        };
        let wall = meta.wall_time_of(later);
        assert_eq!(
            wall.duration_since(meta.wall_anchor).unwrap(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn target_mapping() {
        assert_eq!(SinkTarget::from_output_file(None), SinkTarget::Stderr);
        assert_eq!(
            SinkTarget::from_output_file(Some(Path::new("-"))),
            SinkTarget::Stdout
        );
        assert_eq!(
            SinkTarget::from_output_file(Some(Path::new("/tmp/x.csv"))),
            SinkTarget::File(PathBuf::from("/tmp/x.csv"))
        );
    }

    #[test]
    fn csv_flush_to_file() {
        let path = temp_path("flush.csv");
        let records = two_records();
        let meta = RunMeta::capture();
        let summary = summarize(&records, CounterSnapshot::default(), 0, 0.0);

        let mut sink = Sink::new(OutputFormat::Csv, SinkTarget::File(path.clone()));
        sink.flush(&records, &meta, &summary, &RecorderConfig::default())
            .unwrap();
        drop(sink);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("10.000000000,USER_1,1.250,100,"));
        assert!(lines[1].starts_with("11.000000500,USER_1,2.500,0,"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unopenable_target_degrades_to_stderr() {
        let bad = PathBuf::from("/nonexistent-metron-dir/out.log");
        let mut sink = Sink::new(OutputFormat::Human, SinkTarget::File(bad));
        let meta = RunMeta::capture();
        let summary = Summary::default();
        // Still writable; nothing panics and no error surfaces.
        sink.flush(&[], &meta, &summary, &RecorderConfig::default())
            .unwrap();
    }

    #[test]
    fn export_csv_writes_header_and_rows() {
        let path = temp_path("export.csv");
        let records = two_records();
        export_csv(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains(",USER_1,1.250,"));
        assert!(lines[2].contains(",USER_1,2.500,"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn export_csv_open_failure_is_reported() {
        let bad = Path::new("/nonexistent-metron-dir/out.csv");
        assert!(export_csv(bad, &[]).is_err());
    }

    #[test]
    fn export_json_document_parses() {
        let path = temp_path("export.json");
        let records = two_records();
        let meta = RunMeta::capture();
        let summary = summarize(&records, CounterSnapshot::default(), 0, 50.0);
        export_json(&path, &records, &meta, &summary, &RecorderConfig::default()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            doc["performance_log"]["milestones"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(doc["performance_log"]["summary"]["total_runtime_ms"], 50.0);
        let _ = std::fs::remove_file(&path);
    }
}
