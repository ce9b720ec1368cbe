//! The recording facade.
//!
//! One [`Recorder`] owns every moving part: the monotonic anchor, the
//! hot-path gates, the milestone table, the bounded record ring, the
//! counters, the thread registry, the OS probes, and the configured sink.
//! All recording operations are infallible and cheap no-ops while
//! disabled; errors exist only at the edges (config load, export file
//! open).
//!
//! Hosts either hold the handle themselves or install one process-global
//! instance via [`init`] / [`global`] / [`shutdown`].

mod guard;
pub mod global;

pub use global::{global, init, shutdown};
pub use guard::MilestoneGuard;

pub use metron_config::{
    ConfigError, DEFAULT_SAMPLING_INTERVAL_US, Granularity, LogLevel, MAX_FILENAME_LEN,
    OutputFormat, RecorderConfig,
};
pub use metron_core::MAX_THREADS;
pub use metron_events::{
    CpuSnapshot, Label, MAX_LABEL_LEN, MemorySnapshot, MilestoneKind, Record, ThreadInfo,
};
pub use metron_probes::{CpuProbe, MemoryProbe, MemoryReading};
pub use metron_ring::MAX_LOG_ENTRIES;
pub use metron_sink::{RunMeta, SinkTarget, format_bytes, format_duration, write_summary};
pub use metron_stats::{MilestoneStats, Summary};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use metron_clock::Timestamp;
use metron_core::{CounterBackend, Counters, MilestoneTable, ThreadRegistry};
use metron_probes::{default_cpu_probe, default_memory_probe};
use metron_ring::RecordRing;
use metron_sink::Sink;

/// Process-embedded performance recorder.
///
/// Shared by reference from arbitrarily many host threads. The recording
/// operations never block on each other: gates are relaxed atomics, the
/// ring reserves slots with one fetch-add, and the probes degrade to
/// zeroed fields when contended instead of waiting.
pub struct Recorder {
    // Gate mirrors of the config's primitive fields. Readers tolerate a
    // delayed value during reconfiguration, never a torn one.
    enabled: AtomicBool,
    track_memory: AtomicBool,
    track_cpu: AtomicBool,
    track_threads: AtomicBool,
    flush_immediately: AtomicBool,
    granularity: AtomicU8,

    config: Mutex<RecorderConfig>,
    ring: RecordRing<Record>,
    milestones: MilestoneTable,
    counters: Counters,
    registry: ThreadRegistry,
    memory_probe: Mutex<Box<dyn MemoryProbe>>,
    cpu_probe: Mutex<Box<dyn CpuProbe>>,
    sink: Mutex<Sink>,
    meta: Mutex<RunMeta>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Recorder {
        Self::build(
            config,
            RecordRing::new(),
            default_memory_probe(),
            default_cpu_probe(),
        )
    }

    /// Ring capacity override for embedders with tighter memory budgets.
    pub fn with_capacity(config: RecorderConfig, capacity: usize) -> Recorder {
        Self::build(
            config,
            RecordRing::with_capacity(capacity),
            default_memory_probe(),
            default_cpu_probe(),
        )
    }

    /// Probe injection, for tests and platforms the defaults do not cover.
    pub fn with_probes(
        config: RecorderConfig,
        memory_probe: Box<dyn MemoryProbe>,
        cpu_probe: Box<dyn CpuProbe>,
    ) -> Recorder {
        Self::build(config, RecordRing::new(), memory_probe, cpu_probe)
    }

    fn build(
        config: RecorderConfig,
        ring: RecordRing<Record>,
        memory_probe: Box<dyn MemoryProbe>,
        cpu_probe: Box<dyn CpuProbe>,
    ) -> Recorder {
        let backend = if cfg!(target_has_atomic = "64") {
            CounterBackend::Atomic
        } else {
            CounterBackend::Locked
        };
        let sink = Sink::new(
            config.output_format,
            SinkTarget::from_output_file(config.output_file.as_deref()),
        );
        Recorder {
            enabled: AtomicBool::new(config.enabled),
            track_memory: AtomicBool::new(config.track_memory),
            track_cpu: AtomicBool::new(config.track_cpu),
            track_threads: AtomicBool::new(config.track_threads),
            flush_immediately: AtomicBool::new(config.flush_immediately),
            granularity: AtomicU8::new(config.granularity as u8),
            config: Mutex::new(config),
            ring,
            milestones: MilestoneTable::new(),
            counters: Counters::new(backend),
            registry: ThreadRegistry::new(),
            memory_probe: Mutex::new(memory_probe),
            cpu_probe: Mutex::new(cpu_probe),
            sink: Mutex::new(sink),
            meta: Mutex::new(RunMeta::capture()),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    // ─── Timed milestones ───────────────────────────────────────────────────

    /// Opens an interval for `kind`. Nothing is recorded until the matching
    /// [`end`](Self::end); a second `start` before that replaces the start
    /// time (last-writer-wins).
    pub fn start(&self, kind: MilestoneKind) {
        if !self.is_enabled() {
            return;
        }
        self.milestones.begin(kind, Timestamp::now());
    }

    /// [`start`](Self::start) with a label accepted for call-site symmetry.
    /// The emitted record carries the label passed to `end_labeled`; the
    /// start side stores only the timestamp.
    pub fn start_labeled(&self, kind: MilestoneKind, _label: &str) {
        self.start(kind);
    }

    pub fn end(&self, kind: MilestoneKind) {
        self.end_labeled(kind, "");
    }

    /// Closes the open interval for `kind` and publishes one record with
    /// the elapsed duration and, when tracking is on, memory/CPU snapshots.
    /// A no-op when no interval is open.
    pub fn end_labeled(&self, kind: MilestoneKind, label: &str) {
        if !self.is_enabled() {
            return;
        }
        let Some(start) = self.milestones.finish(kind) else {
            return;
        };
        let end = Timestamp::now();
        let mut record = Record {
            kind,
            timestamp: end,
            duration_ms: end.ms_since(start),
            thread_count: self.thread_count(),
            label: Label::new(label),
            ..Record::default()
        };
        self.capture_probes(&mut record);
        self.publish(record);
    }

    /// [`start`](Self::start) gated on the configured granularity: a no-op
    /// below `level`.
    pub fn start_at(&self, kind: MilestoneKind, level: Granularity) {
        if self.granularity_allows(level) {
            self.start(kind);
        }
    }

    pub fn end_at(&self, kind: MilestoneKind, level: Granularity) {
        if self.granularity_allows(level) {
            self.end(kind);
        }
    }

    /// Opens `kind` and returns a guard that closes it when dropped, every
    /// exit path included.
    pub fn scope(&self, kind: MilestoneKind) -> MilestoneGuard<'_> {
        self.start(kind);
        MilestoneGuard::new(self, kind, Label::EMPTY, true)
    }

    pub fn scope_labeled(&self, kind: MilestoneKind, label: &str) -> MilestoneGuard<'_> {
        self.start(kind);
        MilestoneGuard::new(self, kind, Label::new(label), true)
    }

    /// Granularity-gated [`scope`](Self::scope): below `level` the returned
    /// guard is inert.
    pub fn scope_at(&self, kind: MilestoneKind, level: Granularity) -> MilestoneGuard<'_> {
        let armed = self.granularity_allows(level);
        if armed {
            self.start(kind);
        }
        MilestoneGuard::new(self, kind, Label::EMPTY, armed)
    }

    fn granularity_allows(&self, level: Granularity) -> bool {
        level as u8 <= self.granularity.load(Ordering::Relaxed)
    }

    // ─── Events ─────────────────────────────────────────────────────────────

    /// Publishes a free-form event as a `USER_1` record with `value` stored
    /// in the duration field. Events skip probe capture; they are meant to
    /// be cheap enough for inner loops.
    pub fn event(&self, label: &str, value: f64) {
        self.event_with_context(label, value, "");
    }

    pub fn event_with_context(&self, label: &str, value: f64, context: &str) {
        if !self.is_enabled() {
            return;
        }
        self.publish_event(Label::new(label), value, Label::new(context));
    }

    /// Publishes one clustering-iteration record carrying the index and
    /// convergence metric, labelled `iteration_<index>`.
    pub fn iteration(&self, index: u64, convergence: f64) {
        if !self.is_enabled() {
            return;
        }
        let record = Record {
            kind: MilestoneKind::ClusteringIteration,
            timestamp: Timestamp::now(),
            thread_count: self.thread_count(),
            iteration: index,
            convergence,
            label: Label::format(format_args!("iteration_{index}")),
            context: Label::format(format_args!("convergence={convergence:.6}")),
            ..Record::default()
        };
        self.publish(record);
    }

    /// Convenience event composed as `<algorithm>_<step>` with a
    /// `metric=<value>` context.
    pub fn algorithm_step(&self, algorithm: &str, step: &str, metric: f64) {
        if !self.is_enabled() {
            return;
        }
        self.publish_event(
            Label::format(format_args!("{algorithm}_{step}")),
            metric,
            Label::format(format_args!("metric={metric:.6}")),
        );
    }

    fn publish_event(&self, label: Label, value: f64, context: Label) {
        let record = Record {
            kind: MilestoneKind::User1,
            timestamp: Timestamp::now(),
            duration_ms: value,
            thread_count: self.thread_count(),
            label,
            context,
            ..Record::default()
        };
        self.publish(record);
    }

    // ─── Voluntary allocation tracking ──────────────────────────────────────

    /// Counts one allocation of `bytes`. Gated on `track_memory`.
    pub fn track_allocation(&self, bytes: u64) {
        if self.is_enabled() && self.track_memory.load(Ordering::Relaxed) {
            self.counters.incr_alloc(bytes);
        }
    }

    /// Counts one free of `bytes`. Gated on `track_memory`.
    pub fn track_deallocation(&self, bytes: u64) {
        if self.is_enabled() && self.track_memory.load(Ordering::Relaxed) {
            self.counters.incr_free(bytes);
        }
    }

    // ─── Thread registration ────────────────────────────────────────────────

    /// Registers the calling thread and returns its dense index.
    ///
    /// Returns -1 while disabled, while thread tracking is off, or once
    /// the registry is full; idempotent for an already-registered thread.
    pub fn register_thread(&self) -> i32 {
        self.register_thread_in_pool(-1)
    }

    /// [`register_thread`](Self::register_thread) with the caller's
    /// external pool id attached to the slot.
    pub fn register_thread_in_pool(&self, pool_id: i32) -> i32 {
        if !self.is_enabled() || !self.track_threads.load(Ordering::Relaxed) {
            return -1;
        }
        let existing = self.registry.current_index();
        if existing >= 0 {
            return existing;
        }
        let idx = self.registry.register(pool_id);
        if idx >= 0 {
            self.counters.thread_started();
        }
        idx
    }

    /// Stamps the calling thread's end time and releases its binding. The
    /// slot itself survives for post-run inspection.
    pub fn unregister_thread(&self) {
        if !self.is_enabled() || !self.track_threads.load(Ordering::Relaxed) {
            return;
        }
        if self.registry.unregister() {
            self.counters.thread_stopped();
        }
    }

    /// The calling thread's registry index, -1 when unregistered.
    pub fn current_thread_index(&self) -> i32 {
        self.registry.current_index()
    }

    /// Bookkeeping slot for a registered thread, readable from any thread.
    pub fn thread_info(&self, index: u32) -> Option<ThreadInfo> {
        self.registry.info(index)
    }

    /// Currently registered (live) threads.
    pub fn thread_count(&self) -> i32 {
        self.counters.active_threads() as i32
    }

    /// Threads ever registered this run, live or not.
    pub fn registered_threads(&self) -> usize {
        self.registry.registered()
    }

    // ─── Drain side ─────────────────────────────────────────────────────────

    /// Published records currently in the buffer.
    pub fn record_count(&self) -> usize {
        self.ring.len()
    }

    /// Publish attempts refused because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.ring.dropped()
    }

    /// Copies the published records out in reservation order.
    pub fn records(&self) -> Vec<Record> {
        self.ring.snapshot()
    }

    /// Duration statistics over the buffered records of `kind`.
    pub fn milestone_stats(&self, kind: MilestoneKind) -> MilestoneStats {
        metron_stats::milestone_stats(&self.records(), kind)
    }

    /// Whole-run aggregate over the current buffer contents.
    pub fn summary(&self) -> Summary {
        self.summary_of(&self.records())
    }

    fn summary_of(&self, records: &[Record]) -> Summary {
        metron_stats::summarize(
            records,
            self.counters.snapshot(),
            self.ring.dropped(),
            self.elapsed_ms(),
        )
    }

    /// Milliseconds since construction or the last [`reset`](Self::reset).
    pub fn elapsed_ms(&self) -> f64 {
        let anchor = self.meta_snapshot().mono_anchor;
        Timestamp::now().ms_since(anchor)
    }

    /// Abandons buffered records and open intervals, and re-stamps the run
    /// anchor. Configuration, counters, and thread registrations survive.
    ///
    /// Producers must be quiescent; the buffer reset is not safe against a
    /// concurrent publish.
    pub fn reset(&self) {
        if !self.is_enabled() {
            return;
        }
        self.ring.reset();
        self.milestones.clear();
        *self.meta.lock().unwrap_or_else(PoisonError::into_inner) = RunMeta::capture();
    }

    /// Writes every buffered record to the configured sink in the
    /// configured format. Emission trouble is logged and swallowed;
    /// recording never fails.
    pub fn flush(&self) {
        if !self.is_enabled() {
            return;
        }
        let records = self.records();
        let summary = self.summary_of(&records);
        let config = self.config();
        let meta = self.meta_snapshot();
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = sink.flush(&records, &meta, &summary, &config) {
            tracing::debug!(%err, "flush to configured sink failed");
        }
    }

    /// Writes header plus all buffered records as CSV to `path` on an
    /// independent handle; the configured sink is untouched and recording
    /// continues regardless of the outcome.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let result = metron_sink::export_csv(path, &self.records());
        if let Err(err) = &result {
            tracing::warn!(path = %path.display(), %err, "CSV export failed");
        }
        result
    }

    /// Writes the full JSON document to `path` on an independent handle.
    pub fn export_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let records = self.records();
        let summary = self.summary_of(&records);
        let config = self.config();
        let meta = self.meta_snapshot();
        let result = metron_sink::export_json(path, &records, &meta, &summary, &config);
        if let Err(err) = &result {
            tracing::warn!(path = %path.display(), %err, "JSON export failed");
        }
        result
    }

    // ─── Live reconfiguration ───────────────────────────────────────────────

    /// Copy of the current configuration.
    pub fn config(&self) -> RecorderConfig {
        self.lock_config().clone()
    }

    /// Master switch; takes effect on the next operation.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        self.lock_config().enabled = enabled;
    }

    pub fn set_granularity(&self, granularity: Granularity) {
        self.granularity.store(granularity as u8, Ordering::Relaxed);
        self.lock_config().granularity = granularity;
    }

    pub fn set_flush_immediately(&self, on: bool) {
        self.flush_immediately.store(on, Ordering::Relaxed);
        self.lock_config().flush_immediately = on;
    }

    /// Toggles the three tracking families at once.
    pub fn set_tracking(&self, memory: bool, cpu: bool, threads: bool) {
        self.track_memory.store(memory, Ordering::Relaxed);
        self.track_cpu.store(cpu, Ordering::Relaxed);
        self.track_threads.store(threads, Ordering::Relaxed);
        let mut config = self.lock_config();
        config.track_memory = memory;
        config.track_cpu = cpu;
        config.track_threads = threads;
    }

    pub fn set_format(&self, format: OutputFormat) {
        self.lock_config().output_format = format;
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_format(format);
    }

    /// Re-points the sink; a file that cannot be opened degrades to stderr.
    pub fn set_output(&self, target: SinkTarget) {
        {
            let mut config = self.lock_config();
            config.output_file = match &target {
                SinkTarget::Stderr => None,
                SinkTarget::Stdout => Some(PathBuf::from("-")),
                SinkTarget::File(p) => Some(p.clone()),
            };
        }
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_target(target);
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn capture_probes(&self, record: &mut Record) {
        if self.track_memory.load(Ordering::Relaxed) {
            // Contended probe mutex: leave the fields zeroed rather than
            // stall the recording thread.
            if let Ok(mut probe) = self.memory_probe.try_lock() {
                let m = probe.probe();
                record.memory.rss_kb = m.rss_kb;
                record.memory.virt_kb = m.virt_kb;
                record.memory.peak_rss_kb = m.peak_rss_kb;
            }
            let c = self.counters.snapshot();
            record.memory.heap_allocated = c.bytes_allocated;
            record.memory.heap_freed = c.bytes_freed;
            record.memory.allocation_count = c.allocation_count;
            record.memory.free_count = c.free_count;
        }
        if self.track_cpu.load(Ordering::Relaxed)
            && let Ok(mut probe) = self.cpu_probe.try_lock()
        {
            record.cpu = probe.probe();
        }
    }

    fn publish(&self, record: Record) {
        if !self.ring.push(record) {
            return;
        }
        self.registry.note_op();
        if self.flush_immediately.load(Ordering::Relaxed) {
            self.flush();
        }
    }

    fn lock_config(&self) -> MutexGuard<'_, RecorderConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn meta_snapshot(&self) -> RunMeta {
        *self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Recorder::new(RecorderConfig::default())
    }
}
