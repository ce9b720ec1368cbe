//! Run-wide statistical counters: voluntary heap traffic and thread liveness.
//!
//! Increments happen on the hot path and must never block or fail, so the
//! default backend is plain relaxed atomics. A mutex-backed variant exists
//! for targets where 64-bit atomics lower to library calls; both present the
//! same interface and the same snapshot.

use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Storage strategy for [`Counters`], fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CounterBackend {
    /// Relaxed atomics per counter. The default on every 64-bit target.
    #[default]
    Atomic,
    /// One mutex around a plain struct. Slower, but a single 64-bit store
    /// under the lock is safe even where atomics are emulated.
    Locked,
}

/// A point-in-time copy of every counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub allocation_count: u64,
    pub free_count: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    /// Currently registered threads. Negative only if stops outnumber starts.
    pub active_threads: i64,
    /// High-water mark of `active_threads`.
    pub peak_threads: u64,
}

#[derive(Default)]
struct AtomicCounters {
    allocation_count: AtomicU64,
    free_count: AtomicU64,
    bytes_allocated: AtomicU64,
    bytes_freed: AtomicU64,
    active_threads: AtomicI64,
    peak_threads: AtomicU64,
}

enum Inner {
    Atomic(AtomicCounters),
    Locked(Mutex<CounterSnapshot>),
}

/// Shared counters, safe to bump from any thread.
pub struct Counters {
    inner: Inner,
}

impl Counters {
    pub fn new(backend: CounterBackend) -> Self {
        let inner = match backend {
            CounterBackend::Atomic => Inner::Atomic(AtomicCounters::default()),
            CounterBackend::Locked => Inner::Locked(Mutex::new(CounterSnapshot::default())),
        };
        Counters { inner }
    }

    pub fn backend(&self) -> CounterBackend {
        match self.inner {
            Inner::Atomic(_) => CounterBackend::Atomic,
            Inner::Locked(_) => CounterBackend::Locked,
        }
    }

    /// Records one voluntary allocation of `bytes`.
    #[inline]
    pub fn incr_alloc(&self, bytes: u64) {
        match &self.inner {
            Inner::Atomic(a) => {
                a.allocation_count.fetch_add(1, Ordering::Relaxed);
                a.bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
            }
            Inner::Locked(m) => {
                let mut c = m.lock().unwrap_or_else(PoisonError::into_inner);
                c.allocation_count += 1;
                c.bytes_allocated += bytes;
            }
        }
    }

    /// Records one voluntary free of `bytes`.
    #[inline]
    pub fn incr_free(&self, bytes: u64) {
        match &self.inner {
            Inner::Atomic(a) => {
                a.free_count.fetch_add(1, Ordering::Relaxed);
                a.bytes_freed.fetch_add(bytes, Ordering::Relaxed);
            }
            Inner::Locked(m) => {
                let mut c = m.lock().unwrap_or_else(PoisonError::into_inner);
                c.free_count += 1;
                c.bytes_freed += bytes;
            }
        }
    }

    /// Notes a thread coming up. Returns the active count before this start.
    pub fn thread_started(&self) -> i64 {
        match &self.inner {
            Inner::Atomic(a) => {
                let prior = a.active_threads.fetch_add(1, Ordering::Relaxed);
                let now = prior + 1;
                if now > 0 {
                    a.peak_threads.fetch_max(now as u64, Ordering::Relaxed);
                }
                prior
            }
            Inner::Locked(m) => {
                let mut c = m.lock().unwrap_or_else(PoisonError::into_inner);
                let prior = c.active_threads;
                c.active_threads += 1;
                if c.active_threads > 0 {
                    c.peak_threads = c.peak_threads.max(c.active_threads as u64);
                }
                prior
            }
        }
    }

    /// Notes a thread going away.
    pub fn thread_stopped(&self) {
        match &self.inner {
            Inner::Atomic(a) => {
                a.active_threads.fetch_sub(1, Ordering::Relaxed);
            }
            Inner::Locked(m) => {
                m.lock().unwrap_or_else(PoisonError::into_inner).active_threads -= 1;
            }
        }
    }

    pub fn allocation_count(&self) -> u64 {
        self.snapshot().allocation_count
    }

    pub fn free_count(&self) -> u64 {
        self.snapshot().free_count
    }

    pub fn bytes_allocated(&self) -> u64 {
        self.snapshot().bytes_allocated
    }

    pub fn bytes_freed(&self) -> u64 {
        self.snapshot().bytes_freed
    }

    pub fn active_threads(&self) -> i64 {
        self.snapshot().active_threads
    }

    pub fn peak_threads(&self) -> u64 {
        self.snapshot().peak_threads
    }

    /// Copies every counter. Individual fields are each read atomically but
    /// the snapshot as a whole is not a single instant across counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        match &self.inner {
            Inner::Atomic(a) => CounterSnapshot {
                allocation_count: a.allocation_count.load(Ordering::Relaxed),
                free_count: a.free_count.load(Ordering::Relaxed),
                bytes_allocated: a.bytes_allocated.load(Ordering::Relaxed),
                bytes_freed: a.bytes_freed.load(Ordering::Relaxed),
                active_threads: a.active_threads.load(Ordering::Relaxed),
                peak_threads: a.peak_threads.load(Ordering::Relaxed),
            },
            Inner::Locked(m) => *m.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Counters::new(CounterBackend::Atomic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn exercise(c: &Counters) {
        c.incr_alloc(1024);
        c.incr_alloc(2048);
        c.incr_free(1024);
        c.thread_started();
        c.thread_started();
        c.thread_started();
        c.thread_stopped();
    }

    #[test]
    fn backends_agree() {
        let atomic = Counters::new(CounterBackend::Atomic);
        let locked = Counters::new(CounterBackend::Locked);
        exercise(&atomic);
        exercise(&locked);
        assert_eq!(atomic.snapshot(), locked.snapshot());
        assert_eq!(atomic.backend(), CounterBackend::Atomic);
        assert_eq!(locked.backend(), CounterBackend::Locked);
    }

    #[test]
    fn alloc_and_free_totals() {
        let c = Counters::default();
        c.incr_alloc(100);
        c.incr_alloc(300);
        c.incr_free(100);
        assert_eq!(c.allocation_count(), 2);
        assert_eq!(c.bytes_allocated(), 400);
        assert_eq!(c.free_count(), 1);
        assert_eq!(c.bytes_freed(), 100);
    }

    #[test]
    fn peak_holds_after_stops() {
        let c = Counters::default();
        assert_eq!(c.thread_started(), 0);
        assert_eq!(c.thread_started(), 1);
        assert_eq!(c.thread_started(), 2);
        c.thread_stopped();
        c.thread_stopped();
        assert_eq!(c.active_threads(), 1);
        assert_eq!(c.peak_threads(), 3);
        c.thread_started();
        assert_eq!(c.active_threads(), 2);
        assert_eq!(c.peak_threads(), 3);
    }

    #[test]
    fn concurrent_increments_all_land() {
        let c = Arc::new(Counters::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.incr_alloc(16);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.allocation_count(), 8000);
        assert_eq!(c.bytes_allocated(), 8000 * 16);
    }
}
