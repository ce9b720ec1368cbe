//! Bounded append-only ring with atomic slot reservation.
//!
//! Producers reserve a slot index with one `fetch_add` on the attempt
//! counter. An index past capacity means the ring is full: the write is
//! abandoned and the drop counter bumped. There is no wrap-around; the ring
//! is one-shot per reset, so published slots stay addressable until the
//! drainer decides otherwise.
//!
//! Drain order equals reservation order, which under contention matches
//! neither acquisition nor wall-clock order; consumers that need temporal
//! order sort by the record's own timestamp.

use crate::seqlock::SeqlockSlot;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default ring capacity per run.
pub const MAX_LOG_ENTRIES: usize = 10_000;

/// Multi-producer bounded log of `Copy` records.
pub struct RecordRing<T: Copy + Default> {
    slots: Box<[SeqlockSlot<T>]>,
    /// Total reservation attempts, including dropped ones.
    attempts: AtomicU64,
    dropped: AtomicU64,
}

impl<T: Copy + Default> RecordRing<T> {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        let slots: Box<[SeqlockSlot<T>]> =
            (0..capacity).map(|_| SeqlockSlot::new(T::default())).collect();
        RecordRing {
            slots,
            attempts: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Reserves a slot and publishes `value`. Returns false when the ring is
    /// full; the value is discarded and the drop counter incremented.
    #[inline(always)]
    pub fn push(&self, value: T) -> bool {
        let idx = self.attempts.fetch_add(1, Ordering::Relaxed) as usize;
        if idx >= self.slots.len() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        // SAFETY: the fetch_add handed index `idx` to this producer alone;
        // no other writer touches the slot until a quiescent reset.
        unsafe { self.slots[idx].write(value) };
        true
    }

    /// Published-or-reserved record count, clamped to capacity.
    #[inline]
    pub fn len(&self) -> usize {
        (self.attempts.load(Ordering::Acquire) as usize).min(self.slots.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total publish attempts since the last reset.
    #[inline]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Records rejected because the ring was full.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reads slot `index` through its seqlock. A slot reserved but not yet
    /// written yields the default value.
    pub fn get(&self, index: usize) -> Option<T> {
        if index < self.len() {
            Some(self.slots[index].read())
        } else {
            None
        }
    }

    /// Copies out all published records in reservation order.
    pub fn snapshot(&self) -> Vec<T> {
        let n = self.len();
        (0..n).map(|i| self.slots[i].read()).collect()
    }

    /// Rewinds the ring to empty without touching slot payloads.
    ///
    /// Caller contract: no producer may be mid-`push` across a reset; the
    /// recorder invokes this only from its quiescent reset path.
    pub fn reset(&self) {
        self.attempts.store(0, Ordering::Release);
        self.dropped.store(0, Ordering::Relaxed);
    }
}

impl<T: Copy + Default> Default for RecordRing<T> {
    fn default() -> Self {
        Self::new()
    }
}
