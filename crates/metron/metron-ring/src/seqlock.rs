//! Seqlock slot: one writer at a time, any number of readers, no blocking.
//!
//! The writer brackets its store with two sequence increments; readers copy
//! the payload and retry until they observe the same even sequence on both
//! sides of the copy.
//!
//! # Protocol
//!
//! **Writer:**
//! 1. Bump seq to odd (write in progress)
//! 2. Store the payload
//! 3. Bump seq to even (write complete)
//!
//! **Reader:**
//! 1. Load seq; if odd, spin
//! 2. Copy the payload
//! 3. Load seq again; if it changed, retry
//!
//! Unlike a lock the reader never waits for a descheduled writer except
//! during the payload store itself, and `T: Copy` keeps the copy a plain
//! memmove with no drop glue to race.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// A slot protected by a sequence lock.
///
/// The payload is initialized at construction, so reads are defined even
/// before the first `write`; an unwritten slot simply yields the initial
/// value. Cache-line aligned so adjacent slots in an array do not false-share
/// their sequence words.
///
/// Sequence semantics: even = stable, odd = write in progress.
#[repr(C, align(64))]
pub struct SeqlockSlot<T: Copy> {
    /// Odd while a write is in flight.
    seq: AtomicU64,
    data: UnsafeCell<T>,
}

// Readers on any thread race only against the seq-bracketed writer, and the
// payload is Copy. The write-side exclusivity is the caller's obligation
// (see `write`).
unsafe impl<T: Copy + Send> Sync for SeqlockSlot<T> {}
unsafe impl<T: Copy + Send> Send for SeqlockSlot<T> {}

impl<T: Copy> SeqlockSlot<T> {
    pub fn new(initial: T) -> Self {
        SeqlockSlot {
            seq: AtomicU64::new(0),
            data: UnsafeCell::new(initial),
        }
    }

    /// Stores a value under the seqlock protocol.
    ///
    /// # Safety
    ///
    /// At most one thread may execute `write` on a given slot at a time.
    /// Concurrent writers would interleave their sequence bumps and payload
    /// stores. In the record ring every producer owns a distinct slot via
    /// its unique reservation index; in the thread registry only the owning
    /// thread writes its slot. Readers need no coordination.
    ///
    /// `Release` on both seq stores pairs with the reader's `Acquire` loads,
    /// making the payload visible before the closing sequence value.
    #[inline(always)]
    pub unsafe fn write(&self, value: T) {
        let s0 = self.seq.load(Ordering::Relaxed);
        self.seq.store(s0.wrapping_add(1), Ordering::Release);
        // SAFETY: caller guarantees write exclusivity on this slot.
        unsafe { *self.data.get() = value };
        self.seq.store(s0.wrapping_add(2), Ordering::Release);
    }

    /// Copies out a consistent snapshot, spinning across in-flight writes.
    #[inline(always)]
    pub fn read(&self) -> T {
        loop {
            let s1 = self.seq.load(Ordering::Acquire);
            if (s1 & 1) == 1 {
                std::hint::spin_loop();
                continue;
            }

            // SAFETY: the payload is always initialized; a torn copy is
            // detected by the sequence re-check below and discarded.
            let v = unsafe { *self.data.get() };

            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 {
                return v;
            }
            std::hint::spin_loop();
        }
    }
}
