//! Dense thread registry with O(1) self-lookup.
//!
//! Registration hands out indices from a monotonic allocator; slots are
//! never reclaimed within a run, so an index identifies the same thread for
//! the whole process lifetime even after it unregisters. Each slot is a
//! seqlock written only by its owning thread and readable from anywhere.

use std::cell::Cell;
use std::sync::Once;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use metron_clock::Timestamp;
use metron_events::{Label, ThreadInfo};
use metron_ring::SeqlockSlot;

/// Registry slots per instance. Registrations past this soft-fail with -1.
pub const MAX_THREADS: usize = 256;

// Instance ids start at 1 so the thread-local's zeroed state never matches
// a live registry.
static REGISTRY_IDS: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // (registry instance id, slot index); (0, -1) = unbound.
    static BOUND: Cell<(u64, i32)> = const { Cell::new((0, -1)) };
}

/// Per-run table of registered threads.
///
/// A thread is bound to at most one registry at a time; registering with a
/// second instance rebinds it there and leaves the first slot frozen at its
/// last written state.
pub struct ThreadRegistry {
    id: u64,
    slots: Box<[SeqlockSlot<ThreadInfo>]>,
    next_index: AtomicU32,
    overflow_warn: Once,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_THREADS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| SeqlockSlot::new(ThreadInfo::default()))
            .collect();
        ThreadRegistry {
            id: REGISTRY_IDS.fetch_add(1, Ordering::Relaxed),
            slots,
            next_index: AtomicU32::new(0),
            overflow_warn: Once::new(),
        }
    }

    /// Registers the calling thread and returns its dense index.
    ///
    /// Idempotent for a thread already bound to this registry. Returns -1
    /// once all slots have been handed out. `pool_id` is the caller's
    /// thread-pool id, -1 for an unpooled thread.
    pub fn register(&self, pool_id: i32) -> i32 {
        let (bound_id, bound_idx) = BOUND.get();
        if bound_id == self.id && bound_idx >= 0 {
            return bound_idx;
        }

        let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
        if idx as usize >= self.slots.len() {
            self.overflow_warn.call_once(|| {
                tracing::warn!(
                    capacity = self.slots.len(),
                    "thread registry full; further registrations are ignored"
                );
            });
            return -1;
        }

        let info = ThreadInfo {
            index: idx,
            pool_id,
            started: Timestamp::now(),
            ended: Timestamp::ZERO,
            ops: 0,
            label: Label::new(std::thread::current().name().unwrap_or("")),
        };
        // SAFETY: `idx` came from the unique reservation above, so this
        // thread is the only writer this slot will ever see.
        unsafe { self.slots[idx as usize].write(info) };
        BOUND.set((self.id, idx as i32));
        idx as i32
    }

    /// Stamps the end time of the calling thread's slot and unbinds it.
    /// Returns false when the thread was not bound to this registry.
    pub fn unregister(&self) -> bool {
        let (bound_id, bound_idx) = BOUND.get();
        if bound_id != self.id || bound_idx < 0 {
            return false;
        }
        let slot = &self.slots[bound_idx as usize];
        let mut info = slot.read();
        info.ended = Timestamp::now();
        // SAFETY: the calling thread owns this slot until the unbind below.
        unsafe { slot.write(info) };
        BOUND.set((0, -1));
        true
    }

    /// The calling thread's index in this registry, -1 when unbound.
    #[inline]
    pub fn current_index(&self) -> i32 {
        let (bound_id, bound_idx) = BOUND.get();
        if bound_id == self.id { bound_idx } else { -1 }
    }

    /// Credits one published record to the calling thread, if bound.
    #[inline]
    pub fn note_op(&self) {
        let (bound_id, bound_idx) = BOUND.get();
        if bound_id != self.id || bound_idx < 0 {
            return;
        }
        let slot = &self.slots[bound_idx as usize];
        let mut info = slot.read();
        info.ops += 1;
        // SAFETY: only the owning thread writes its slot.
        unsafe { slot.write(info) };
    }

    /// Reads the slot for `index`. None past the registered range.
    pub fn info(&self, index: u32) -> Option<ThreadInfo> {
        if (index as usize) < self.registered() {
            Some(self.slots[index as usize].read())
        } else {
            None
        }
    }

    /// Threads ever registered here (unregistered ones included).
    pub fn registered(&self) -> usize {
        (self.next_index.load(Ordering::Relaxed) as usize).min(self.slots.len())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Copies every registered slot in index order.
    pub fn snapshot(&self) -> Vec<ThreadInfo> {
        (0..self.registered() as u32)
            .filter_map(|i| self.info(i))
            .collect()
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        ThreadRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn indices_are_dense() {
        let reg = Arc::new(ThreadRegistry::new());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.register(-1))
            })
            .collect();
        let mut indices: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(reg.registered(), 3);
    }

    #[test]
    fn register_is_idempotent_per_thread() {
        let reg = ThreadRegistry::new();
        let first = reg.register(-1);
        let second = reg.register(-1);
        assert_eq!(first, second);
        assert_eq!(reg.registered(), 1);
        assert_eq!(reg.current_index(), first);
        reg.unregister();
    }

    #[test]
    fn unbound_thread_sees_minus_one() {
        let reg = ThreadRegistry::new();
        assert_eq!(reg.current_index(), -1);
        assert!(!reg.unregister());
    }

    #[test]
    fn overflow_soft_fails() {
        let reg = Arc::new(ThreadRegistry::with_capacity(2));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.register(-1))
            })
            .collect();
        let mut indices: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![-1, 0, 1]);
        assert_eq!(reg.registered(), 2);
    }

    #[test]
    fn unregister_stamps_end_and_unbinds() {
        let reg = ThreadRegistry::new();
        let idx = reg.register(7);
        assert!(idx >= 0);
        assert!(reg.unregister());
        assert_eq!(reg.current_index(), -1);

        let info = reg.info(idx as u32).unwrap();
        assert_eq!(info.pool_id, 7);
        assert_ne!(info.ended, Timestamp::ZERO);
        assert!(info.ended.as_ns() >= info.started.as_ns());
        // The slot survives unregistration.
        assert_eq!(reg.registered(), 1);
    }

    #[test]
    fn note_op_counts_records() {
        let reg = ThreadRegistry::new();
        let idx = reg.register(-1);
        reg.note_op();
        reg.note_op();
        reg.note_op();
        assert_eq!(reg.info(idx as u32).unwrap().ops, 3);
        reg.unregister();
        // After unbinding further ops are not credited.
        reg.note_op();
        assert_eq!(reg.info(idx as u32).unwrap().ops, 3);
    }

    #[test]
    fn instances_do_not_cross_talk() {
        let a = ThreadRegistry::new();
        let b = ThreadRegistry::new();
        let idx = a.register(-1);
        assert!(idx >= 0);
        assert_eq!(b.current_index(), -1);
        assert_eq!(b.registered(), 0);
        // Registering with b rebinds this thread there.
        let b_idx = b.register(-1);
        assert_eq!(b_idx, 0);
        assert_eq!(a.current_index(), -1);
        b.unregister();
    }

    #[test]
    fn snapshot_returns_registered_slots() {
        let reg = ThreadRegistry::new();
        reg.register(3);
        let snap = reg.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].index, 0);
        assert_eq!(snap[0].pool_id, 3);
        reg.unregister();
    }
}
