//! Open-milestone table: one start-time cell per milestone kind.
//!
//! `begin` publishes a start time for a kind and `finish` consumes it.
//! Intervals of the same kind are expected to come from one thread at a
//! time; concurrent begins of one kind are last-writer-wins, and the swap
//! in `finish` guarantees a single start is consumed at most once.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use metron_clock::Timestamp;
use metron_events::{MILESTONE_COUNT, MilestoneKind};

struct StartCell {
    secs: AtomicU64,
    nanos: AtomicU64,
    active: AtomicBool,
}

impl StartCell {
    fn new() -> Self {
        StartCell {
            secs: AtomicU64::new(0),
            nanos: AtomicU64::new(0),
            active: AtomicBool::new(false),
        }
    }
}

/// Start times for currently-open intervals, indexed by milestone kind.
pub struct MilestoneTable {
    cells: [StartCell; MILESTONE_COUNT],
}

impl MilestoneTable {
    pub fn new() -> Self {
        MilestoneTable {
            cells: std::array::from_fn(|_| StartCell::new()),
        }
    }

    /// Opens an interval for `kind` at `ts`, replacing any earlier open one.
    ///
    /// The Release store on `active` publishes the time stores below it;
    /// `finish` pairs with it via an Acquire swap.
    #[inline]
    pub fn begin(&self, kind: MilestoneKind, ts: Timestamp) {
        let cell = &self.cells[kind.index()];
        cell.secs.store(ts.secs, Ordering::Relaxed);
        cell.nanos.store(ts.nanos as u64, Ordering::Relaxed);
        cell.active.store(true, Ordering::Release);
    }

    /// Closes the open interval for `kind`, returning its start time.
    /// None when no interval was open; a second `finish` also gets None.
    #[inline]
    pub fn finish(&self, kind: MilestoneKind) -> Option<Timestamp> {
        let cell = &self.cells[kind.index()];
        if cell.active.swap(false, Ordering::Acquire) {
            Some(Timestamp {
                secs: cell.secs.load(Ordering::Relaxed),
                nanos: cell.nanos.load(Ordering::Relaxed) as u32,
                cycles: 0,
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, kind: MilestoneKind) -> bool {
        self.cells[kind.index()].active.load(Ordering::Acquire)
    }

    /// Abandons every open interval. Used by recorder reset; callers must
    /// be quiesced, matching the ring's reset contract.
    pub fn clear(&self) {
        for cell in &self.cells {
            cell.active.store(false, Ordering::Relaxed);
        }
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        MilestoneTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_then_finish_returns_start() {
        let table = MilestoneTable::new();
        let ts = Timestamp {
            secs: 5,
            nanos: 123,
            cycles: 0,
        };
        table.begin(MilestoneKind::DistanceMatrixStart, ts);
        assert!(table.is_active(MilestoneKind::DistanceMatrixStart));
        assert_eq!(table.finish(MilestoneKind::DistanceMatrixStart), Some(ts));
        assert!(!table.is_active(MilestoneKind::DistanceMatrixStart));
    }

    #[test]
    fn finish_without_begin_is_none() {
        let table = MilestoneTable::new();
        assert_eq!(table.finish(MilestoneKind::TreeConstructionStart), None);
    }

    #[test]
    fn second_finish_is_none() {
        let table = MilestoneTable::new();
        table.begin(MilestoneKind::FastaLoadStart, Timestamp::now());
        assert!(table.finish(MilestoneKind::FastaLoadStart).is_some());
        assert_eq!(table.finish(MilestoneKind::FastaLoadStart), None);
    }

    #[test]
    fn rebegin_replaces_start() {
        let table = MilestoneTable::new();
        let first = Timestamp {
            secs: 1,
            nanos: 0,
            cycles: 0,
        };
        let second = Timestamp {
            secs: 2,
            nanos: 0,
            cycles: 0,
        };
        table.begin(MilestoneKind::ClusteringIteration, first);
        table.begin(MilestoneKind::ClusteringIteration, second);
        assert_eq!(table.finish(MilestoneKind::ClusteringIteration), Some(second));
    }

    #[test]
    fn kinds_are_independent() {
        let table = MilestoneTable::new();
        table.begin(MilestoneKind::AlignmentStart, Timestamp::now());
        table.begin(MilestoneKind::TreeNodeCreation, Timestamp::now());
        assert!(table.finish(MilestoneKind::AlignmentStart).is_some());
        assert!(table.is_active(MilestoneKind::TreeNodeCreation));
    }

    #[test]
    fn clear_abandons_open_intervals() {
        let table = MilestoneTable::new();
        table.begin(MilestoneKind::MemoryAlloc, Timestamp::now());
        table.begin(MilestoneKind::User1, Timestamp::now());
        table.clear();
        assert_eq!(table.finish(MilestoneKind::MemoryAlloc), None);
        assert_eq!(table.finish(MilestoneKind::User1), None);
    }
}
