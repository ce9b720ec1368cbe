//! Bounded in-process record storage for concurrent producers.
//!
//! Two pieces: a seqlock-protected slot primitive and a bounded append-only
//! ring built from it. Producers pay one atomic fetch-add plus an in-place
//! write; the ring drops (and counts) everything past capacity instead of
//! wrapping, so a drained slot is never overwritten within one run.

pub mod ring;
pub mod seqlock;

pub use ring::{MAX_LOG_ENTRIES, RecordRing};
pub use seqlock::SeqlockSlot;
