//! Shared mutable state for the recorder: statistical counters, the thread
//! registry, and the open-milestone table.
//!
//! Everything in this crate is written to from the recording hot path, so
//! the structures are lock-free by default (the counters offer a
//! mutex-backed variant for targets where 64-bit atomics are emulated).

pub mod counters;
pub mod milestones;
pub mod registry;

pub use counters::{CounterBackend, CounterSnapshot, Counters};
pub use milestones::MilestoneTable;
pub use registry::{MAX_THREADS, ThreadRegistry};
