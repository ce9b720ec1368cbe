pub mod label;
pub mod milestone;
pub mod record;

pub use label::{Label, MAX_LABEL_LEN};
pub use milestone::{MILESTONE_COUNT, MilestoneKind};
pub use record::{CpuSnapshot, MemorySnapshot, Record, ThreadInfo};
