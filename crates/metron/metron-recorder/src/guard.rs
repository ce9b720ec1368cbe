//! RAII form of the start/end pair.

use metron_events::{Label, MilestoneKind};

use crate::Recorder;

/// Closes its milestone when dropped, so every exit path of the guarded
/// scope records the interval, unwinding included.
///
/// An unarmed guard (granularity below the configured level) does nothing
/// on drop and never touches the milestone table.
#[must_use = "the interval closes when the guard drops"]
pub struct MilestoneGuard<'a> {
    recorder: &'a Recorder,
    kind: MilestoneKind,
    label: Label,
    armed: bool,
}

impl<'a> MilestoneGuard<'a> {
    pub(crate) fn new(
        recorder: &'a Recorder,
        kind: MilestoneKind,
        label: Label,
        armed: bool,
    ) -> Self {
        MilestoneGuard {
            recorder,
            kind,
            label,
            armed,
        }
    }

    pub fn kind(&self) -> MilestoneKind {
        self.kind
    }
}

impl Drop for MilestoneGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.recorder.end_labeled(self.kind, self.label.as_str());
        }
    }
}
