//! Optional process-global recorder.
//!
//! The [`Recorder`] itself is an explicit handle; this module is the
//! convenience layer for hosts that want one shared instance without
//! threading it through every call site.

use std::sync::{Arc, Mutex, PoisonError};

use metron_config::RecorderConfig;

use crate::Recorder;

static GLOBAL: Mutex<Option<Arc<Recorder>>> = Mutex::new(None);

/// Builds a recorder from `config` and installs it as the process-global
/// instance, returning a handle to it.
///
/// A previous instance is replaced, not torn down: callers still holding
/// its `Arc` keep a working recorder, and its buffer is freed when the
/// last handle drops.
pub fn init(config: RecorderConfig) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::new(config));
    let mut slot = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(Arc::clone(&recorder));
    recorder
}

/// The installed recorder, if `init` has run and `shutdown` has not.
pub fn global() -> Option<Arc<Recorder>> {
    GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Flushes the global recorder and uninstalls it.
pub fn shutdown() {
    let recorder = GLOBAL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(recorder) = recorder {
        recorder.flush();
    }
}
