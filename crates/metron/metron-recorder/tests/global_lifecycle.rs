//! Install/replace/shutdown of the process-global instance. One test
//! only; the global slot is shared process state.

use metron_recorder::{RecorderConfig, global, init, shutdown};

#[test]
fn install_use_replace_shutdown() {
    assert!(global().is_none());

    let first = init(RecorderConfig::default());
    first.event("boot", 1.0);
    let seen = global().unwrap();
    assert_eq!(seen.record_count(), 1);

    // Replacing swaps the slot; the old instance stays alive through
    // handles already handed out.
    let second = init(RecorderConfig::disabled());
    assert!(!second.is_enabled());
    assert_eq!(global().unwrap().record_count(), 0);
    assert_eq!(first.record_count(), 1);

    shutdown();
    assert!(global().is_none());
    drop(first);
}
