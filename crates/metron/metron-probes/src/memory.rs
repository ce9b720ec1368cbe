//! Memory probe backends.

use crate::MemoryProbe;

/// Point-in-time OS memory figures, all in KB. Unknown fields are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryReading {
    pub rss_kb: u64,
    pub virt_kb: u64,
    pub peak_rss_kb: u64,
}

/// Parses the `Vm*` lines of a `/proc/self/status` document.
///
/// Lines look like `VmRSS:      1234 kB`; anything missing stays zero.
#[cfg(any(target_os = "linux", test))]
fn parse_status(text: &str) -> MemoryReading {
    fn field_kb(rest: &str) -> u64 {
        rest.split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    let mut out = MemoryReading::default();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            out.rss_kb = field_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            out.virt_kb = field_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmHWM:") {
            out.peak_rss_kb = field_kb(rest);
        }
    }
    out
}

/// Linux backend reading `/proc/self/status` (RSS, virtual size, high-water
/// mark). One warning is logged if the file becomes unreadable; subsequent
/// failures degrade silently to zeros.
#[cfg(target_os = "linux")]
pub struct ProcStatusProbe;

#[cfg(target_os = "linux")]
impl MemoryProbe for ProcStatusProbe {
    fn probe(&mut self) -> MemoryReading {
        use std::sync::Once;
        static WARN_ONCE: Once = Once::new();

        match std::fs::read_to_string("/proc/self/status") {
            Ok(text) => parse_status(&text),
            Err(err) => {
                WARN_ONCE.call_once(|| {
                    tracing::warn!("memory probe cannot read /proc/self/status: {err}");
                });
                MemoryReading::default()
            }
        }
    }
}

/// Portable unix fallback via `getrusage`.
///
/// Only the peak RSS is knowable here; it is reported as both current and
/// peak (the kernel does not expose instantaneous RSS through rusage), and
/// the virtual size stays zero.
#[cfg(unix)]
pub struct RusageMemoryProbe;

#[cfg(unix)]
impl MemoryProbe for RusageMemoryProbe {
    fn probe(&mut self) -> MemoryReading {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if rc != 0 {
            return MemoryReading::default();
        }
        // ru_maxrss is KB on Linux, bytes on macOS.
        #[cfg(target_os = "macos")]
        let peak_kb = (usage.ru_maxrss / 1024) as u64;
        #[cfg(not(target_os = "macos"))]
        let peak_kb = usage.ru_maxrss as u64;
        MemoryReading {
            rss_kb: peak_kb,
            virt_kb: 0,
            peak_rss_kb: peak_kb,
        }
    }
}

/// Backend of last resort: reports nothing.
#[cfg(not(unix))]
pub struct NoopMemoryProbe;

#[cfg(not(unix))]
impl MemoryProbe for NoopMemoryProbe {
    fn probe(&mut self) -> MemoryReading {
        MemoryReading::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_fields() {
        let text = "Name:\tmetron\nVmPeak:\t  20000 kB\nVmSize:\t  18120 kB\nVmHWM:\t   9000 kB\nVmRSS:\t   8456 kB\nThreads:\t4\n";
        let r = parse_status(text);
        assert_eq!(r.rss_kb, 8456);
        assert_eq!(r.virt_kb, 18120);
        assert_eq!(r.peak_rss_kb, 9000);
    }

    #[test]
    fn missing_fields_stay_zero() {
        let r = parse_status("Name:\tmetron\nVmRSS:\t 512 kB\n");
        assert_eq!(r.rss_kb, 512);
        assert_eq!(r.virt_kb, 0);
        assert_eq!(r.peak_rss_kb, 0);
    }

    #[test]
    fn garbage_lines_stay_zero() {
        let r = parse_status("VmRSS: not-a-number kB\n");
        assert_eq!(r, MemoryReading::default());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn proc_status_probe_reports_resident_memory() {
        let mut probe = ProcStatusProbe;
        let r = probe.probe();
        assert!(r.rss_kb > 0, "a live process has nonzero RSS");
        assert!(r.peak_rss_kb >= r.rss_kb);
    }

    #[cfg(unix)]
    #[test]
    fn rusage_probe_reports_peak() {
        let mut probe = RusageMemoryProbe;
        let r = probe.probe();
        assert!(r.peak_rss_kb > 0);
        assert_eq!(r.rss_kb, r.peak_rss_kb);
    }
}
