//! CPU probe backend over `getrusage`.

use crate::CpuProbe;
use metron_clock::Timestamp;
use metron_events::CpuSnapshot;

/// CPU-time probe with per-instance rolling-percentage state.
///
/// The percentage compares the growth of user+system time against the wall
/// clock since this instance's previous `probe` call; the first call always
/// reports zero. The previous-sample state lives in the instance, so every
/// independent consumer must own its own probe.
pub struct RusageCpuProbe {
    last_wall: Option<Timestamp>,
    last_cpu_secs: f64,
}

impl RusageCpuProbe {
    pub fn new() -> Self {
        RusageCpuProbe {
            last_wall: None,
            last_cpu_secs: 0.0,
        }
    }
}

impl Default for RusageCpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuProbe for RusageCpuProbe {
    #[cfg(unix)]
    fn probe(&mut self) -> CpuSnapshot {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
        if rc != 0 {
            return CpuSnapshot::default();
        }

        let user_time = usage.ru_utime.tv_sec as f64 + usage.ru_utime.tv_usec as f64 / 1e6;
        let system_time = usage.ru_stime.tv_sec as f64 + usage.ru_stime.tv_usec as f64 / 1e6;
        let cpu_secs = user_time + system_time;
        let wall = Timestamp::now();

        let mut cpu_percent = 0.0;
        if let Some(prev_wall) = self.last_wall {
            let wall_secs = wall.ms_since(prev_wall) / 1000.0;
            if wall_secs > 0.0 {
                cpu_percent = (cpu_secs - self.last_cpu_secs) / wall_secs * 100.0;
            }
        }
        self.last_wall = Some(wall);
        self.last_cpu_secs = cpu_secs;

        CpuSnapshot {
            cpu_percent,
            user_time,
            system_time,
            context_switches: (usage.ru_nvcsw + usage.ru_nivcsw) as u64,
            cache_misses: 0,
        }
    }

    #[cfg(not(unix))]
    fn probe(&mut self) -> CpuSnapshot {
        CpuSnapshot::default()
    }
}
