//! Monotonic timestamp acquisition for the metron recording hot path.
//!
//! The clock source is fixed at build time per target: `CLOCK_MONOTONIC_RAW`
//! on Linux, `mach_absolute_time` (scaled by the cached timebase) on macOS,
//! `CLOCK_MONOTONIC` on other unix, and a process-start `Instant` anchor
//! everywhere else. All sources are monotonic; values are only meaningful as
//! differences within one process run.

/// A point on the process-local monotonic clock.
///
/// `cycles` is reserved for a raw CPU cycle counter and is currently always
/// zero; consumers must treat it as opaque.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
    pub cycles: u64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        secs: 0,
        nanos: 0,
        cycles: 0,
    };

    /// Reads the monotonic clock.
    #[inline(always)]
    pub fn now() -> Timestamp {
        imp::now()
    }

    /// Total nanoseconds on the monotonic scale.
    #[inline(always)]
    pub fn as_ns(&self) -> u64 {
        self.secs * 1_000_000_000 + self.nanos as u64
    }

    /// Elapsed nanoseconds since `earlier`. Saturates to zero if the operands
    /// are inverted.
    #[inline(always)]
    pub fn ns_since(&self, earlier: Timestamp) -> u64 {
        self.as_ns().saturating_sub(earlier.as_ns())
    }

    /// Elapsed milliseconds since `earlier` as a float. Saturates to zero if
    /// the operands are inverted.
    #[inline(always)]
    pub fn ms_since(&self, earlier: Timestamp) -> f64 {
        self.ns_since(earlier) as f64 / 1_000_000.0
    }

    #[inline(always)]
    fn from_ns(total_ns: u64) -> Timestamp {
        Timestamp {
            secs: total_ns / 1_000_000_000,
            nanos: (total_ns % 1_000_000_000) as u32,
            cycles: 0,
        }
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use super::Timestamp;

    #[inline(always)]
    pub fn now() -> Timestamp {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut ts);
        }
        Timestamp {
            secs: ts.tv_sec as u64,
            nanos: ts.tv_nsec as u32,
            cycles: 0,
        }
    }
}

#[cfg(target_os = "macos")]
mod imp {
    use super::Timestamp;
    use std::sync::OnceLock;

    #[inline(always)]
    #[allow(deprecated)]
    pub fn now() -> Timestamp {
        static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
        let (numer, denom) = *TIMEBASE.get_or_init(|| {
            let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
            let rc = unsafe { libc::mach_timebase_info(&mut info) };
            if rc != 0 || info.denom == 0 {
                (1, 1)
            } else {
                (info.numer as u64, info.denom as u64)
            }
        });
        let t = unsafe { libc::mach_absolute_time() } as u128;
        Timestamp::from_ns(((t * numer as u128) / denom as u128) as u64)
    }
}

#[cfg(all(unix, not(target_os = "linux"), not(target_os = "macos")))]
mod imp {
    use super::Timestamp;

    #[inline(always)]
    pub fn now() -> Timestamp {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        Timestamp {
            secs: ts.tv_sec as u64,
            nanos: ts.tv_nsec as u32,
            cycles: 0,
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::Timestamp;
    use std::sync::OnceLock;
    use std::time::Instant;

    #[inline(always)]
    pub fn now() -> Timestamp {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        let anchor = *ANCHOR.get_or_init(Instant::now);
        Timestamp::from_ns(anchor.elapsed().as_nanos() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b.as_ns() >= a.as_ns());
    }

    #[test]
    fn cycles_reserved_zero() {
        assert_eq!(Timestamp::now().cycles, 0);
    }

    #[test]
    fn diff_arithmetic() {
        let a = Timestamp {
            secs: 2,
            nanos: 500_000_000,
            cycles: 0,
        };
        let b = Timestamp {
            secs: 4,
            nanos: 250_000_000,
            cycles: 0,
        };
        assert_eq!(b.ns_since(a), 1_750_000_000);
        assert!((b.ms_since(a) - 1750.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_operands_saturate() {
        let a = Timestamp {
            secs: 10,
            nanos: 0,
            cycles: 0,
        };
        let b = Timestamp {
            secs: 5,
            nanos: 0,
            cycles: 0,
        };
        assert_eq!(b.ns_since(a), 0);
        assert_eq!(b.ms_since(a), 0.0);
    }

    #[test]
    fn sleep_is_measured() {
        let start = Timestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let end = Timestamp::now();
        let ms = end.ms_since(start);
        assert!(ms >= 4.0, "slept 5ms but measured {ms} ms");
    }

    #[test]
    fn ns_ms_agree() {
        let a = Timestamp::ZERO;
        let b = Timestamp {
            secs: 1,
            nanos: 234_567_890,
            cycles: 0,
        };
        let ns = b.ns_since(a);
        let ms = b.ms_since(a);
        assert!((ms - ns as f64 / 1_000_000.0).abs() < 1e-9);
    }
}
