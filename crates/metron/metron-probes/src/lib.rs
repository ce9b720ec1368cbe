//! OS probe capabilities for memory and CPU telemetry.
//!
//! The recorder depends on these traits only; platform backends live behind
//! `default_memory_probe`/`default_cpu_probe`. Probing is best-effort: a
//! backend that cannot report a field returns zero for it rather than an
//! error, and a failed syscall yields an all-zero reading.

pub mod cpu;
pub mod memory;

use metron_events::CpuSnapshot;

pub use cpu::RusageCpuProbe;
pub use memory::MemoryReading;
#[cfg(target_os = "linux")]
pub use memory::ProcStatusProbe;
#[cfg(unix)]
pub use memory::RusageMemoryProbe;

/// Capability returning current resident/virtual/peak memory.
///
/// `probe` takes `&mut self` so stateful backends fit the same signature;
/// callers that need independent probes hold independent instances.
pub trait MemoryProbe: Send {
    fn probe(&mut self) -> MemoryReading;
}

/// Capability returning CPU-time figures and a rolling percentage.
///
/// The rolling percentage is computed against state inside the probe
/// instance, so two callers sharing one instance see interleaved windows.
/// Hold one instance per independent consumer.
pub trait CpuProbe: Send {
    fn probe(&mut self) -> CpuSnapshot;
}

/// Best backend for the build target.
pub fn default_memory_probe() -> Box<dyn MemoryProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(memory::ProcStatusProbe)
    }
    #[cfg(all(unix, not(target_os = "linux")))]
    {
        Box::new(memory::RusageMemoryProbe)
    }
    #[cfg(not(unix))]
    {
        Box::new(memory::NoopMemoryProbe)
    }
}

pub fn default_cpu_probe() -> Box<dyn CpuProbe> {
    Box::new(cpu::RusageCpuProbe::new())
}
