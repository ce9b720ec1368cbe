use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on configured output paths, matching the on-disk format docs.
pub const MAX_FILENAME_LEN: usize = 256;

/// Reserved for periodic samplers; carried through the config surface.
pub const DEFAULT_SAMPLING_INTERVAL_US: u64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Advisory instrumentation depth. Callers gate fine-grained probes on
/// `granularity >= requested`; the ordering follows declaration order.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Granularity {
    Coarse = 0,
    Medium = 1,
    Fine = 2,
    Debug = 3,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Coarse => "coarse",
            Granularity::Medium => "medium",
            Granularity::Fine => "fine",
            Granularity::Debug => "debug",
        }
    }

    pub fn from_u8(v: u8) -> Granularity {
        match v {
            0 => Granularity::Coarse,
            1 => Granularity::Medium,
            2 => Granularity::Fine,
            _ => Granularity::Debug,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Level for subscriber setup in binaries.
    pub fn tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum OutputFormat {
    Human = 0,
    Csv = 1,
    Json = 2,
    Tsv = 3,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Human => "human",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Tsv => "tsv",
        }
    }

    pub fn from_u8(v: u8) -> OutputFormat {
        match v {
            1 => OutputFormat::Csv,
            2 => OutputFormat::Json,
            3 => OutputFormat::Tsv,
            _ => OutputFormat::Human,
        }
    }
}

/// Runtime configuration of the recorder.
///
/// Every field has a default so an empty TOML document yields a working
/// config. Primitive fields are mirrored into atomics by the recorder;
/// mutation while recording is tolerated (delayed reads, never torn).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RecorderConfig {
    /// Master switch. When false every recording call is a no-op.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    #[serde(default = "defaults::granularity")]
    pub granularity: Granularity,
    #[serde(default = "defaults::log_level")]
    pub log_level: LogLevel,
    #[serde(default = "defaults::output_format")]
    pub output_format: OutputFormat,
    /// Sink path; `None` writes to stderr.
    #[serde(default)]
    pub output_file: Option<PathBuf>,
    /// Re-drain the buffer after every published record. Expensive: each
    /// flush rewrites the whole buffer.
    #[serde(default)]
    pub flush_immediately: bool,
    #[serde(default = "defaults::track")]
    pub track_memory: bool,
    #[serde(default = "defaults::track")]
    pub track_cpu: bool,
    #[serde(default = "defaults::track")]
    pub track_threads: bool,
    /// Reserved for periodic samplers; validated but not yet consumed.
    #[serde(default = "defaults::sampling_interval_us")]
    pub sampling_interval_us: u64,
}

mod defaults {
    use super::{Granularity, LogLevel, OutputFormat};

    pub fn enabled() -> bool {
        true
    }

    pub fn granularity() -> Granularity {
        Granularity::Medium
    }

    pub fn log_level() -> LogLevel {
        LogLevel::Info
    }

    pub fn output_format() -> OutputFormat {
        OutputFormat::Human
    }

    pub fn track() -> bool {
        true
    }

    pub fn sampling_interval_us() -> u64 {
        super::DEFAULT_SAMPLING_INTERVAL_US
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            enabled: defaults::enabled(),
            granularity: defaults::granularity(),
            log_level: defaults::log_level(),
            output_format: defaults::output_format(),
            output_file: None,
            flush_immediately: false,
            track_memory: defaults::track(),
            track_cpu: defaults::track(),
            track_threads: defaults::track(),
            sampling_interval_us: defaults::sampling_interval_us(),
        }
    }
}

impl RecorderConfig {
    /// A config with recording switched off; useful as a safe baseline.
    pub fn disabled() -> Self {
        RecorderConfig {
            enabled: false,
            ..RecorderConfig::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: RecorderConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_interval_us == 0 {
            return Err(ConfigError::Invalid(
                "sampling_interval_us must be positive".into(),
            ));
        }
        if let Some(path) = &self.output_file
            && path.as_os_str().len() >= MAX_FILENAME_LEN
        {
            return Err(ConfigError::Invalid(format!(
                "output_file exceeds {MAX_FILENAME_LEN} bytes"
            )));
        }
        Ok(())
    }
}
