pub mod config;

pub use config::{
    ConfigError, DEFAULT_SAMPLING_INTERVAL_US, Granularity, LogLevel, MAX_FILENAME_LEN,
    OutputFormat, RecorderConfig,
};
