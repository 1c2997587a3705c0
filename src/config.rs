//! Configuration System using Figment
//!
//! Configuration is loaded from, in increasing priority:
//! 1. built-in defaults (every field has one, so an empty file is valid)
//! 2. a TOML file (default `config/wattmeter.toml`, optional)
//! 3. environment variables prefixed with `WATTMETER_`
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Example
//! ```no_run
//! use wattmeter_daq::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Instrument: {}", settings.instrument.resource);
//! # Ok::<(), wattmeter_daq::error::DaqError>(())
//! ```

use crate::error::{AppResult, DaqError};
use crate::measurement::MeasurementBand;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/wattmeter.toml";

/// VISA resource string of the bench meter.
pub const DEFAULT_RESOURCE: &str = "USB0::0x1422::0x4480::152256401::INSTR";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Instrument connection settings
    #[serde(default)]
    pub instrument: InstrumentConfig,
    /// Interactive monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Batch logger settings
    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Colour the pretty format
    #[serde(default = "default_log_ansi")]
    pub log_ansi: bool,
    /// Include source file and line in every event
    #[serde(default)]
    pub log_file_and_line: bool,
}

/// Instrument connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// VISA resource string
    #[serde(default = "default_resource")]
    pub resource: String,
    /// Per-query timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Settling delay after reset and band selection, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Use the simulated meter instead of real hardware
    #[serde(default)]
    pub mock: bool,
}

/// Interactive monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Delay between the end of one poll and the start of the next
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// CSV file written by the monitor (truncated on start)
    #[serde(default = "default_monitor_output")]
    pub output_path: PathBuf,
    /// Number of points kept in the power history plot
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

/// Batch logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Directory receiving the time-stamped CSV files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Wall-clock logging duration in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    /// Measurement band selected before logging
    #[serde(default)]
    pub band: MeasurementBand,
    /// Seconds between progress messages
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: f64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_ansi() -> bool {
    true
}

fn default_resource() -> String {
    DEFAULT_RESOURCE.to_string()
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_monitor_output() -> PathBuf {
    PathBuf::from("data_log.csv")
}

fn default_history_len() -> usize {
    300
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_duration_secs() -> f64 {
    1800.0
}

fn default_progress_interval_secs() -> f64 {
    60.0
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_ansi: default_log_ansi(),
            log_file_and_line: false,
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            resource: default_resource(),
            timeout_ms: default_timeout_ms(),
            settle_ms: default_settle_ms(),
            mock: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            output_path: default_monitor_output(),
            history_len: default_history_len(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            duration_secs: default_duration_secs(),
            band: MeasurementBand::default(),
            progress_interval_secs: default_progress_interval_secs(),
        }
    }
}

impl Settings {
    /// Load configuration from the default file and environment variables
    ///
    /// Environment variables override the file with prefix `WATTMETER_`.
    /// Example: `WATTMETER_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file is not an
    /// error; defaults and the environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("WATTMETER_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(DaqError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if !self.instrument.mock && self.instrument.resource.trim().is_empty() {
            return Err(DaqError::Configuration(
                "instrument.resource must not be empty".to_string(),
            ));
        }

        if self.instrument.timeout_ms == 0 {
            return Err(DaqError::Configuration(
                "instrument.timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.monitor.interval_ms == 0 {
            return Err(DaqError::Configuration(
                "monitor.interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.monitor.history_len == 0 {
            return Err(DaqError::Configuration(
                "monitor.history_len must be greater than 0".to_string(),
            ));
        }

        if !is_valid_seconds(self.logger.duration_secs) {
            return Err(DaqError::Configuration(format!(
                "Invalid logger.duration_secs {}. Must be a positive number of seconds",
                self.logger.duration_secs
            )));
        }

        if !is_valid_seconds(self.logger.progress_interval_secs) {
            return Err(DaqError::Configuration(format!(
                "Invalid logger.progress_interval_secs {}",
                self.logger.progress_interval_secs
            )));
        }

        Ok(())
    }

    /// Query timeout as a `Duration`
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.instrument.timeout_ms)
    }

    /// Settling delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.instrument.settle_ms)
    }

    /// Poll interval of the monitor as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.interval_ms)
    }

    /// Batch logging duration as a `Duration`. Saturates for values that
    /// `validate` rejects.
    pub fn log_duration(&self) -> Duration {
        seconds_to_duration(self.logger.duration_secs)
    }

    /// Spacing of batch progress messages as a `Duration`
    pub fn progress_interval(&self) -> Duration {
        seconds_to_duration(self.logger.progress_interval_secs)
    }
}

/// Positive and representable as a `Duration`.
fn is_valid_seconds(secs: f64) -> bool {
    secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()
}

fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}
