//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/footfall/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/footfall/` (~/.config/footfall/)
//! - Data: `$XDG_DATA_HOME/footfall/` (~/.local/share/footfall/)
//! - State/Logs: `$XDG_STATE_HOME/footfall/` (~/.local/state/footfall/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Request capture configuration
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Visit reconstruction configuration
    #[serde(default)]
    pub sessions: SessionConfig,

    /// Aggregation configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Record retention configuration
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Request capture configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Events per anonymization batch (flush threshold)
    #[serde(default = "default_capture_batch_size")]
    pub batch_size: usize,

    /// Bounded capacity of the capture channel; events beyond it are dropped
    #[serde(default = "default_capture_queue_capacity")]
    pub queue_capacity: usize,

    /// Max seconds before flushing an incomplete batch
    #[serde(default = "default_capture_flush_interval")]
    pub flush_interval_secs: u64,

    /// Max retry attempts for a failed batch write
    #[serde(default = "default_capture_max_retries")]
    pub max_retries: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            batch_size: default_capture_batch_size(),
            queue_capacity: default_capture_queue_capacity(),
            flush_interval_secs: default_capture_flush_interval(),
            max_retries: default_capture_max_retries(),
        }
    }
}

impl CaptureConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config(
                "capture.batch_size must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity < self.batch_size {
            return Err(Error::Config(
                "capture.queue_capacity must be at least capture.batch_size".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_capture_batch_size() -> usize {
    10
}

fn default_capture_queue_capacity() -> usize {
    1024
}

fn default_capture_flush_interval() -> u64 {
    5
}

fn default_capture_max_retries() -> usize {
    2
}

/// Visit reconstruction configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Minutes of inactivity separating two visits of the same client.
    /// Zero disables merging entirely: every request is its own visit.
    #[serde(default = "default_session_gap_minutes")]
    pub gap_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gap_minutes: default_session_gap_minutes(),
        }
    }
}

fn default_session_gap_minutes() -> u32 {
    30
}

/// Aggregation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// How many past months each chart covers (plus the current month)
    #[serde(default = "default_display_past_months")]
    pub display_past_months: u32,

    /// Page size for paginated loads from the repositories
    #[serde(default = "default_metrics_page_size")]
    pub page_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            display_past_months: default_display_past_months(),
            page_size: default_metrics_page_size(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.display_past_months == 0 {
            return Err(Error::Config(
                "metrics.display_past_months must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(Error::Config(
                "metrics.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_display_past_months() -> u32 {
    12
}

fn default_metrics_page_size() -> usize {
    500
}

/// Record retention configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Retention window as a multiple of the reporting window:
    /// records older than `window_multiplier * display_past_months`
    /// calendar months are swept.
    #[serde(default = "default_retention_window_multiplier")]
    pub window_multiplier: u32,

    /// Hours between sweeps; a sweep also runs at startup
    #[serde(default = "default_retention_sweep_interval")]
    pub sweep_interval_hours: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_multiplier: default_retention_window_multiplier(),
            sweep_interval_hours: default_retention_sweep_interval(),
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_multiplier == 0 {
            return Err(Error::Config(
                "retention.window_multiplier must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_hours == 0 {
            return Err(Error::Config(
                "retention.sweep_interval_hours must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_retention_window_multiplier() -> u32 {
    2
}

fn default_retention_sweep_interval() -> u64 {
    24
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.metrics.validate()?;
        self.retention.validate()?;
        Ok(())
    }

    /// Retention cutoff depth in calendar months
    pub fn retention_months(&self) -> u32 {
        self.retention.window_multiplier * self.metrics.display_past_months
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/footfall/config.toml` (~/.config/footfall/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("footfall").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/footfall/` (~/.local/share/footfall/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("footfall")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/footfall/` (~/.local/state/footfall/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("footfall")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/footfall/data.db` (~/.local/share/footfall/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/footfall/footfall.log` (~/.local/state/footfall/footfall.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("footfall.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// Mainly for host binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
