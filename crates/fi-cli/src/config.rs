//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use fi_core::{InputConfig, MonitorConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Seconds between focus probes.
    pub poll_interval_secs: u64,
    /// Seconds without input before the user counts as idle.
    pub idle_threshold_secs: u64,
    /// Input timestamps retained per device class.
    pub event_capacity: usize,
    /// Seconds between recorded input samples.
    pub sample_interval_secs: u64,
    /// Days of history kept by `fi prune`.
    pub retention_days: u32,
    /// Characters of window title shown in tables and logs.
    pub title_display_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("focus_insight.db"),
            poll_interval_secs: 1,
            idle_threshold_secs: 300,
            event_capacity: 60,
            sample_interval_secs: 30,
            retention_days: 30,
            title_display_width: 50,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FI_*)
        figment = figment.merge(Env::prefixed("FI_"));

        figment.extract()
    }

    /// Sleep between ticks; never below one second.
    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Tracker tuning derived from this configuration.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            input: InputConfig {
                capacity: self.event_capacity.max(1),
                idle_threshold: seconds(self.idle_threshold_secs),
            },
            sample_interval: seconds(self.sample_interval_secs),
            ..MonitorConfig::default()
        }
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Returns the platform-specific config directory for fi.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("focus-insight"))
}

/// Returns the platform-specific data directory for fi.
///
/// On Linux: `~/.local/share/focus-insight`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("focus-insight"))
}
