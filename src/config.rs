//! Configuration loading and management
//!
//! Handles parsing of `duetask.toml` in the data directory. User-facing
//! settings (delete delay, theme, alarm sound) live in `settings` instead.

use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::due::parse_duration;
use crate::error::{Error, Result};

/// Config file name within the data directory
pub const CONFIG_FILE: &str = "duetask.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Alarm sweep configuration
    #[serde(default)]
    pub alarms: AlarmConfig,

    /// Notification delivery configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// `watch` session configuration
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Alarm sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Period between sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,

    /// How long before the due time an alarm may fire
    #[serde(default = "default_window")]
    pub window: String,

    /// How long past the due time an alarm stays active
    #[serde(default = "default_grace")]
    pub grace: String,
}

fn default_sweep_interval() -> String {
    "30s".to_string()
}

fn default_window() -> String {
    "60s".to_string()
}

fn default_grace() -> String {
    "60s".to_string()
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            sweep_interval: default_sweep_interval(),
            window: default_window(),
            grace: default_grace(),
        }
    }
}

/// Parsed alarm timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmTimings {
    pub sweep_interval: Duration,
    pub window: Duration,
    pub grace: Duration,
}

impl Default for AlarmTimings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::seconds(30),
            window: Duration::seconds(60),
            grace: Duration::seconds(60),
        }
    }
}

impl AlarmConfig {
    pub fn timings(&self) -> Result<AlarmTimings> {
        let sweep_interval = positive_duration("alarms.sweep_interval", &self.sweep_interval)?;
        let window = positive_duration("alarms.window", &self.window)?;
        let grace = positive_duration("alarms.grace", &self.grace)?;
        // A sweep period at least as long as the window could step over a crossing.
        if sweep_interval >= window {
            return Err(Error::InvalidConfig(format!(
                "alarms.sweep_interval ({}) must be shorter than alarms.window ({})",
                self.sweep_interval, self.window
            )));
        }
        Ok(AlarmTimings {
            sweep_interval,
            window,
            grace,
        })
    }
}

fn positive_duration(field: &str, raw: &str) -> Result<Duration> {
    let duration =
        parse_duration(raw).map_err(|err| Error::InvalidConfig(format!("{field}: {err}")))?;
    if duration <= Duration::zero() {
        return Err(Error::InvalidConfig(format!("{field} must be > 0")));
    }
    Ok(duration)
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Allow desktop (OS-level) notifications
    #[serde(default = "default_true")]
    pub desktop: bool,

    /// Display time for alarm banners
    #[serde(default = "default_banner_duration_ms")]
    pub banner_duration_ms: u64,

    /// Display time for other banners
    #[serde(default = "default_info_duration_ms")]
    pub info_duration_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_banner_duration_ms() -> u64 {
    5000
}

fn default_info_duration_ms() -> u64 {
    3000
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            banner_duration_ms: default_banner_duration_ms(),
            info_duration_ms: default_info_duration_ms(),
        }
    }
}

/// `watch` session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce for storage change notifications
    #[serde(default = "default_reload_debounce_ms")]
    pub reload_debounce_ms: u64,
}

fn default_reload_debounce_ms() -> u64 {
    200
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reload_debounce_ms: default_reload_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `duetask.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the data directory, or return defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parsed alarm timings; defaults when the config was not validated.
    pub fn alarm_timings(&self) -> AlarmTimings {
        self.alarms.timings().unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        self.alarms.timings()?;
        if self.notifications.banner_duration_ms == 0 || self.notifications.info_duration_ms == 0 {
            return Err(Error::InvalidConfig(
                "notifications banner durations must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.alarms.sweep_interval, "30s");
        assert_eq!(cfg.alarms.window, "60s");
        assert_eq!(cfg.alarms.grace, "60s");
        assert!(cfg.notifications.desktop);
        assert_eq!(cfg.notifications.banner_duration_ms, 5000);
        assert_eq!(cfg.notifications.info_duration_ms, 3000);
        assert_eq!(cfg.watch.reload_debounce_ms, 200);
        assert_eq!(cfg.alarm_timings(), AlarmTimings::default());
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[alarms]
sweep_interval = "10s"
window = "2m"
grace = "5m"

[notifications]
desktop = false
banner_duration_ms = 8000

[watch]
reload_debounce_ms = 50
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        let timings = cfg.alarm_timings();
        assert_eq!(timings.sweep_interval, Duration::seconds(10));
        assert_eq!(timings.window, Duration::minutes(2));
        assert_eq!(timings.grace, Duration::minutes(5));
        assert!(!cfg.notifications.desktop);
        assert_eq!(cfg.notifications.banner_duration_ms, 8000);
        assert_eq!(cfg.notifications.info_duration_ms, 3000);
        assert_eq!(cfg.watch.reload_debounce_ms, 50);
    }

    #[test]
    fn sweep_not_shorter_than_window_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[alarms]\nsweep_interval = \"60s\"\nwindow = \"60s\"")
            .expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_dir_defaults_when_missing_or_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.alarms.sweep_interval, "30s");

        fs::write(dir.path().join(CONFIG_FILE), "[alarms]\nwindow = \"bogus\"")
            .expect("write config");
        let cfg = Config::load_from_dir(dir.path());
        assert_eq!(cfg.alarms.window, "60s");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("sweep_interval = \"30s\""));
    }
}
