//! User settings persisted under the `settings` key.
//!
//! Missing or unparseable settings load as defaults; a partially valid
//! document keeps whatever fields it has.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::{self, KeyValueStore, SETTINGS_KEY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Hours after completion before a completed task is auto-deleted
    #[serde(default = "default_delete_delay_hours")]
    pub delete_delay_hours: f64,

    #[serde(default)]
    pub color_theme: ColorTheme,

    #[serde(default)]
    pub dark_mode: bool,

    #[serde(default)]
    pub alarm: AlarmSound,
}

fn default_delete_delay_hours() -> f64 {
    12.0
}

/// Longest accepted auto-delete delay: one year.
pub const MAX_DELETE_DELAY_HOURS: f64 = 8_760.0;

impl Default for Settings {
    fn default() -> Self {
        Self {
            delete_delay_hours: default_delete_delay_hours(),
            color_theme: ColorTheme::default(),
            dark_mode: false,
            alarm: AlarmSound::default(),
        }
    }
}

impl Settings {
    /// Load settings; invalid values are replaced by defaults.
    pub fn load(kv: &dyn KeyValueStore) -> Self {
        let settings: Settings = storage::load_json_or_default(kv, SETTINGS_KEY);
        match settings.validate() {
            Ok(()) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "saved settings invalid; using defaults");
                Settings::default()
            }
        }
    }

    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        self.validate()?;
        storage::save_json(kv, SETTINGS_KEY, self)
    }

    pub fn validate(&self) -> Result<()> {
        validate_delete_delay(self.delete_delay_hours)?;
        validate_volume(self.alarm.volume)?;
        if self.alarm.sound_type == SoundType::Custom && self.alarm.custom_sound.is_none() {
            return Err(Error::InvalidArgument(
                "custom alarm sound requires a sound file".to_string(),
            ));
        }
        Ok(())
    }

    /// Auto-delete delay as a duration, millisecond precision.
    pub fn delete_delay(&self) -> Duration {
        let hours = self.delete_delay_hours.clamp(0.0, MAX_DELETE_DELAY_HOURS);
        Duration::milliseconds((hours * 3_600_000.0).round() as i64)
    }
}

pub fn validate_delete_delay(hours: f64) -> Result<()> {
    if hours.is_finite() && hours > 0.0 && hours <= MAX_DELETE_DELAY_HOURS {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "delete delay must be more than 0 and at most {MAX_DELETE_DELAY_HOURS} hours, got {hours}"
        )))
    }
}

pub fn validate_volume(volume: f64) -> Result<()> {
    if (0.0..=1.0).contains(&volume) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "volume must be between 0 and 1, got {volume}"
        )))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTheme {
    #[default]
    Blue,
    Green,
    Purple,
    Orange,
    Red,
}

impl ColorTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorTheme::Blue => "blue",
            ColorTheme::Green => "green",
            ColorTheme::Purple => "purple",
            ColorTheme::Orange => "orange",
            ColorTheme::Red => "red",
        }
    }
}

impl fmt::Display for ColorTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorTheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(ColorTheme::Blue),
            "green" => Ok(ColorTheme::Green),
            "purple" => Ok(ColorTheme::Purple),
            "orange" => Ok(ColorTheme::Orange),
            "red" => Ok(ColorTheme::Red),
            other => Err(Error::InvalidArgument(format!(
                "invalid color theme '{other}' (expected blue|green|purple|orange|red)"
            ))),
        }
    }
}

/// Alarm audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmSound {
    #[serde(default)]
    pub sound_type: SoundType,

    #[serde(default)]
    pub built_in_sound: BuiltInSound,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_sound: Option<PathBuf>,

    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    0.7
}

impl Default for AlarmSound {
    fn default() -> Self {
        Self {
            sound_type: SoundType::default(),
            built_in_sound: BuiltInSound::default(),
            custom_sound: None,
            volume: default_volume(),
        }
    }
}

/// What the alarm cue should play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundChoice {
    Beep,
    BuiltIn(BuiltInSound),
    Custom(PathBuf),
}

impl AlarmSound {
    pub fn choice(&self) -> SoundChoice {
        match (self.sound_type, &self.custom_sound) {
            (SoundType::Custom, Some(path)) => SoundChoice::Custom(path.clone()),
            (SoundType::BuiltIn, _) => SoundChoice::BuiltIn(self.built_in_sound),
            _ => SoundChoice::Beep,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundType {
    #[default]
    Beep,
    BuiltIn,
    Custom,
}

impl SoundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundType::Beep => "beep",
            SoundType::BuiltIn => "built_in",
            SoundType::Custom => "custom",
        }
    }
}

impl FromStr for SoundType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "beep" => Ok(SoundType::Beep),
            "built_in" | "builtin" => Ok(SoundType::BuiltIn),
            "custom" => Ok(SoundType::Custom),
            other => Err(Error::InvalidArgument(format!(
                "invalid sound type '{other}' (expected beep|built-in|custom)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltInSound {
    #[default]
    Bell,
    Chime,
    Notification,
    Alert,
}

impl BuiltInSound {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltInSound::Bell => "bell",
            BuiltInSound::Chime => "chime",
            BuiltInSound::Notification => "notification",
            BuiltInSound::Alert => "alert",
        }
    }
}

impl FromStr for BuiltInSound {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bell" => Ok(BuiltInSound::Bell),
            "chime" => Ok(BuiltInSound::Chime),
            "notification" => Ok(BuiltInSound::Notification),
            "alert" => Ok(BuiltInSound::Alert),
            other => Err(Error::InvalidArgument(format!(
                "invalid built-in sound '{other}' (expected bell|chime|notification|alert)"
            ))),
        }
    }
}

/// Partial update applied by `settings set`.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub delete_delay_hours: Option<f64>,
    pub color_theme: Option<ColorTheme>,
    pub dark_mode: Option<bool>,
    pub sound_type: Option<SoundType>,
    pub built_in_sound: Option<BuiltInSound>,
    pub custom_sound: Option<PathBuf>,
    pub volume: Option<f64>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.delete_delay_hours.is_none()
            && self.color_theme.is_none()
            && self.dark_mode.is_none()
            && self.sound_type.is_none()
            && self.built_in_sound.is_none()
            && self.custom_sound.is_none()
            && self.volume.is_none()
    }

    /// Apply onto `settings`, returning the validated result.
    pub fn apply(self, settings: &Settings) -> Result<Settings> {
        let mut next = settings.clone();
        if let Some(hours) = self.delete_delay_hours {
            next.delete_delay_hours = hours;
        }
        if let Some(theme) = self.color_theme {
            next.color_theme = theme;
        }
        if let Some(dark) = self.dark_mode {
            next.dark_mode = dark;
        }
        if let Some(path) = self.custom_sound {
            next.alarm.custom_sound = Some(path);
            next.alarm.sound_type = SoundType::Custom;
        }
        if let Some(sound_type) = self.sound_type {
            next.alarm.sound_type = sound_type;
        }
        if let Some(sound) = self.built_in_sound {
            next.alarm.built_in_sound = sound;
        }
        if let Some(volume) = self.volume {
            next.alarm.volume = volume;
        }
        next.validate()?;
        Ok(next)
    }
}
