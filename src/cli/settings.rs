//! `duetask settings` implementation.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::session::format_hours;
use crate::settings::{AlarmSound, Settings, SettingsPatch, SoundChoice};

pub struct SetOptions {
    pub delete_delay_hours: Option<f64>,
    pub theme: Option<String>,
    pub dark_mode: Option<bool>,
    pub sound: Option<String>,
    pub built_in_sound: Option<String>,
    pub custom_sound: Option<PathBuf>,
    pub volume: Option<f64>,
}

impl SetOptions {
    fn into_patch(self) -> Result<SettingsPatch> {
        Ok(SettingsPatch {
            delete_delay_hours: self.delete_delay_hours,
            color_theme: self.theme.as_deref().map(str::parse).transpose()?,
            dark_mode: self.dark_mode,
            sound_type: self.sound.as_deref().map(str::parse).transpose()?,
            built_in_sound: self.built_in_sound.as_deref().map(str::parse).transpose()?,
            custom_sound: self.custom_sound,
            volume: self.volume,
        })
    }
}

pub fn run_show(ctx: &Context) -> Result<()> {
    let _lock = ctx.lock()?;
    let session = ctx.open_session()?;
    let settings = session.settings();
    let human = describe(HumanOutput::new("Settings"), settings);
    emit_success(ctx.output, "settings show", settings, &human)
}

pub fn run_set(ctx: &Context, options: SetOptions) -> Result<()> {
    let patch = options.into_patch()?;
    if patch.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to change; pass at least one setting flag".to_string(),
        ));
    }
    let delay_changed = patch.delete_delay_hours.is_some();

    let _lock = ctx.lock()?;
    let mut session = ctx.open_session()?;
    let armed = session.deletions().len();
    let settings = session.update_settings(patch)?.clone();

    let mut human = describe(HumanOutput::new("Settings updated"), &settings);
    if delay_changed && armed > 0 {
        human.push_warning(format!(
            "a running watch keeps the current auto-delete time of {armed} completed task(s) until it restarts"
        ));
    }
    emit_success(ctx.output, "settings set", &settings, &human)
}

fn describe(mut human: HumanOutput, settings: &Settings) -> HumanOutput {
    human.push_summary(
        "delete delay",
        format!("{} hours", format_hours(settings.delete_delay_hours)),
    );
    human.push_summary("theme", settings.color_theme.as_str());
    human.push_summary("dark mode", if settings.dark_mode { "on" } else { "off" });
    human.push_summary("alarm sound", settings.alarm.sound_type.as_str());
    human.push_summary("built-in sound", settings.alarm.built_in_sound.as_str());
    if let Some(path) = settings.alarm.custom_sound.as_deref() {
        human.push_summary("custom sound", path.display().to_string());
    }
    human.push_summary("volume", format!("{:.2}", settings.alarm.volume));
    human
}

#[derive(Serialize)]
struct SoundTestReport {
    #[serde(flatten)]
    alarm: AlarmSound,
    played: bool,
    saved: bool,
}

pub fn run_test_sound(ctx: &Context, options: SetOptions) -> Result<()> {
    let patch = options.into_patch()?;
    let saved = patch.is_empty();

    let _lock = ctx.lock()?;
    let mut session = ctx.open_session()?;
    let preview = if saved {
        None
    } else {
        Some(patch.apply(session.settings())?.alarm)
    };
    let alarm = session.test_alarm_sound(preview.as_ref())?;
    let played = alarm.volume > 0.0;

    let header = if played {
        "Played alarm sound"
    } else {
        "Volume is 0; nothing played"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("sound", describe_sound(&alarm));
    human.push_summary("volume", format!("{:.2}", alarm.volume));
    if !saved {
        human.push_next_step("duetask settings set ... to keep these values");
    }

    let report = SoundTestReport {
        alarm,
        played,
        saved,
    };
    emit_success(ctx.output, "settings test-sound", &report, &human)
}

fn describe_sound(alarm: &AlarmSound) -> String {
    match alarm.choice() {
        SoundChoice::Beep => "beep".to_string(),
        SoundChoice::BuiltIn(sound) => format!("built-in {}", sound.as_str()),
        SoundChoice::Custom(path) => format!("custom {}", path.display()),
    }
}
