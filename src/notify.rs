//! Notification sinks.
//!
//! The schedulers only decide whether and when to notify; delivery of
//! in-app banners, OS notifications and audio cues happens behind
//! [`NotificationSink`]. Sink failures are the caller's to swallow.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::SoundChoice;

/// OS notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait NotificationSink: Send {
    fn request_permission(&mut self) -> Result<Permission>;

    /// Post an OS notification. Platforms deduplicate by `tag`.
    fn notify(&mut self, title: &str, body: &str, tag: &str) -> Result<()>;

    fn play_alarm_cue(&mut self, volume: f64, sound: &SoundChoice) -> Result<()>;

    fn show_in_app_banner(&mut self, message: &str, severity: Severity, duration_ms: u64)
        -> Result<()>;
}

/// Terminal delivery: banners and notifications as lines, the alarm cue as
/// the terminal bell.
pub struct TerminalSink {
    writer: Box<dyn Write + Send>,
    desktop: bool,
    quiet: bool,
}

impl TerminalSink {
    /// Write to stderr so command output on stdout stays machine-readable.
    pub fn stderr(desktop: bool, quiet: bool) -> Self {
        Self::new(Box::new(std::io::stderr()), desktop, quiet)
    }

    pub fn new(writer: Box<dyn Write + Send>, desktop: bool, quiet: bool) -> Self {
        Self {
            writer,
            desktop,
            quiet,
        }
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{text}")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl NotificationSink for TerminalSink {
    fn request_permission(&mut self) -> Result<Permission> {
        Ok(if self.desktop {
            Permission::Granted
        } else {
            Permission::Denied
        })
    }

    fn notify(&mut self, title: &str, body: &str, tag: &str) -> Result<()> {
        debug!(tag, "posting notification");
        self.line(&format!("[notification] {title}: {body}"))
    }

    fn play_alarm_cue(&mut self, volume: f64, sound: &SoundChoice) -> Result<()> {
        if volume <= 0.0 || self.quiet {
            return Ok(());
        }
        match sound {
            SoundChoice::Custom(path) if !path.exists() => {
                return Err(Error::OperationFailed(format!(
                    "custom alarm sound not found: {}",
                    path.display()
                )));
            }
            SoundChoice::Beep => {}
            other => debug!(sound = ?other, "terminal plays the bell for every sound"),
        }
        self.writer.write_all(b"\x07")?;
        self.writer.flush()?;
        Ok(())
    }

    fn show_in_app_banner(
        &mut self,
        message: &str,
        severity: Severity,
        _duration_ms: u64,
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.line(&format!("[{severity}] {message}"))
    }
}

/// One delivery recorded by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    PermissionRequested,
    Notification {
        title: String,
        body: String,
        tag: String,
    },
    AlarmCue {
        volume: f64,
        sound: SoundChoice,
    },
    Banner {
        message: String,
        severity: Severity,
        duration_ms: u64,
    },
}

#[derive(Debug)]
struct Recording {
    notices: Vec<Notice>,
    permission: Permission,
    fail_audio: bool,
    fail_notify: bool,
}

/// Sink that records deliveries. Clones share one recording.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                notices: Vec::new(),
                permission: Permission::Granted,
                fail_audio: false,
                fail_notify: false,
            })),
        }
    }

    pub fn with_permission(self, permission: Permission) -> Self {
        self.update(|rec| rec.permission = permission);
        self
    }

    /// Make audio and/or OS notification delivery fail.
    pub fn failing(self, audio: bool, notify: bool) -> Self {
        self.update(|rec| {
            rec.fail_audio = audio;
            rec.fail_notify = notify;
        });
        self
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.inner
            .lock()
            .map(|rec| rec.notices.clone())
            .unwrap_or_default()
    }

    /// Tags of posted OS notifications, in order.
    pub fn notification_tags(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Notification { tag, .. } => Some(tag),
                _ => None,
            })
            .collect()
    }

    pub fn banners(&self) -> Vec<(String, Severity)> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Banner {
                    message, severity, ..
                } => Some((message, severity)),
                _ => None,
            })
            .collect()
    }

    pub fn cue_count(&self) -> usize {
        self.notices()
            .iter()
            .filter(|notice| matches!(notice, Notice::AlarmCue { .. }))
            .count()
    }

    pub fn clear(&self) {
        self.update(|rec| rec.notices.clear());
    }

    fn update(&self, f: impl FnOnce(&mut Recording)) {
        if let Ok(mut rec) = self.inner.lock() {
            f(&mut rec);
        }
    }

    fn record(&self, notice: Notice) -> Result<()> {
        let mut rec = self
            .inner
            .lock()
            .map_err(|_| Error::OperationFailed("recording sink poisoned".to_string()))?;
        rec.notices.push(notice);
        Ok(())
    }

    fn flag(&self, f: impl FnOnce(&Recording) -> bool) -> bool {
        self.inner.lock().map(|rec| f(&rec)).unwrap_or(false)
    }
}

impl NotificationSink for RecordingSink {
    fn request_permission(&mut self) -> Result<Permission> {
        self.record(Notice::PermissionRequested)?;
        self.inner
            .lock()
            .map(|rec| rec.permission)
            .map_err(|_| Error::OperationFailed("recording sink poisoned".to_string()))
    }

    fn notify(&mut self, title: &str, body: &str, tag: &str) -> Result<()> {
        if self.flag(|rec| rec.fail_notify) {
            return Err(Error::OperationFailed("notifications unavailable".to_string()));
        }
        self.record(Notice::Notification {
            title: title.to_string(),
            body: body.to_string(),
            tag: tag.to_string(),
        })
    }

    fn play_alarm_cue(&mut self, volume: f64, sound: &SoundChoice) -> Result<()> {
        if self.flag(|rec| rec.fail_audio) {
            return Err(Error::OperationFailed("audio unavailable".to_string()));
        }
        self.record(Notice::AlarmCue {
            volume,
            sound: sound.clone(),
        })
    }

    fn show_in_app_banner(
        &mut self,
        message: &str,
        severity: Severity,
        duration_ms: u64,
    ) -> Result<()> {
        self.record(Notice::Banner {
            message: message.to_string(),
            severity,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().map(|b| b.clone()).unwrap_or_default())
                .expect("utf8")
        }
    }

    #[test]
    fn terminal_sink_writes_banner_notification_and_bell() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), true, false);

        assert_eq!(sink.request_permission().unwrap(), Permission::Granted);
        sink.show_in_app_banner("Task \"Pay rent\" is due now!", Severity::Warning, 5000)
            .unwrap();
        sink.notify("Task Due: Pay rent", "Time to complete this task!", "t1")
            .unwrap();
        sink.play_alarm_cue(0.7, &SoundChoice::Beep).unwrap();

        let text = buf.text();
        assert!(text.contains("[warning] Task \"Pay rent\" is due now!"));
        assert!(text.contains("[notification] Task Due: Pay rent: Time to complete this task!"));
        assert!(text.ends_with('\x07'));
    }

    #[test]
    fn terminal_sink_quiet_and_muted() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf.clone()), false, true);
        assert_eq!(sink.request_permission().unwrap(), Permission::Denied);
        sink.show_in_app_banner("hidden", Severity::Info, 3000).unwrap();
        sink.play_alarm_cue(0.0, &SoundChoice::Beep).unwrap();
        assert!(buf.text().is_empty());
    }

    #[test]
    fn missing_custom_sound_is_an_error() {
        let buf = SharedBuf::default();
        let mut sink = TerminalSink::new(Box::new(buf), true, false);
        let sound = SoundChoice::Custom(std::path::PathBuf::from("/nonexistent/alarm.wav"));
        assert!(sink.play_alarm_cue(0.5, &sound).is_err());
    }

    #[test]
    fn recording_sink_can_fail_on_demand() {
        let mut sink = RecordingSink::new().failing(true, false);
        assert!(sink.play_alarm_cue(0.5, &SoundChoice::Beep).is_err());
        sink.notify("t", "b", "tag").unwrap();
        assert_eq!(sink.notification_tags(), vec!["tag".to_string()]);
    }
}
