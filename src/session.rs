//! Application state for one process.
//!
//! A [`Session`] owns the task store, user settings, both schedulers, the
//! notification sink and the clock. Every mutation and scheduler pass goes
//! through `&mut Session`, so they are serialized on one timeline: a
//! mutation always completes before the next sweep or deferred deletion
//! observes the store.

use std::sync::Arc;

use chrono::{DateTime, Local, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::alarm::{AlarmDelivery, AlarmScheduler, SweepReport};
use crate::clock::Clock;
use crate::config::Config;
use crate::deletion::{DeletionScheduler, Recovery};
use crate::error::Result;
use crate::events::{Event, EventKind, EventSink};
use crate::notify::{NotificationSink, Permission, Severity};
use crate::hint::{self, Hint};
use crate::settings::{AlarmSound, Settings, SettingsPatch};
use crate::status::{self, Status};
use crate::storage::KeyValueStore;
use crate::task::{Task, TaskDraft, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Manual,
    Auto,
}

pub struct Session {
    kv: Box<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    sink: Box<dyn NotificationSink>,
    events: Option<EventSink>,
    config: Config,
    settings: Settings,
    store: TaskStore,
    alarms: AlarmScheduler,
    deletions: DeletionScheduler,
    permission: Permission,
    alarms_running: bool,
}

impl Session {
    /// Load persisted state without arming anything.
    pub fn new(
        kv: Box<dyn KeyValueStore>,
        config: Config,
        clock: Arc<dyn Clock>,
        sink: Box<dyn NotificationSink>,
    ) -> Self {
        let now = clock.now();
        let settings = Settings::load(kv.as_ref());
        let store = TaskStore::load(kv.as_ref(), now);
        let alarms = AlarmScheduler::new(config.alarm_timings());
        Self {
            kv,
            clock,
            sink,
            events: None,
            config,
            settings,
            store,
            alarms,
            deletions: DeletionScheduler::new(),
            permission: Permission::Default,
            alarms_running: false,
        }
    }

    /// Load persisted state and recover deletion timers.
    pub fn open(
        kv: Box<dyn KeyValueStore>,
        config: Config,
        clock: Arc<dyn Clock>,
        sink: Box<dyn NotificationSink>,
    ) -> Result<Self> {
        let mut session = Self::new(kv, config, clock, sink);
        session.recover()?;
        Ok(session)
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.list()
    }

    pub fn deletions(&self) -> &DeletionScheduler {
        &self.deletions
    }

    pub fn alarms(&self) -> &AlarmScheduler {
        &self.alarms
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn alarms_running(&self) -> bool {
        self.alarms_running
    }

    pub fn resolve_id(&self, prefix: &str) -> Result<String> {
        self.store.resolve_id(prefix)
    }

    pub fn status_of(&self, task: &Task) -> Status {
        status::classify(task, self.now())
    }

    /// Arm timers for completed tasks and auto-delete the ones whose
    /// deadline has passed.
    pub fn recover(&mut self) -> Result<Recovery> {
        let now = self.now();
        let recovery = self
            .deletions
            .recover(self.store.list(), self.settings.delete_delay(), now);

        let mut removed_any = false;
        for id in &recovery.expired {
            removed_any |= self.remove(id, Removal::Auto).is_some();
        }
        if removed_any {
            self.persist()?;
        }
        if !recovery.armed.is_empty() || !recovery.expired.is_empty() {
            info!(
                armed = recovery.armed.len(),
                expired = recovery.expired.len(),
                "auto-delete timers recovered"
            );
        }
        Ok(recovery)
    }

    /// Request notification permission and run the first sweep.
    pub fn start_alarms(&mut self) -> SweepReport {
        self.permission = match self.sink.request_permission() {
            Ok(permission) => permission,
            Err(err) => {
                warn!(error = %err, "notification permission unavailable");
                Permission::Denied
            }
        };
        self.alarms_running = true;
        info!(permission = ?self.permission, "alarm scheduler started");
        self.sweep_alarms()
    }

    pub fn stop(&mut self) {
        if self.alarms_running {
            info!("alarm scheduler stopped");
        }
        self.alarms_running = false;
    }

    pub fn sweep_alarms(&mut self) -> SweepReport {
        let now = self.now();
        let delivery = AlarmDelivery {
            sound: self.settings.alarm.clone(),
            permission: self.permission,
            banner_duration_ms: self.config.notifications.banner_duration_ms,
        };
        let report = self
            .alarms
            .sweep(self.store.list(), now, self.sink.as_mut(), &delivery);

        for id in &report.fired {
            let data = self
                .store
                .get(id)
                .map(|task| serde_json::json!({ "title": task.title, "due_at": task.due_at }));
            self.emit_with(EventKind::AlarmFired, id, data);
        }
        for id in &report.retracted {
            self.emit_with(EventKind::AlarmRetracted, id, None);
        }
        report
    }

    pub fn create(&mut self, draft: TaskDraft) -> Result<Task> {
        let task = self.store.create(draft, self.now())?;
        self.persist()?;
        let data = serde_json::json!({
            "title": task.title,
            "priority": task.priority,
            "due_at": task.due_at,
        });
        self.emit_with(EventKind::TaskCreated, &task.id, Some(data));
        Ok(task)
    }

    /// Flip completion and arm or disarm the task's auto-delete timer.
    pub fn toggle_complete(&mut self, id: &str) -> Result<Task> {
        let task = self.store.toggle_complete(id, self.now())?;

        if let (true, Some(completed_at)) = (task.completed, task.completed_at) {
            let deadline =
                DeletionScheduler::deadline(completed_at, self.settings.delete_delay());
            match deadline {
                Some(deadline) => self.deletions.arm(&task.id, deadline),
                None => warn!(id = %task.id, "auto-delete deadline out of range; not armed"),
            }
            self.alarms.forget(&task.id);
            let message = format!(
                "Task completed! Will be auto-deleted in {} hours.",
                format_hours(self.settings.delete_delay_hours)
            );
            self.banner(&message, Severity::Success);
            self.emit_with(
                EventKind::TaskCompleted,
                &task.id,
                Some(serde_json::json!({ "delete_at": deadline })),
            );
        } else {
            self.deletions.cancel(&task.id);
            self.emit_with(EventKind::TaskReopened, &task.id, None);
        }

        self.persist()?;
        Ok(task)
    }

    /// Delete a task on user request. Deleting an absent id is a no-op.
    pub fn delete(&mut self, id: &str) -> Result<Option<Task>> {
        let removed = self.remove(id, Removal::Manual);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Apply every auto-delete whose deadline has passed.
    pub fn fire_due_deletions(&mut self) -> Result<Vec<String>> {
        let due = self.deletions.take_due(self.now());
        let mut removed = Vec::new();
        for id in due {
            match self.store.get(&id) {
                Some(task) if task.completed => {
                    if self.remove(&id, Removal::Auto).is_some() {
                        removed.push(id);
                    }
                }
                _ => debug!(id = %id, "auto-delete target already gone or reopened"),
            }
        }
        if !removed.is_empty() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Update and persist settings. Timers that are already armed keep
    /// their deadlines; a new delay applies to later completions.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<&Settings> {
        let next = patch.apply(&self.settings)?;
        next.save(self.kv.as_ref())?;
        self.settings = next;
        Ok(&self.settings)
    }

    /// Re-read tasks and settings from storage and reconcile the schedulers.
    pub fn reload(&mut self) -> Result<Recovery> {
        let now = self.now();
        self.settings = Settings::load(self.kv.as_ref());
        self.store = TaskStore::load(self.kv.as_ref(), now);

        let orphaned: Vec<String> = self
            .alarms
            .alarming_ids()
            .into_iter()
            .filter(|id| !matches!(self.store.get(id), Some(task) if !task.completed))
            .collect();
        for id in orphaned {
            self.alarms.forget(&id);
        }

        let recovery = self.recover()?;
        debug!(
            tasks = self.store.len(),
            cancelled = recovery.cancelled.len(),
            "state reloaded from storage"
        );
        Ok(recovery)
    }

    /// Earliest armed auto-delete deadline.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.deletions.next_deadline()
    }

    /// Nudge for the current task list, judged on the local wall clock.
    pub fn hint(&self) -> Option<Hint> {
        let now = self.now();
        let hour = now.with_timezone(&Local).hour();
        hint::suggest(self.store.list(), self.store.stats().completed, now, hour)
    }

    /// Play the alarm cue once with `alarm`, or with the saved alarm
    /// settings. Unlike a real alarm, a failing cue is reported.
    pub fn test_alarm_sound(&mut self, alarm: Option<&AlarmSound>) -> Result<AlarmSound> {
        let alarm = alarm.unwrap_or(&self.settings.alarm).clone();
        self.sink.play_alarm_cue(alarm.volume, &alarm.choice())?;
        debug!(sound = alarm.sound_type.as_str(), volume = alarm.volume, "test sound played");
        Ok(alarm)
    }

    fn remove(&mut self, id: &str, removal: Removal) -> Option<Task> {
        // Disarm before the store confirms removal so nothing can act on a
        // task that no longer exists.
        self.deletions.cancel(id);
        self.alarms.forget(id);
        let removed = self.store.delete(id)?;

        match removal {
            Removal::Manual => self.emit_with(EventKind::TaskDeleted, id, None),
            Removal::Auto => {
                info!(id, title = %removed.title, "completed task auto-deleted");
                self.banner("Completed task auto-deleted", Severity::Info);
                self.emit_with(EventKind::TaskAutoDeleted, id, None);
            }
        }
        Some(removed)
    }

    fn persist(&self) -> Result<()> {
        self.store.save(self.kv.as_ref())
    }

    fn banner(&mut self, message: &str, severity: Severity) {
        let duration_ms = self.config.notifications.info_duration_ms;
        if let Err(err) = self.sink.show_in_app_banner(message, severity, duration_ms) {
            warn!(error = %err, "in-app banner failed");
        }
    }

    fn emit_with(&mut self, kind: EventKind, id: &str, data: Option<serde_json::Value>) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        let mut event = Event::new(kind, id, self.clock.now());
        event.data = data;
        if let Err(err) = events.emit(&event) {
            warn!(error = %err, "failed to emit event");
        }
    }
}

/// Hours as shown to users: whole numbers without a fraction.
pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{hours:.0}")
    } else {
        let text = format!("{hours:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
