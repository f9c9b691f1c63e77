//! Due-time alarms.
//!
//! A periodic sweep compares each open task's due time with the clock. A
//! task whose due time is within the firing window (`0 < due - now <=
//! window`) fires once per due occurrence; the fired mark is retracted when
//! the due time falls more than `grace` into the past. The sweep period must
//! stay shorter than the window so every crossing is observed.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AlarmTimings;
use crate::notify::{NotificationSink, Permission, Severity};
use crate::settings::AlarmSound;
use crate::task::Task;

const DEFAULT_NOTIFICATION_BODY: &str = "Time to complete this task!";

/// How a firing alarm is delivered.
#[derive(Debug, Clone)]
pub struct AlarmDelivery {
    pub sound: AlarmSound,
    pub permission: Permission,
    pub banner_duration_ms: u64,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub fired: Vec<String>,
    pub retracted: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty() && self.retracted.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AlarmScheduler {
    timings: AlarmTimings,
    /// Task id -> due occurrence already alarmed.
    fired: HashMap<String, DateTime<Utc>>,
}

impl AlarmScheduler {
    pub fn new(timings: AlarmTimings) -> Self {
        Self {
            timings,
            fired: HashMap::new(),
        }
    }

    pub fn timings(&self) -> AlarmTimings {
        self.timings
    }

    pub fn sweep_interval(&self) -> Duration {
        self.timings.sweep_interval
    }

    /// True while the task's alarm has fired and not yet aged out.
    pub fn is_alarming(&self, id: &str) -> bool {
        self.fired.contains_key(id)
    }

    pub fn alarming_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.fired.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop alarm state for a task that was completed or deleted.
    pub fn forget(&mut self, id: &str) -> bool {
        self.fired.remove(id).is_some()
    }

    pub fn sweep(
        &mut self,
        tasks: &[Task],
        now: DateTime<Utc>,
        sink: &mut dyn NotificationSink,
        delivery: &AlarmDelivery,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        for task in tasks {
            if task.completed {
                continue;
            }
            let Some(due_at) = task.due_at else {
                continue;
            };
            let delta = due_at - now;

            if delta > Duration::zero() && delta <= self.timings.window {
                if self.fired.get(&task.id) == Some(&due_at) {
                    debug!(id = %task.id, "alarm already fired for this due time");
                    continue;
                }
                fire(task, sink, delivery);
                self.fired.insert(task.id.clone(), due_at);
                report.fired.push(task.id.clone());
            } else if delta < -self.timings.grace && self.fired.remove(&task.id).is_some() {
                debug!(id = %task.id, "alarm aged out");
                report.retracted.push(task.id.clone());
            }
        }

        self.fired
            .retain(|id, _| tasks.iter().any(|task| &task.id == id && !task.completed));

        report
    }
}

/// Deliver one alarm. Delivery failures degrade: the banner is attempted
/// first and every failure is logged, never returned.
fn fire(task: &Task, sink: &mut dyn NotificationSink, delivery: &AlarmDelivery) {
    info!(id = %task.id, title = %task.title, "task due; firing alarm");

    let banner = format!("Task \"{}\" is due now!", task.title);
    if let Err(err) = sink.show_in_app_banner(&banner, Severity::Warning, delivery.banner_duration_ms)
    {
        warn!(id = %task.id, error = %err, "in-app banner failed");
    }

    if delivery.permission == Permission::Granted {
        let title = format!("Task Due: {}", task.title);
        let body = task
            .description
            .as_deref()
            .unwrap_or(DEFAULT_NOTIFICATION_BODY);
        if let Err(err) = sink.notify(&title, body, &task.id) {
            warn!(id = %task.id, error = %err, "OS notification failed");
        }
    } else {
        debug!(id = %task.id, permission = ?delivery.permission, "OS notification skipped");
    }

    if let Err(err) = sink.play_alarm_cue(delivery.sound.volume, &delivery.sound.choice()) {
        warn!(id = %task.id, error = %err, "alarm sound failed");
    }
}
