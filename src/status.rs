//! Temporal status of a task.
//!
//! Status is derived from the wall clock on every evaluation and must never
//! be cached across time advances.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::task::Task;

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Width of the due-soon band before a task's due time.
pub fn due_soon_window() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Completed,
    Overdue,
    DueSoon,
    Normal,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Completed => "completed",
            Status::Overdue => "overdue",
            Status::DueSoon => "due-soon",
            Status::Normal => "normal",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(task: &Task, now: DateTime<Utc>) -> Status {
    if task.completed {
        return Status::Completed;
    }
    let Some(due_at) = task.due_at else {
        return Status::Normal;
    };
    let delta = due_at - now;
    if delta < Duration::zero() {
        Status::Overdue
    } else if delta < due_soon_window() {
        Status::DueSoon
    } else {
        Status::Normal
    }
}

/// "Overdue by Xh Ym", "Due in Xh Ym", or "Due in Ym" when under an hour.
///
/// `None` when the task has no due time.
pub fn format_time_remaining(task: &Task, now: DateTime<Utc>) -> Option<String> {
    let due_at = task.due_at?;
    let delta_ms = (due_at - now).num_milliseconds();
    let magnitude = delta_ms.abs();
    let hours = magnitude / MS_PER_HOUR;
    let minutes = (magnitude % MS_PER_HOUR) / MS_PER_MINUTE;

    if delta_ms < 0 {
        return Some(format!("Overdue by {hours}h {minutes}m"));
    }
    if hours == 0 {
        Some(format!("Due in {minutes}m"))
    } else {
        Some(format!("Due in {hours}h {minutes}m"))
    }
}
