//! Contextual nudges for the task list.
//!
//! One hint is picked from the open tasks, in priority order: overdue
//! tasks, tasks due within the next half hour, high-priority tasks, then a
//! message for the time of day.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::status::{self, Status};
use crate::task::{Priority, Task};

/// How far ahead a due time counts as "coming up".
pub fn upcoming_window() -> Duration {
    Duration::minutes(30)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    Warning,
    Suggestion,
    Motivation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub kind: HintKind,
    pub text: String,
}

impl Hint {
    fn new(kind: HintKind, text: String) -> Self {
        Self { kind, text }
    }
}

/// Pick a hint for `tasks` at `now`. `local_hour` is the hour of day on the
/// user's wall clock (0-23).
pub fn suggest(
    tasks: &[Task],
    completed_count: usize,
    now: DateTime<Utc>,
    local_hour: u32,
) -> Option<Hint> {
    let open: Vec<&Task> = tasks.iter().filter(|task| !task.completed).collect();

    let overdue = open
        .iter()
        .filter(|task| status::classify(task, now) == Status::Overdue)
        .count();
    if overdue > 0 {
        return Some(Hint::new(
            HintKind::Warning,
            format!(
                "You have {overdue} overdue {}. Consider rescheduling or completing them soon!",
                plural(overdue, "task")
            ),
        ));
    }

    let upcoming = open
        .iter()
        .filter_map(|task| task.due_at)
        .filter(|due_at| {
            let delta = *due_at - now;
            delta > Duration::zero() && delta <= upcoming_window()
        })
        .count();
    if upcoming > 0 {
        return Some(Hint::new(
            HintKind::Suggestion,
            format!(
                "Heads up! You have {upcoming} {} due in the next 30 minutes.",
                plural(upcoming, "task")
            ),
        ));
    }

    let high = open
        .iter()
        .filter(|task| task.priority == Priority::High)
        .count();
    if high > 0 {
        return Some(Hint::new(
            HintKind::Suggestion,
            format!(
                "Focus tip: You have {high} high-priority {}. Consider tackling these first!",
                plural(high, "task")
            ),
        ));
    }

    let text = match local_hour {
        6..=11 => format!(
            "Good morning! Ready to tackle your {} tasks today? Start with something small to build momentum!",
            open.len()
        ),
        12..=16 => format!(
            "Afternoon energy! You've completed {completed_count} tasks. Keep the momentum going!"
        ),
        17..=20 if completed_count > 0 => {
            format!("Evening reflection: Great work today! You completed {completed_count} tasks.")
        }
        17..=20 => {
            "Evening reflection: Great work today! Consider setting up tasks for tomorrow."
                .to_string()
        }
        _ if open.is_empty() => {
            "Your task list is clear! Perfect time to plan ahead or take a well-deserved break."
                .to_string()
        }
        _ => return None,
    };
    Some(Hint::new(HintKind::Motivation, text))
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
