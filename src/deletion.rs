//! Deferred auto-deletion of completed tasks.
//!
//! Each completed task has at most one armed timer, keyed by task id, with
//! its deadline at `completed_at + delete delay`. Nothing beyond
//! `completed_at` is persisted; on start the timers are re-derived from the
//! stored tasks and the current delay.
//!
//! Timers are plain deadlines. The owner polls [`DeletionScheduler::take_due`]
//! (the `watch` loop sleeps until [`DeletionScheduler::next_deadline`]), so a
//! fired timer is consumed before its removal is applied and a later cancel
//! of the same id is a harmless no-op.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::task::Task;

/// Result of re-deriving timers from stored tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recovery {
    /// Timers armed by this pass, with their deadlines.
    pub armed: Vec<(String, DateTime<Utc>)>,
    /// Completed tasks whose deadline has already passed; delete them now.
    pub expired: Vec<String>,
    /// Timers dropped because their task is gone or no longer completed.
    pub cancelled: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeletionScheduler {
    timers: HashMap<String, DateTime<Utc>>,
}

impl DeletionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline for a task completed at `completed_at`, or `None` when it
    /// falls outside the representable range.
    pub fn deadline(completed_at: DateTime<Utc>, delay: Duration) -> Option<DateTime<Utc>> {
        completed_at.checked_add_signed(delay)
    }

    /// Arm (or re-arm) the timer for `id`.
    pub fn arm(&mut self, id: &str, deadline: DateTime<Utc>) {
        debug!(id, %deadline, "auto-delete armed");
        self.timers.insert(id.to_string(), deadline);
    }

    /// Disarm the timer for `id`. Returns false when nothing was armed,
    /// including when the timer already fired.
    pub fn cancel(&mut self, id: &str) -> bool {
        let removed = self.timers.remove(id).is_some();
        if removed {
            debug!(id, "auto-delete cancelled");
        }
        removed
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    pub fn deadline_for(&self, id: &str) -> Option<DateTime<Utc>> {
        self.timers.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.values().min().copied()
    }

    /// Consume every timer whose deadline is at or before `now`, earliest
    /// first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut due: Vec<(String, DateTime<Utc>)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, deadline)| (id.clone(), *deadline))
            .collect();
        due.sort_by(|left, right| left.1.cmp(&right.1).then_with(|| left.0.cmp(&right.0)));
        for (id, _) in &due {
            self.timers.remove(id);
        }
        due.into_iter().map(|(id, _)| id).collect()
    }

    /// Re-derive timers from `tasks`.
    ///
    /// Completed tasks without a timer are armed from `completed_at + delay`,
    /// or reported as expired when that deadline is not in the future.
    /// Timers that are already armed keep their deadline. Timers whose task
    /// is missing or no longer completed are cancelled.
    pub fn recover(&mut self, tasks: &[Task], delay: Duration, now: DateTime<Utc>) -> Recovery {
        let mut recovery = Recovery::default();

        let stale: Vec<String> = self
            .timers
            .keys()
            .filter(|id| !tasks.iter().any(|task| &task.id == *id && task.completed))
            .cloned()
            .collect();
        for id in stale {
            self.timers.remove(&id);
            recovery.cancelled.push(id);
        }

        for task in tasks {
            if !task.completed || self.is_armed(&task.id) {
                continue;
            }
            let Some(completed_at) = task.completed_at else {
                continue;
            };
            let Some(deadline) = Self::deadline(completed_at, delay) else {
                warn!(id = %task.id, "auto-delete deadline out of range; not armed");
                continue;
            };
            if deadline > now {
                self.arm(&task.id, deadline);
                recovery.armed.push((task.id.clone(), deadline));
            } else {
                recovery.expired.push(task.id.clone());
            }
        }

        recovery.cancelled.sort();
        recovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-18T09:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn completed(id: &str, ago: Duration) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
            priority: Priority::Low,
            completed: true,
            created_at: now() - Duration::days(1),
            completed_at: Some(now() - ago),
            due_at: None,
        }
    }

    #[test]
    fn take_due_consumes_in_deadline_order() {
        let mut scheduler = DeletionScheduler::new();
        scheduler.arm("late", now() + Duration::hours(2));
        scheduler.arm("b", now() + Duration::minutes(10));
        scheduler.arm("a", now() + Duration::minutes(5));

        assert_eq!(scheduler.next_deadline(), Some(now() + Duration::minutes(5)));
        assert!(scheduler.take_due(now()).is_empty());

        let fired = scheduler.take_due(now() + Duration::minutes(10));
        assert_eq!(fired, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(scheduler.len(), 1);
        assert!(!scheduler.cancel("a"));
    }

    #[test]
    fn cancel_disarms() {
        let mut scheduler = DeletionScheduler::new();
        scheduler.arm("a", now() + Duration::hours(1));
        assert!(scheduler.cancel("a"));
        assert!(!scheduler.cancel("a"));
        assert!(scheduler.take_due(now() + Duration::days(1)).is_empty());
    }

    #[test]
    fn recover_arms_future_and_reports_expired() {
        let mut scheduler = DeletionScheduler::new();
        let tasks = vec![
            completed("recent", Duration::hours(1)),
            completed("old", Duration::hours(2)),
        ];

        let recent = scheduler.recover(&tasks[..1], Duration::hours(12), now());
        assert_eq!(
            recent.armed,
            vec![("recent".to_string(), now() + Duration::hours(11))]
        );
        assert!(recent.expired.is_empty());

        let old = scheduler.recover(&tasks, Duration::hours(1), now());
        assert_eq!(old.expired, vec!["old".to_string()]);
        assert_eq!(
            scheduler.deadline_for("recent"),
            Some(now() + Duration::hours(11)),
            "armed timers keep their deadline"
        );
    }

    #[test]
    fn recover_treats_exact_deadline_as_expired() {
        let mut scheduler = DeletionScheduler::new();
        let tasks = vec![completed("edge", Duration::hours(3))];
        let recovery = scheduler.recover(&tasks, Duration::hours(3), now());
        assert_eq!(recovery.expired, vec!["edge".to_string()]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn unrepresentable_deadline_is_left_unarmed() {
        assert_eq!(
            DeletionScheduler::deadline(DateTime::<Utc>::MAX_UTC, Duration::hours(1)),
            None
        );

        let mut scheduler = DeletionScheduler::new();
        let mut task = completed("far", Duration::zero());
        task.completed_at = Some(DateTime::<Utc>::MAX_UTC - Duration::minutes(1));
        let recovery = scheduler.recover(&[task], Duration::hours(12), now());
        assert!(recovery.armed.is_empty());
        assert!(recovery.expired.is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn recover_cancels_stale_timers() {
        let mut scheduler = DeletionScheduler::new();
        scheduler.arm("gone", now() + Duration::hours(1));
        scheduler.arm("reopened", now() + Duration::hours(1));
        let mut reopened = completed("reopened", Duration::minutes(5));
        reopened.completed = false;
        reopened.completed_at = None;

        let recovery = scheduler.recover(&[reopened], Duration::hours(12), now());
        assert_eq!(
            recovery.cancelled,
            vec!["gone".to_string(), "reopened".to_string()]
        );
        assert!(scheduler.is_empty());
    }
}
