//! Task records and the in-memory task store.
//!
//! The store is the single source of truth for task existence. It is loaded
//! from and saved to the `tasks` key of a [`KeyValueStore`]; the schedulers
//! consult it but never bypass it.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::storage::{self, KeyValueStore, TASKS_KEY};

const TASKS_SCHEMA_VERSION: &str = "duetask.tasks.v1";

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "invalid priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

/// A tracked task.
///
/// `completed_at` is present exactly when `completed` is true. `due_at` is
/// fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

/// User input for a new task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_at: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Persisted form of the task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub schema_version: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Default for TaskSnapshot {
    fn default() -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            tasks: Vec::new(),
        }
    }
}

/// Simple counts over the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    /// Completed share of all tasks, rounded to a whole percent.
    pub success_rate: u32,
}

/// In-memory collection of tasks, newest first.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted records, repairing records that break
    /// the store invariants.
    pub fn from_tasks(tasks: Vec<Task>, now: DateTime<Utc>) -> Self {
        let mut seen = HashSet::new();
        let mut repaired = Vec::with_capacity(tasks.len());
        for mut task in tasks {
            if !seen.insert(task.id.clone()) {
                warn!(id = %task.id, "dropping duplicate task id from saved data");
                continue;
            }
            match (task.completed, task.completed_at) {
                (true, None) => {
                    warn!(id = %task.id, "completed task without completion time; using load time");
                    task.completed_at = Some(now);
                }
                (false, Some(_)) => task.completed_at = None,
                _ => {}
            }
            repaired.push(task);
        }
        Self { tasks: repaired }
    }

    /// Load the task list; absent or corrupt data yields an empty store.
    pub fn load(kv: &dyn KeyValueStore, now: DateTime<Utc>) -> Self {
        let snapshot: TaskSnapshot = storage::load_json_or_default(kv, TASKS_KEY);
        if snapshot.schema_version != TASKS_SCHEMA_VERSION {
            warn!(
                schema_version = %snapshot.schema_version,
                "unexpected task schema version; loading anyway"
            );
        }
        Self::from_tasks(snapshot.tasks, now)
    }

    /// Persist the task list.
    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        let snapshot = TaskSnapshot {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            tasks: self.tasks.clone(),
        };
        storage::save_json(kv, TASKS_KEY, &snapshot)
    }

    /// Validate `draft` and insert a new task at the front.
    ///
    /// Rejects an empty title or a due time that is not after `now`; the
    /// store is left untouched on error.
    pub fn create(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::EmptyTitle);
        }
        if let Some(due_at) = draft.due_at {
            if due_at <= now {
                return Err(Error::DueNotInFuture(due_at.to_rfc3339()));
            }
        }
        let description = draft
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let task = Task {
            id: self.generate_id(),
            title: title.to_string(),
            description,
            priority: draft.priority,
            completed: false,
            created_at: now,
            completed_at: None,
            due_at: draft.due_at,
        };
        self.tasks.insert(0, task.clone());
        Ok(task)
    }

    /// Flip completion, setting or clearing `completed_at` together.
    pub fn toggle_complete(&mut self, id: &str, now: DateTime<Utc>) -> Result<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        task.completed = !task.completed;
        task.completed_at = if task.completed { Some(now) } else { None };
        Ok(task.clone())
    }

    /// Remove a task. Removing an absent id is a no-op.
    pub fn delete(&mut self, id: &str) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| task.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Tasks in insertion order (newest first).
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolve a full id or a unique case-insensitive prefix.
    pub fn resolve_id(&self, prefix: &str) -> Result<String> {
        let needle = prefix.trim().to_ascii_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidArgument("task id cannot be empty".to_string()));
        }
        if let Some(task) = self.tasks.iter().find(|task| task.id == needle) {
            return Ok(task.id.clone());
        }
        let matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|task| task.id.to_ascii_lowercase().starts_with(&needle))
            .collect();
        match matches.as_slice() {
            [] => Err(Error::TaskNotFound(prefix.to_string())),
            [task] => Ok(task.id.clone()),
            _ => Err(Error::AmbiguousTaskId {
                prefix: prefix.to_string(),
                matches: matches.len(),
            }),
        }
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        let success_rate = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        TaskStats {
            total,
            active: total - completed,
            completed,
            success_rate,
        }
    }

    /// Display order: active tasks first, then completed tasks.
    pub fn sorted(&self) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        sort_tasks(&mut tasks);
        tasks
    }

    fn generate_id(&self) -> String {
        loop {
            let candidate = Ulid::new().to_string().to_ascii_lowercase();
            if !self.contains(&candidate) {
                return candidate;
            }
        }
    }
}

/// Active tasks by due time (undated last, then high priority first);
/// completed tasks most recently completed first.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|left, right| {
        left.completed
            .cmp(&right.completed)
            .then_with(|| {
                if left.completed {
                    right.completed_at.cmp(&left.completed_at)
                } else {
                    compare_active(left, right)
                }
            })
            .then_with(|| right.created_at.cmp(&left.created_at))
    });
}

fn compare_active(left: &Task, right: &Task) -> Ordering {
    match (left.due_at, right.due_at) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => right.priority.rank().cmp(&left.priority.rank()),
    }
}
