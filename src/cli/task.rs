//! Task command implementations: add, list, show, toggle, rm, stats, tip.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::cli::{AddArgs, Context};
use crate::due::DueInput;
use crate::error::Result;
use crate::hint::Hint;
use crate::output::{emit_success, HumanOutput};
use crate::session::{format_hours, Session};
use crate::status::{self, Status};
use crate::task::{Priority, Task, TaskDraft, TaskStats};

const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Active,
    Completed,
}

impl ListFilter {
    pub fn from_flags(active: bool, completed: bool) -> Self {
        match (active, completed) {
            (true, _) => ListFilter::Active,
            (_, true) => ListFilter::Completed,
            _ => ListFilter::All,
        }
    }

    fn keeps(&self, task: &Task) -> bool {
        match self {
            ListFilter::All => true,
            ListFilter::Active => !task.completed,
            ListFilter::Completed => task.completed,
        }
    }
}

/// A task plus everything derived from the clock and the schedulers.
#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delete_at: Option<DateTime<Utc>>,
}

impl<'a> TaskView<'a> {
    fn new(session: &Session, task: &'a Task) -> Self {
        let now = session.now();
        Self {
            task,
            status: status::classify(task, now),
            time_remaining: if task.completed {
                None
            } else {
                status::format_time_remaining(task, now)
            },
            delete_at: session.deletions().deadline_for(&task.id),
        }
    }

    fn row(&self) -> String {
        let mark = if self.task.completed { "[x]" } else { "[ ]" };
        let mut row = format!(
            "{}  {mark} {}  ({})",
            short_id(&self.task.id),
            self.task.title,
            self.task.priority
        );
        match (&self.time_remaining, self.status) {
            (Some(remaining), Status::Overdue | Status::DueSoon) => {
                row.push_str(&format!("  {}: {remaining}", self.status));
            }
            (Some(remaining), _) => row.push_str(&format!("  {remaining}")),
            (None, _) => {}
        }
        row
    }
}

#[derive(Serialize)]
struct ListReport<'a> {
    tasks: Vec<TaskView<'a>>,
    stats: TaskStats,
}

#[derive(Serialize)]
struct ToggleReport<'a> {
    #[serde(flatten)]
    task: TaskView<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delete_delay_hours: Option<f64>,
}

#[derive(Serialize)]
struct StatsReport {
    #[serde(flatten)]
    stats: TaskStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<Hint>,
}

#[derive(Serialize)]
struct RemoveReport {
    id: String,
    title: String,
}

pub fn run_add(ctx: &Context, args: AddArgs) -> Result<()> {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session()?;

    let due = DueInput {
        due: args.due,
        date: args.date,
        time: args.time,
        within: args.within,
    };
    let mut draft = TaskDraft::new(args.title);
    if let Some(due_at) = due.resolve(session.now())? {
        draft = draft.with_due(due_at);
    }
    if let Some(raw) = args.priority.as_deref() {
        draft = draft.with_priority(raw.parse::<Priority>()?);
    }
    if let Some(description) = args.description {
        draft = draft.with_description(description);
    }

    let task = session.create(draft)?;
    let view = TaskView::new(&session, &task);

    let mut human = HumanOutput::new(format!("Added task {}", short_id(&task.id)));
    human.push_summary("title", &task.title);
    human.push_summary("priority", task.priority.as_str());
    if let Some(due_at) = task.due_at {
        human.push_summary("due", format_local(due_at));
    }
    if task.due_at.is_some() {
        human.push_next_step("duetask watch (alarms fire only while watch runs)");
    }

    emit_success(ctx.output, "add", &view, &human)
}

pub fn run_list(ctx: &Context, filter: ListFilter) -> Result<()> {
    let _lock = ctx.lock()?;
    let session = ctx.open_session()?;
    let sorted = session.store().sorted();
    let tasks: Vec<TaskView> = sorted
        .iter()
        .filter(|task| filter.keeps(task))
        .map(|task| TaskView::new(&session, task))
        .collect();
    let stats = session.store().stats();

    let header = match tasks.len() {
        0 => "No tasks".to_string(),
        1 => "1 task".to_string(),
        n => format!("{n} tasks"),
    };
    let mut human = HumanOutput::new(header);
    for view in &tasks {
        human.push_row(view.row());
    }
    if session.store().is_empty() {
        human.push_next_step("duetask add \"Title\" --in 45m");
    }

    emit_success(ctx.output, "list", &ListReport { tasks, stats }, &human)
}

pub fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let _lock = ctx.lock()?;
    let session = ctx.open_session()?;
    let id = session.resolve_id(id)?;
    let Some(task) = session.store().get(&id) else {
        return Err(crate::error::Error::TaskNotFound(id));
    };
    let view = TaskView::new(&session, task);

    let mut human = HumanOutput::new(task.title.clone());
    human.push_summary("id", &task.id);
    human.push_summary("status", view.status.as_str());
    human.push_summary("priority", task.priority.as_str());
    if let Some(description) = task.description.as_deref() {
        human.push_summary("description", description);
    }
    human.push_summary("created", format_local(task.created_at));
    if let Some(due_at) = task.due_at {
        human.push_summary("due", format_local(due_at));
    }
    if let Some(remaining) = view.time_remaining.as_deref() {
        human.push_summary("remaining", remaining);
    }
    if let Some(completed_at) = task.completed_at {
        human.push_summary("completed", format_local(completed_at));
    }
    if let Some(delete_at) = view.delete_at {
        human.push_summary("auto-delete", format_local(delete_at));
    }

    emit_success(ctx.output, "show", &view, &human)
}

pub fn run_toggle(ctx: &Context, id: &str) -> Result<()> {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session()?;
    let id = session.resolve_id(id)?;
    let task = session.toggle_complete(&id)?;
    let hours = session.settings().delete_delay_hours;

    let report = ToggleReport {
        task: TaskView::new(&session, &task),
        delete_delay_hours: task.completed.then_some(hours),
    };

    let mut human = if task.completed {
        HumanOutput::new(format!("Completed {}", task.title))
    } else {
        HumanOutput::new(format!("Reopened {}", task.title))
    };
    if let Some(delete_at) = report.task.delete_at {
        human.push_summary(
            "auto-delete",
            format!("{} (in {} hours)", format_local(delete_at), format_hours(hours)),
        );
        human.push_next_step(format!("duetask toggle {} to reopen", short_id(&task.id)));
    }

    emit_success(ctx.output, "toggle", &report, &human)
}

pub fn run_rm(ctx: &Context, id: &str) -> Result<()> {
    let _lock = ctx.lock()?;
    let mut session = ctx.open_session()?;
    let id = session.resolve_id(id)?;
    let removed = session.delete(&id)?;

    let report = RemoveReport {
        title: removed.map(|task| task.title).unwrap_or_default(),
        id,
    };
    let human = HumanOutput::new(format!("Deleted {}", report.title));
    emit_success(ctx.output, "rm", &report, &human)
}

pub fn run_stats(ctx: &Context) -> Result<()> {
    let _lock = ctx.lock()?;
    let session = ctx.open_session()?;
    let report = StatsReport {
        stats: session.store().stats(),
        hint: session.hint(),
    };

    let mut human = HumanOutput::new("Task stats");
    human.push_summary("active", report.stats.active.to_string());
    human.push_summary("completed", report.stats.completed.to_string());
    human.push_summary("success rate", format!("{}%", report.stats.success_rate));
    if let Some(hint) = report.hint.as_ref() {
        human.push_summary("tip", &hint.text);
    }

    emit_success(ctx.output, "stats", &report, &human)
}

pub fn run_tip(ctx: &Context) -> Result<()> {
    let _lock = ctx.lock()?;
    let session = ctx.open_session()?;
    let hint = session.hint();

    let human = match hint.as_ref() {
        Some(hint) => HumanOutput::new(hint.text.clone()),
        None => HumanOutput::new("No tip right now"),
    };
    emit_success(ctx.output, "tip", &hint, &human)
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
