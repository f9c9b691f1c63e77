use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use duetask::clock::ManualClock;
use duetask::config::Config;
use duetask::notify::{RecordingSink, Severity};
use duetask::session::Session;
use duetask::settings::SettingsPatch;
use duetask::storage::{FileStore, KeyValueStore, MemoryStore, TASKS_KEY};
use duetask::task::{Priority, TaskDraft};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-10-18T09:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn open(kv: &MemoryStore, clock: &ManualClock, sink: &RecordingSink) -> Session {
    Session::open(
        Box::new(kv.clone()),
        Config::default(),
        Arc::new(clock.clone()),
        Box::new(sink.clone()),
    )
    .expect("open session")
}

fn delay_hours(hours: f64) -> SettingsPatch {
    SettingsPatch {
        delete_delay_hours: Some(hours),
        ..SettingsPatch::default()
    }
}

#[test]
fn expired_completion_is_deleted_on_start() {
    let kv = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let sink = RecordingSink::new();

    let mut first = open(&kv, &clock, &sink);
    first.update_settings(delay_hours(1.0)).expect("settings");
    let task = first.create(TaskDraft::new("Old chore")).expect("create");
    first.toggle_complete(&task.id).expect("complete");
    drop(first);

    clock.advance(Duration::hours(2));
    sink.clear();
    let second = open(&kv, &clock, &sink);

    assert!(second.store().is_empty());
    assert!(second.deletions().is_empty());
    assert_eq!(
        sink.banners(),
        vec![("Completed task auto-deleted".to_string(), Severity::Info)]
    );

    let third = open(&kv, &clock, &RecordingSink::new());
    assert!(third.store().is_empty(), "startup deletion was persisted");
}

#[test]
fn pending_completion_is_rearmed_from_completed_at() {
    let kv = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let sink = RecordingSink::new();

    let mut first = open(&kv, &clock, &sink);
    let task = first.create(TaskDraft::new("Recent chore")).expect("create");
    first.toggle_complete(&task.id).expect("complete");
    drop(first);

    clock.advance(Duration::hours(1));
    let mut second = open(&kv, &clock, &sink);
    assert!(second.store().contains(&task.id));
    assert_eq!(
        second.deletions().deadline_for(&task.id),
        Some(t0() + Duration::hours(12))
    );

    clock.set(t0() + Duration::hours(12));
    assert_eq!(
        second.fire_due_deletions().expect("fire"),
        vec![task.id.clone()]
    );
}

#[test]
fn delay_changes_do_not_move_armed_deadlines() {
    let kv = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let sink = RecordingSink::new();
    let mut session = open(&kv, &clock, &sink);

    let early = session.create(TaskDraft::new("Early")).expect("create");
    session.toggle_complete(&early.id).expect("complete");
    session.update_settings(delay_hours(1.0)).expect("settings");

    clock.advance(Duration::minutes(5));
    let late = session.create(TaskDraft::new("Late")).expect("create");
    session.toggle_complete(&late.id).expect("complete");

    assert_eq!(
        session.deletions().deadline_for(&early.id),
        Some(t0() + Duration::hours(12))
    );
    assert_eq!(
        session.deletions().deadline_for(&late.id),
        Some(t0() + Duration::minutes(5) + Duration::hours(1))
    );
    assert_eq!(session.next_wakeup(), Some(t0() + Duration::minutes(65)));
}

#[test]
fn tasks_round_trip_through_storage() {
    let kv = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let sink = RecordingSink::new();

    let mut first = open(&kv, &clock, &sink);
    first
        .create(
            TaskDraft::new("  Dentist  ")
                .with_description("  bring insurance card ")
                .with_priority(Priority::High)
                .with_due(t0() + Duration::days(2)),
        )
        .expect("create");
    let done = first.create(TaskDraft::new("Groceries")).expect("create");
    first.toggle_complete(&done.id).expect("complete");
    let before = first.tasks().to_vec();
    drop(first);

    let second = open(&kv, &clock, &sink);
    assert_eq!(second.tasks(), before.as_slice());
    assert_eq!(before[1].title, "Dentist");
    assert_eq!(before[1].description.as_deref(), Some("bring insurance card"));
}

#[test]
fn completed_without_timestamp_uses_load_time() {
    let kv = MemoryStore::new();
    kv.insert_raw(
        TASKS_KEY,
        r#"{"schema_version":"duetask.tasks.v1","tasks":[
            {"id":"01legacy","title":"Legacy","completed":true,"created_at":"2026-10-01T00:00:00Z"},
            {"id":"01legacy","title":"Duplicate","created_at":"2026-10-02T00:00:00Z"}
        ]}"#,
    );
    let clock = ManualClock::new(t0());
    let session = open(&kv, &clock, &RecordingSink::new());

    assert_eq!(session.tasks().len(), 1);
    let task = &session.tasks()[0];
    assert_eq!(task.title, "Legacy");
    assert_eq!(task.completed_at, Some(t0()));
    assert_eq!(
        session.deletions().deadline_for("01legacy"),
        Some(t0() + Duration::hours(12))
    );
}

#[test]
fn reload_reconciles_changes_from_another_process() {
    let kv = MemoryStore::new();
    let clock = ManualClock::new(t0());
    let watcher_sink = RecordingSink::new();
    let mut watcher = open(&kv, &clock, &watcher_sink);
    watcher.start_alarms();
    let mut other = open(&kv, &clock, &RecordingSink::new());

    let chore = other.create(TaskDraft::new("Chore")).expect("create");
    let due = other
        .create(TaskDraft::new("Due").with_due(t0() + Duration::seconds(45)))
        .expect("create");

    watcher.reload().expect("reload");
    watcher.sweep_alarms();
    assert!(watcher.alarms().is_alarming(&due.id));

    other.toggle_complete(&chore.id).expect("complete");
    other.delete(&due.id).expect("delete");

    let recovery = watcher.reload().expect("reload");
    assert_eq!(recovery.armed.len(), 1);
    assert!(watcher.deletions().is_armed(&chore.id));
    assert!(!watcher.alarms().is_alarming(&due.id));

    other.toggle_complete(&chore.id).expect("reopen");
    let recovery = watcher.reload().expect("reload");
    assert_eq!(recovery.cancelled, vec![chore.id.clone()]);
    assert!(watcher.deletions().is_empty());
}

#[test]
fn file_store_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = ManualClock::new(t0());
    let open_file = |clock: &ManualClock| {
        Session::open(
            Box::new(FileStore::new(dir.path().join("data"))),
            Config::default(),
            Arc::new(clock.clone()),
            Box::new(RecordingSink::new()),
        )
        .expect("open")
    };

    let mut first = open_file(&clock);
    let task = first
        .create(TaskDraft::new("Backup photos").with_due(t0() + Duration::hours(3)))
        .expect("create");
    drop(first);

    let store = FileStore::new(dir.path().join("data"));
    assert!(store.load(TASKS_KEY).expect("load").is_some());

    let second = open_file(&clock);
    assert_eq!(
        second.store().get(&task.id).map(|t| t.title.as_str()),
        Some("Backup photos")
    );
}
