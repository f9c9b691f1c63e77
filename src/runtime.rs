//! Event loop for `duetask watch`.
//!
//! One current-thread tokio runtime drives the session: an interval for
//! alarm sweeps, a sleep until the next auto-delete deadline, reloads
//! requested by the storage watcher, and Ctrl-C. Every branch runs to
//! completion before the next is polled, so scheduler passes and reloads
//! never interleave. Branches that write to storage hold the data lock,
//! and auto-deletion reloads first so it never overwrites another
//! process's edits with a stale snapshot.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::alarm::SweepReport;
use crate::deletion::Recovery;
use crate::error::{Error, Result};
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to watch for changes made by other processes.
    pub watch_dir: Option<PathBuf>,
    pub reload_debounce: Duration,
    /// Stop after this long instead of waiting for Ctrl-C.
    pub run_for: Option<Duration>,
    /// Lock shared with one-shot commands; taken around storage writes.
    pub lock_path: Option<PathBuf>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            watch_dir: None,
            reload_debounce: Duration::from_millis(200),
            run_for: None,
            lock_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WatchSummary {
    pub sweeps: u64,
    pub alarms_fired: Vec<String>,
    pub alarms_retracted: Vec<String>,
    pub auto_deleted: Vec<String>,
    pub reloads: u64,
}

impl WatchSummary {
    fn record_sweep(&mut self, report: SweepReport) {
        self.sweeps += 1;
        self.alarms_fired.extend(report.fired);
        self.alarms_retracted.extend(report.retracted);
    }
}

/// Run the watch loop until Ctrl-C or `options.run_for` elapses.
pub fn run_watch(session: &mut Session, options: WatchOptions) -> Result<WatchSummary> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch_loop(session, options))
}

async fn watch_loop(session: &mut Session, options: WatchOptions) -> Result<WatchSummary> {
    let sweep_every = session
        .alarms()
        .sweep_interval()
        .to_std()
        .map_err(|_| Error::InvalidConfig("alarms.sweep_interval must be positive".to_string()))?;

    let (reload_tx, mut reload_rx) = unbounded_channel();
    if let Some(dir) = options.watch_dir.as_deref() {
        spawn_storage_watch(dir, options.reload_debounce, reload_tx);
    }

    let mut summary = WatchSummary::default();
    let first = session.start_alarms();
    summary.record_sweep(first);

    let mut interval = tokio::time::interval(sweep_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; start_alarms already swept.
    interval.tick().await;

    let stop_at = options
        .run_for
        .and_then(|limit| tokio::time::Instant::now().checked_add(limit));
    info!(
        interval_ms = sweep_every.as_millis() as u64,
        tasks = session.store().len(),
        "watch started"
    );

    loop {
        let deletion_wait = session.next_wakeup().map(|deadline| {
            (deadline - session.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        });

        tokio::select! {
            _ = interval.tick() => {
                let report = session.sweep_alarms();
                summary.record_sweep(report);
            }
            _ = sleep_for(deletion_wait) => {
                match apply_due_deletions(session, options.lock_path.as_deref()) {
                    Ok(removed) => summary.auto_deleted.extend(removed),
                    Err(err) => warn!(error = %err, "failed to persist auto-deletion"),
                }
            }
            Some(()) = reload_rx.recv() => {
                summary.reloads += 1;
                match reload_locked(session, options.lock_path.as_deref()) {
                    Ok(recovery) => {
                        summary.auto_deleted.extend(recovery.expired);
                    }
                    Err(err) => warn!(error = %err, "reload failed"),
                }
            }
            _ = sleep_until(stop_at) => {
                debug!("watch time limit reached");
                break;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    session.stop();
    info!(
        sweeps = summary.sweeps,
        fired = summary.alarms_fired.len(),
        auto_deleted = summary.auto_deleted.len(),
        "watch stopped"
    );
    Ok(summary)
}

fn lock_data(path: Option<&Path>) -> Result<Option<FileLock>> {
    path.map(|path| FileLock::acquire(path, DEFAULT_LOCK_TIMEOUT_MS))
        .transpose()
}

fn apply_due_deletions(session: &mut Session, lock_path: Option<&Path>) -> Result<Vec<String>> {
    let _lock = lock_data(lock_path)?;
    let mut removed = session.reload()?.expired;
    removed.extend(session.fire_due_deletions()?);
    Ok(removed)
}

fn reload_locked(session: &mut Session, lock_path: Option<&Path>) -> Result<Recovery> {
    let _lock = lock_data(lock_path)?;
    session.reload()
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(wait) => tokio::time::sleep(wait).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Stored documents trigger a reload; lock files and in-flight temp files
/// do not.
fn is_storage_document(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }
    name.ends_with(".json")
}

fn spawn_storage_watch(dir: &Path, debounce: Duration, reload_tx: UnboundedSender<()>) {
    if !dir.exists() {
        debug!(dir = %dir.display(), "data directory missing; live reload disabled");
        return;
    }
    let dir = dir.to_path_buf();

    thread::spawn(move || {
        let (event_tx, event_rx) = mpsc::channel();
        let watcher: notify::Result<RecommendedWatcher> = notify::recommended_watcher(move |res| {
            let _ = event_tx.send(res);
        });
        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!(error = %err, "storage watcher unavailable");
                return;
            }
        };
        if let Err(err) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            warn!(dir = %dir.display(), error = %err, "cannot watch data directory");
            return;
        }

        let mut pending: Option<Instant> = None;
        loop {
            let timeout = pending
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(3600));
            match event_rx.recv_timeout(timeout) {
                Ok(Ok(event)) => {
                    if event.paths.iter().any(|path| is_storage_document(path)) {
                        pending = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => warn!(error = %err, "storage watch error"),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if pending.take().is_some() && reload_tx.send(()).is_err() {
                        break;
                    }
                    if reload_tx.is_closed() {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}
