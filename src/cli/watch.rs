//! `duetask watch`: the long-running session that owns the schedulers.

use crate::cli::Context;
use crate::due::parse_duration;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::runtime::{run_watch, WatchOptions};
use crate::storage::FileStore;

pub fn run(ctx: &Context, run_for: Option<&str>) -> Result<()> {
    let run_for = run_for
        .map(|raw| {
            parse_duration(raw)?
                .to_std()
                .map_err(|_| Error::InvalidArgument(format!("--for must be positive, got '{raw}'")))
        })
        .transpose()?;

    let root = ctx.data_root()?;
    std::fs::create_dir_all(&root)?;

    let mut session = {
        let _lock = ctx.lock()?;
        ctx.open_session()?
    };
    let options = WatchOptions {
        lock_path: Some(FileStore::new(&root).data_lock_path()),
        watch_dir: Some(root),
        reload_debounce: std::time::Duration::from_millis(
            session.config().watch.reload_debounce_ms,
        ),
        run_for,
    };

    if !ctx.output.quiet && !ctx.output.json {
        eprintln!(
            "watching {} task(s); press Ctrl-C to stop",
            session.store().len()
        );
    }
    let summary = run_watch(&mut session, options)?;

    let mut human = HumanOutput::new("Watch stopped");
    human.push_summary("sweeps", summary.sweeps.to_string());
    human.push_summary("alarms fired", summary.alarms_fired.len().to_string());
    human.push_summary("auto-deleted", summary.auto_deleted.len().to_string());
    if summary.reloads > 0 {
        human.push_summary("reloads", summary.reloads.to_string());
    }
    emit_success(ctx.output, "watch", &summary, &human)
}
