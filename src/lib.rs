//! duetask - tasks with due-time alarms and timed auto-deletion
//!
//! This library provides the engine behind the `duetask` CLI: a task store,
//! a temporal status classifier, an alarm scheduler that fires once as each
//! task's due time approaches, and a deletion scheduler that removes
//! completed tasks after a configurable delay.
//!
//! # Core Concepts
//!
//! - **Task Store**: the single source of truth for task existence
//! - **Status**: completed, overdue, due-soon or normal, derived from the clock
//! - **Alarm Scheduler**: periodic sweep that notifies once per due time
//! - **Deletion Scheduler**: per-task deadlines re-derived on every start
//! - **Session**: owns the store, settings, schedulers, sink and clock
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Process configuration from `duetask.toml`
//! - `settings`: User settings persisted next to the tasks
//! - `error`: Error types and result aliases
//! - `storage`: Key-value document storage
//! - `lock`: File locking and atomic writes for concurrency safety
//! - `runtime`: tokio event loop for `duetask watch`
//! - `hint`: contextual nudges shown by `tip` and `stats`

pub mod alarm;
pub mod cli;
pub mod clock;
pub mod config;
pub mod deletion;
pub mod due;
pub mod error;
pub mod events;
pub mod hint;
pub mod lock;
pub mod notify;
pub mod output;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod status;
pub mod storage;
pub mod task;

pub use error::{Error, Result};
