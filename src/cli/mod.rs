//! Command-line interface for duetask
//!
//! Clap derive definitions live here; each command group has its runner in
//! a submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::Result;
use crate::events::EventDestination;
use crate::lock::{FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::notify::TerminalSink;
use crate::output::OutputOptions;
use crate::session::Session;
use crate::storage::{FileStore, DATA_DIR_ENV};

mod settings;
mod task;
mod watch;

/// duetask - tasks with due-time alarms
///
/// Track tasks with priorities and due times. `duetask watch` raises an
/// alarm shortly before each task is due; completed tasks are deleted
/// automatically after a configurable delay.
#[derive(Parser, Debug)]
#[command(name = "duetask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit lifecycle events as JSONL to a file, or `-` for stdout
    #[arg(long, global = true, value_name = "PATH")]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a task
    Add(AddArgs),

    /// List tasks (active first, by due time)
    #[command(alias = "ls")]
    List {
        /// Only tasks that are not completed
        #[arg(long, conflicts_with = "completed")]
        active: bool,

        /// Only completed tasks
        #[arg(long)]
        completed: bool,
    },

    /// Show one task
    Show {
        /// Task id or unique prefix
        id: String,
    },

    /// Mark a task completed, or reopen a completed task
    #[command(alias = "done")]
    Toggle {
        /// Task id or unique prefix
        id: String,
    },

    /// Delete a task
    #[command(alias = "delete")]
    Rm {
        /// Task id or unique prefix
        id: String,
    },

    /// Active/completed counts and success rate
    Stats,

    /// Suggest what to focus on next
    Tip,

    /// Show or change user settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Run alarms and auto-deletion until interrupted
    Watch {
        /// Stop after this long (e.g. "90s", "2h") instead of waiting for Ctrl-C
        #[arg(long = "for", value_name = "DURATION")]
        run_for: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    /// Longer description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority: low, medium, high
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Due date and time ("YYYY-MM-DD HH:MM" or RFC 3339)
    #[arg(long)]
    pub due: Option<String>,

    /// Due date (YYYY-MM-DD); 23:59 unless --time is given
    #[arg(long)]
    pub date: Option<String>,

    /// Due time of day (HH:MM); today unless --date is given
    #[arg(long)]
    pub time: Option<String>,

    /// Due after a duration from now (e.g. "45m", "2h")
    #[arg(long = "in", value_name = "DURATION")]
    pub within: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings
    Show,

    /// Change one or more settings
    Set {
        /// Hours before a completed task is deleted
        #[arg(long)]
        delete_delay_hours: Option<f64>,

        /// Color theme: blue, green, purple, orange, red
        #[arg(long)]
        theme: Option<String>,

        /// Dark mode on or off
        #[arg(long)]
        dark_mode: Option<bool>,

        /// Alarm sound type: beep, built-in, custom
        #[arg(long)]
        sound: Option<String>,

        /// Built-in alarm sound: bell, chime, notification, alert
        #[arg(long)]
        built_in_sound: Option<String>,

        /// Custom alarm sound file (selects the custom sound type)
        #[arg(long)]
        custom_sound: Option<PathBuf>,

        /// Alarm volume between 0 and 1
        #[arg(long)]
        volume: Option<f64>,
    },

    /// Play the alarm sound once; flags preview values without saving them
    TestSound {
        /// Alarm sound type: beep, built-in, custom
        #[arg(long)]
        sound: Option<String>,

        /// Built-in alarm sound: bell, chime, notification, alert
        #[arg(long)]
        built_in_sound: Option<String>,

        /// Custom alarm sound file
        #[arg(long)]
        custom_sound: Option<PathBuf>,

        /// Volume between 0 and 1
        #[arg(long)]
        volume: Option<f64>,
    },
}

/// Global state shared by every runner.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub data_dir: Option<PathBuf>,
    pub events: Option<EventDestination>,
    pub output: OutputOptions,
}

impl Context {
    pub fn data_root(&self) -> Result<PathBuf> {
        FileStore::resolve_root(self.data_dir.clone())
    }

    /// Hold the data directory for the rest of a one-shot command.
    pub fn lock(&self) -> Result<FileLock> {
        FileStore::new(self.data_root()?).lock_data(DEFAULT_LOCK_TIMEOUT_MS)
    }

    /// Open a session over the data directory. Expired auto-deletions are
    /// applied before this returns.
    pub fn open_session(&self) -> Result<Session> {
        let root = self.data_root()?;
        let config = Config::load_from_dir(&root);
        let sink = TerminalSink::stderr(config.notifications.desktop, self.output.quiet);
        let mut session = Session::new(
            Box::new(FileStore::new(root)),
            config,
            Arc::new(SystemClock),
            Box::new(sink),
        );
        if let Some(destination) = self.events.as_ref() {
            session = session.with_events(destination.open()?);
        }
        session.recover()?;
        Ok(session)
    }
}

impl Cli {
    /// True when `--events -` claims stdout, which disables JSON output.
    pub fn events_to_stdout(&self) -> bool {
        EventDestination::parse(self.events.as_deref())
            .map(|destination| destination.is_stdout())
            .unwrap_or(false)
    }

    pub fn run(self) -> Result<()> {
        let ctx = Context {
            output: OutputOptions {
                json: self.json && !self.events_to_stdout(),
                quiet: self.quiet,
            },
            data_dir: self.data_dir,
            events: EventDestination::parse(self.events.as_deref()),
        };

        match self.command {
            Commands::Add(args) => task::run_add(&ctx, args),
            Commands::List { active, completed } => task::run_list(
                &ctx,
                task::ListFilter::from_flags(active, completed),
            ),
            Commands::Show { id } => task::run_show(&ctx, &id),
            Commands::Toggle { id } => task::run_toggle(&ctx, &id),
            Commands::Rm { id } => task::run_rm(&ctx, &id),
            Commands::Stats => task::run_stats(&ctx),
            Commands::Tip => task::run_tip(&ctx),
            Commands::Settings(cmd) => match cmd {
                SettingsCommands::Show => settings::run_show(&ctx),
                SettingsCommands::Set {
                    delete_delay_hours,
                    theme,
                    dark_mode,
                    sound,
                    built_in_sound,
                    custom_sound,
                    volume,
                } => settings::run_set(
                    &ctx,
                    settings::SetOptions {
                        delete_delay_hours,
                        theme,
                        dark_mode,
                        sound,
                        built_in_sound,
                        custom_sound,
                        volume,
                    },
                ),
                SettingsCommands::TestSound {
                    sound,
                    built_in_sound,
                    custom_sound,
                    volume,
                } => settings::run_test_sound(
                    &ctx,
                    settings::SetOptions {
                        delete_delay_hours: None,
                        theme: None,
                        dark_mode: None,
                        sound,
                        built_in_sound,
                        custom_sound,
                        volume,
                    },
                ),
            },
            Commands::Watch { run_for } => watch::run(&ctx, run_for.as_deref()),
        }
    }
}
