//! Human and JSON output for duetask commands.
//!
//! Every command produces one payload. With `--json` it is wrapped in an
//! envelope carrying the schema version, command name and status; otherwise
//! a [`HumanOutput`] is rendered as a header, optional rows and labelled
//! sections.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "duetask.v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    rows: Vec<String>,
    summary: Vec<(String, String)>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            rows: Vec::new(),
            summary: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    /// Free-form line printed directly under the header (task listings).
    pub fn push_row(&mut self, row: impl Into<String>) {
        self.rows.push(row.into());
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    kind: &'static str,
    error: JsonError,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: &HumanOutput,
) -> Result<()> {
    if options.json {
        let payload = SuccessEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings: &human.warnings,
            next_steps: &human.next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if !options.quiet {
        println!("{}", format_human(human));
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let payload = ErrorEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            kind: error_kind(err),
            error: JsonError::from(err),
            next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = vec![output.header.clone()];
    if !output.rows.is_empty() {
        lines.push(String::new());
        lines.extend(output.rows.iter().map(|row| format!("  {row}")));
    }

    if !output.summary.is_empty() {
        lines.push(String::new());
        for (key, value) in &output.summary {
            lines.push(format!("{key}: {value}"));
        }
    }
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next", &output.next_steps);

    lines.join("\n")
}

/// Best-effort command name for error output, read before clap parses.
pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let mut takes_value = false;
    let mut command = None;

    for arg in args.by_ref() {
        if takes_value {
            takes_value = false;
            continue;
        }
        if arg.starts_with('-') {
            takes_value = matches!(arg.as_str(), "--data-dir" | "--events");
            continue;
        }
        command = Some(arg);
        break;
    }

    let command = match command {
        Some(cmd) => canonical_command(&cmd).to_string(),
        None => return "duetask".to_string(),
    };

    if command == "settings" {
        if let Some(sub) = args.find(|arg| !arg.starts_with('-')) {
            return format!("{command} {sub}");
        }
    }
    command
}

fn canonical_command(name: &str) -> &str {
    match name {
        "done" => "toggle",
        "delete" => "rm",
        other => other,
    }
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        crate::error::exit_codes::USER_ERROR => "user_error",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    match err {
        Error::TaskNotFound(_) => vec!["duetask list".to_string()],
        Error::AmbiguousTaskId { .. } => {
            vec!["use a longer id prefix (see `duetask list`)".to_string()]
        }
        Error::DueNotInFuture(_) => vec!["pass a later --due, or a relative --in 30m".to_string()],
        Error::InvalidConfig(_) => vec!["fix duetask.toml then retry".to_string()],
        Error::LockFailed(_) => vec!["retry once other duetask processes finish".to_string()],
        Error::NoDataDir(_) => vec!["pass --data-dir or set DUETASK_DIR".to_string()],
        _ => Vec::new(),
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}
