//! CLI command definitions for task-recur
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::engine::TaskArgs;
use crate::format::SortKey;
use clap::{Args, Parser, Subcommand};

/// Personal task tracker with recurring tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Setting override as key=value, e.g. recurrence.limit=4 (repeatable)
    #[arg(long = "rc", value_name = "KEY=VALUE", global = true)]
    pub rc: Vec<String>,

    /// Answer yes to every propagation prompt
    #[arg(long, global = true, conflicts_with = "no")]
    pub yes: bool,

    /// Answer no to every propagation prompt
    #[arg(long, global = true)]
    pub no: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Scripted propagation answer, if one was given.
    pub fn scripted_answer(&self) -> Option<bool> {
        match (self.yes, self.no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task; give --recur and --due for a recurring one
    Add(AddArgs),

    /// List pending tasks, generating due recurrences first
    List(ListArgs),

    /// Count pending tasks, generating due recurrences first
    Count,

    /// Change fields of a task and, if confirmed, its later recurrences
    Modify(ModifyArgs),

    /// Delete a task and, if confirmed, its later recurrences
    Delete(IdArgs),

    /// Mark a task completed
    Done(IdArgs),

    /// Run recurrence generation and expiry without listing
    Gc,

    /// Report duplicate ids and recurring series state
    Diag(DiagArgs),
}

/// Fields shared by add and modify
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Due date: now, today, tomorrow, friday, 2026-03-01, now+2h ...
    #[arg(long)]
    pub due: Option<String>,

    /// Recurrence period: daily, weekly, weekdays, monthly, 3d, PT1H ...
    #[arg(long)]
    pub recur: Option<String>,

    /// Last date a recurrence may fall on
    #[arg(long)]
    pub until: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    /// Comma-separated tags
    #[arg(long, value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
}

impl FieldArgs {
    pub fn to_task_args(&self, description: Option<String>) -> TaskArgs {
        TaskArgs {
            description,
            due: self.due.clone(),
            recur: self.recur.clone(),
            until: self.until.clone(),
            project: self.project.clone(),
            priority: self.priority.clone(),
            tags: self.tags.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Task description
    #[arg(required = true)]
    pub description: Vec<String>,

    #[command(flatten)]
    pub fields: FieldArgs,
}

impl AddArgs {
    pub fn description(&self) -> String {
        self.description.join(" ")
    }
}

#[derive(Args, Debug)]
pub struct ModifyArgs {
    /// Task id or unique id prefix
    pub id: String,

    /// New description
    #[arg(long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    /// Task id or unique id prefix
    pub id: String,
}

/// Accepts `due`, `recur`, `entry` or `description`, optionally suffixed
/// with `+` or `-`.
fn parse_sort_key(s: &str) -> Result<SortKey, String> {
    SortKey::parse(s).ok_or_else(|| format!("unknown sort key '{}'", s))
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Sort column, e.g. `due`, `recur-`
    #[arg(long, value_parser = parse_sort_key, default_value = "due")]
    pub sort: SortKey,

    /// Sort descending regardless of the key's suffix
    #[arg(long)]
    pub desc: bool,

    /// Emit JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn sort_key(&self) -> SortKey {
        if self.desc {
            SortKey::new(self.sort.field, true)
        } else {
            self.sort
        }
    }
}

#[derive(Args, Debug)]
pub struct DiagArgs {
    /// Emit JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}
