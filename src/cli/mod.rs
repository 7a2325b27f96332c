//! CLI command definitions for todo-sync
//!
//! This module defines the CLI structure using clap's derive macros.
//! Every invocation resolves identity, runs the guest migration if due,
//! executes one command, and prints the resulting list.

use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::types::Task;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Todo list that keeps guest tasks locally and moves them into your
/// account when you sign in
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "TODO_SYNC_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory for guest tasks and the session (overrides config)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Text, global = true)]
    pub format: FormatArg,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the task list (default if no subcommand given)
    List,

    /// Add a task at the end of the list
    Add {
        /// Task title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Mark a task completed
    Done {
        /// Position (1-based), id, or id prefix
        task: String,
    },

    /// Mark a task not completed
    Undo {
        /// Position (1-based), id, or id prefix
        task: String,
    },

    /// Change a task's title
    Rename {
        /// Position (1-based), id, or id prefix
        task: String,
        /// New title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },

    /// Delete a task
    Rm {
        /// Position (1-based), id, or id prefix
        task: String,
    },

    /// Move a task to a new position
    Move {
        /// Position (1-based), id, or id prefix
        task: String,
        /// Target position (1-based)
        to: usize,
    },

    /// Request a sign-in code for an email address
    Login { email: String },

    /// Sign in with the code that was sent
    Verify { email: String, code: String },

    /// Sign out and return to guest mode
    Logout,

    /// Show who is signed in
    Whoami,
}

/// Join multi-word arguments back into one title.
pub fn join_words(words: &[String]) -> String {
    words.join(" ")
}

/// Find a task by 1-based position, exact id, or unique id prefix.
pub fn resolve_task_ref<'a>(tasks: &'a [Task], reference: &str) -> Result<&'a Task> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::invalid("task", "must not be empty"));
    }

    if let Ok(position) = reference.parse::<usize>()
        && position >= 1
        && position <= tasks.len()
    {
        return Ok(&tasks[position - 1]);
    }

    if let Some(task) = tasks.iter().find(|t| t.id == reference) {
        return Ok(task);
    }

    let mut matches = tasks.iter().filter(|t| t.id.starts_with(reference));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(task),
        (Some(_), Some(_)) => Err(Error::invalid(
            "task",
            format!("'{}' matches more than one task", reference),
        )),
        (None, _) => Err(Error::invalid(
            "task",
            format!("no task matches '{}'", reference),
        )),
    }
}

/// Convert a 1-based target position into a list index, clamped to the list.
pub fn target_index(position: usize, len: usize) -> Result<usize> {
    if position == 0 {
        return Err(Error::invalid("to", "positions start at 1"));
    }
    Ok((position - 1).min(len.saturating_sub(1)))
}
