//! Output formatting for task lists.

use crate::accessor::{TaskList, TaskSource, TaskView};
use crate::types::{AuthState, Task};
use serde_json::{Value, json};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// First eight characters of an id, enough to tell tasks apart on screen.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One line per task: `1. [x] Buy milk  (0190f3a2)`.
pub fn format_task_line(position: usize, task: &Task) -> String {
    let mark = if task.completed { "x" } else { " " };
    format!(
        "{}. [{}] {}  ({})",
        position,
        mark,
        task.title,
        short_id(&task.id)
    )
}

pub fn format_list_text(list: &TaskList) -> String {
    let mut out = String::new();
    let heading = match &list.source {
        TaskSource::Guest => "Guest tasks".to_string(),
        TaskSource::Remote { .. } => "Your tasks".to_string(),
    };
    out.push_str(&format!(
        "{} ({} pending, {} done)\n",
        heading,
        list.pending_count(),
        list.completed_count()
    ));

    if list.tasks.is_empty() {
        out.push_str("  nothing here yet\n");
    }
    for (i, task) in list.tasks.iter().enumerate() {
        out.push_str("  ");
        out.push_str(&format_task_line(i + 1, task));
        out.push('\n');
    }
    out
}

pub fn list_json(list: &TaskList) -> Value {
    json!({
        "source": list.source,
        "pending": list.pending_count(),
        "completed": list.completed_count(),
        "tasks": list.tasks,
    })
}

pub fn format_view(view: &TaskView, format: OutputFormat) -> String {
    match (view, format) {
        (TaskView::Loading, OutputFormat::Text) => "Loading...\n".to_string(),
        (TaskView::Loading, OutputFormat::Json) => json!({"loading": true}).to_string(),
        (TaskView::Ready(list), OutputFormat::Text) => format_list_text(list),
        (TaskView::Ready(list), OutputFormat::Json) => list_json(list).to_string(),
    }
}

pub fn format_auth(auth: &AuthState, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match auth {
            AuthState::Loading => "Resolving session...".to_string(),
            AuthState::Anonymous => "Not signed in (guest mode)".to_string(),
            AuthState::Authenticated(user) => format!("Signed in as {} ({})", user.email, user.id),
        },
        OutputFormat::Json => match auth {
            AuthState::Loading => json!({"state": "loading"}),
            AuthState::Anonymous => json!({"state": "anonymous"}),
            AuthState::Authenticated(user) => json!({"state": "authenticated", "user": user}),
        }
        .to_string(),
    }
}
