//! Core types shared by both task stores.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Opaque task identifier. Assigned once at creation and kept across migration.
pub type TaskId = String;

/// Generate a fresh task id.
pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

/// A task as seen by the presentation layer, independent of where it is stored.
///
/// The serialized form is also the guest persistence format:
/// `{id, title, completed, createdAt, order?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl Task {
    /// Create a new, not yet completed task with `created_at = order = now`.
    pub fn new(title: impl Into<String>, now: i64) -> Self {
        Self {
            id: new_task_id(),
            title: title.into(),
            completed: false,
            created_at: now,
            order: Some(now as f64),
        }
    }

    /// The display sort key: explicit order if present, else creation time.
    pub fn effective_order(&self) -> f64 {
        effective_order(self)
    }
}

/// `order ?? createdAt`.
pub fn effective_order(task: &Task) -> f64 {
    task.order.unwrap_or(task.created_at as f64)
}

/// Total display ordering: effective order ascending, ties broken by id.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    effective_order(a)
        .total_cmp(&effective_order(b))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort tasks in place into display order.
pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(compare_tasks);
}

/// Partial update merged into an existing task. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn order(order: f64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none() && self.order.is_none()
    }

    /// Merge the set fields into `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref title) = self.title {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(order) = self.order {
            task.order = Some(order);
        }
    }
}

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

/// Who is using the app right now.
///
/// `Loading` means the identity has not been resolved yet and must not be
/// treated as signed out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Loading,
    Anonymous,
    Authenticated(User),
}

impl AuthState {
    /// The signed-in user id, if known.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated(user) if !user.id.is_empty() => Some(&user.id),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Loading)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, created_at: i64, order: Option<f64>) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_uppercase(),
            completed: false,
            created_at,
            order,
        }
    }

    #[test]
    fn effective_order_prefers_explicit_order() {
        assert_eq!(task("a", 100, Some(5.0)).effective_order(), 5.0);
        assert_eq!(task("a", 100, None).effective_order(), 100.0);
    }

    #[test]
    fn sort_uses_order_then_created_at_then_id() {
        let mut tasks = vec![
            task("c", 10, None),
            task("b", 300, Some(10.0)),
            task("a", 1, Some(50.0)),
        ];
        sort_tasks(&mut tasks);
        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn new_task_sets_created_at_and_order() {
        let t = Task::new("Buy milk", 1234);
        assert_eq!(t.created_at, 1234);
        assert_eq!(t.order, Some(1234.0));
        assert!(!t.completed);
        assert!(!t.id.is_empty());
    }

    #[test]
    fn serialized_form_uses_camel_case_and_omits_missing_order() {
        let json = serde_json::to_value(task("a", 100, None)).unwrap();
        assert_eq!(json["createdAt"], 100);
        assert!(json.get("order").is_none());

        let parsed: Task =
            serde_json::from_str(r#"{"id":"x","title":"T","completed":true,"createdAt":7}"#)
                .unwrap();
        assert_eq!(parsed.order, None);
        assert!(parsed.completed);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut t = task("a", 100, Some(1.0));
        TaskPatch::completed(true).apply_to(&mut t);
        assert!(t.completed);
        assert_eq!(t.title, "A");
        assert_eq!(t.order, Some(1.0));
    }

    #[test]
    fn auth_state_requires_user_id() {
        let empty = AuthState::Authenticated(User {
            id: String::new(),
            email: "a@b.c".into(),
        });
        assert!(!empty.is_authenticated());
        assert!(AuthState::Loading.is_loading());
        assert_eq!(AuthState::Anonymous.user_id(), None);
    }
}
