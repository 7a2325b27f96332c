//! Contracts consumed from the account-backed side: the remote task store and
//! the magic-code auth service.
//!
//! `db::Database` and `auth::LocalAuth` implement these over SQLite; other
//! backends only need to honor the same shapes.

use crate::error::Result;
use crate::order::OrderPatch;
use crate::types::{AuthState, Task, TaskId, TaskPatch, User};
use async_trait::async_trait;

/// Fields written by an upsert. `None` leaves the stored value untouched
/// (or takes the column default when the row is created).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub created_at: Option<i64>,
    pub order: Option<f64>,
}

impl TaskFields {
    /// Every field of `task`, with a missing order taken from `created_at`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            completed: Some(task.completed),
            created_at: Some(task.created_at),
            order: Some(task.effective_order()),
        }
    }
}

impl From<&TaskPatch> for TaskFields {
    fn from(patch: &TaskPatch) -> Self {
        Self {
            title: patch.title.clone(),
            completed: patch.completed,
            created_at: None,
            order: patch.order,
        }
    }
}

/// One operation in a remote batch, keyed by task id.
///
/// `owner` means different things per variant: an upsert links the task to
/// it, while an update or delete only touches the row if it is already
/// linked to it.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOp {
    /// Create the task, or merge into it if it exists. Used for whole tasks.
    Upsert {
        id: TaskId,
        fields: TaskFields,
        owner: Option<String>,
    },
    /// Merge into an existing task. Never creates a row.
    Update {
        id: TaskId,
        fields: TaskFields,
        owner: Option<String>,
    },
    Delete {
        id: TaskId,
        owner: Option<String>,
    },
}

impl TxOp {
    pub fn upsert(id: impl Into<TaskId>, fields: TaskFields) -> Self {
        TxOp::Upsert {
            id: id.into(),
            fields,
            owner: None,
        }
    }

    pub fn update(id: impl Into<TaskId>, fields: TaskFields) -> Self {
        TxOp::Update {
            id: id.into(),
            fields,
            owner: None,
        }
    }

    pub fn delete(id: impl Into<TaskId>) -> Self {
        TxOp::Delete {
            id: id.into(),
            owner: None,
        }
    }

    /// Link an upsert to `user_id`, or restrict an update or delete to rows
    /// `user_id` owns.
    pub fn link_owner(self, user_id: impl Into<String>) -> Self {
        let user_id = Some(user_id.into());
        match self {
            TxOp::Upsert { id, fields, .. } => TxOp::Upsert {
                id,
                fields,
                owner: user_id,
            },
            TxOp::Update { id, fields, .. } => TxOp::Update {
                id,
                fields,
                owner: user_id,
            },
            TxOp::Delete { id, .. } => TxOp::Delete { id, owner: user_id },
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TxOp::Upsert { id, .. } | TxOp::Update { id, .. } | TxOp::Delete { id, .. } => id,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        match self {
            TxOp::Upsert { owner, .. } | TxOp::Update { owner, .. } | TxOp::Delete { owner, .. } => {
                owner.as_deref()
            }
        }
    }
}

impl From<&OrderPatch> for TxOp {
    fn from(patch: &OrderPatch) -> Self {
        TxOp::update(
            patch.id.clone(),
            TaskFields {
                order: Some(patch.order),
                ..TaskFields::default()
            },
        )
    }
}

/// Queryable, batch-writable task store bound to user accounts.
///
/// A failed `transact` means "unknown completion": some operations may have
/// been applied. Callers must not assume either outcome.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Tasks linked to `owner`, or every task when `owner` is `None`.
    async fn query_tasks(&self, owner: Option<&str>) -> Result<Vec<Task>>;

    /// Apply a batch of operations, all or nothing.
    async fn transact(&self, ops: Vec<TxOp>) -> Result<()>;
}

/// Magic-code email authentication.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Issue a one-time code for `email` and hand it to the delivery channel.
    async fn send_magic_code(&self, email: &str) -> Result<()>;

    /// Exchange a code for a signed-in session.
    async fn verify_magic_code(&self, email: &str, code: &str) -> Result<User>;

    /// Current identity. `Loading` until the session has been resolved.
    fn current_user(&self) -> AuthState;

    async fn sign_out(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_task_backfills_order() {
        let task = Task {
            id: "a".into(),
            title: "Buy milk".into(),
            completed: true,
            created_at: 100,
            order: None,
        };
        let fields = TaskFields::from_task(&task);
        assert_eq!(fields.order, Some(100.0));
        assert_eq!(fields.created_at, Some(100));
        assert_eq!(fields.completed, Some(true));
    }

    #[test]
    fn link_owner_scopes_every_variant() {
        let op = TxOp::upsert("a", TaskFields::default()).link_owner("u1");
        assert!(matches!(op, TxOp::Upsert { owner: Some(ref o), .. } if o == "u1"));

        let op = TxOp::delete("a").link_owner("u1");
        assert_eq!(op.owner(), Some("u1"));
        assert_eq!(op.id(), "a");
        assert_eq!(TxOp::delete("a").owner(), None);
    }

    #[test]
    fn order_patches_become_updates() {
        let op = TxOp::from(&OrderPatch {
            id: "a".into(),
            order: 5.0,
        });
        match op {
            TxOp::Update { fields, owner, .. } => {
                assert_eq!(fields.order, Some(5.0));
                assert_eq!(fields.title, None);
                assert_eq!(owner, None);
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
