//! Task queries and batch writes.

use super::{Database, now_ms};
use crate::remote::{RemoteStore, TxOp};
use crate::subscriptions::ChangeEvent;
use crate::types::Task;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeSet;
use tracing::debug;

const TASK_COLUMNS: &str = "id, title, completed, created_at, sort_order";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        completed: row.get("completed")?,
        created_at: row.get("created_at")?,
        order: row.get("sort_order")?,
    })
}

/// Apply one operation inside an open transaction.
///
/// An upsert that collides with another owner's task, or an update that
/// matches no row, fails the whole batch.
fn apply_op(conn: &Connection, op: &TxOp) -> Result<()> {
    match op {
        TxOp::Upsert { id, fields, owner } => {
            let changed = conn.execute(
                "INSERT INTO tasks (id, title, completed, created_at, sort_order, owner_id)
                 VALUES (?1, COALESCE(?2, ''), COALESCE(?3, 0), COALESCE(?4, ?7), ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    title = COALESCE(?2, title),
                    completed = COALESCE(?3, completed),
                    created_at = COALESCE(?4, created_at),
                    sort_order = COALESCE(?5, sort_order),
                    owner_id = COALESCE(?6, owner_id)
                 WHERE ?6 IS NULL OR owner_id IS NULL OR owner_id = ?6",
                params![
                    id,
                    fields.title,
                    fields.completed,
                    fields.created_at,
                    fields.order,
                    owner,
                    now_ms(),
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("task {} belongs to another account", id));
            }
        }
        TxOp::Update { id, fields, owner } => {
            let changed = conn.execute(
                "UPDATE tasks SET
                    title = COALESCE(?2, title),
                    completed = COALESCE(?3, completed),
                    created_at = COALESCE(?4, created_at),
                    sort_order = COALESCE(?5, sort_order)
                 WHERE id = ?1 AND (?6 IS NULL OR owner_id = ?6)",
                params![
                    id,
                    fields.title,
                    fields.completed,
                    fields.created_at,
                    fields.order,
                    owner,
                ],
            )?;
            if changed == 0 {
                return Err(anyhow!("task not found: {}", id));
            }
        }
        TxOp::Delete { id, owner } => {
            // Deleting a missing task is a no-op
            conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND (?2 IS NULL OR owner_id = ?2)",
                params![id, owner],
            )?;
        }
    }
    Ok(())
}

impl Database {
    /// Tasks linked to `owner`, or all tasks.
    pub fn list_tasks(&self, owner: Option<&str>) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let tasks = match owner {
                Some(owner) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1
                         ORDER BY created_at, id"
                    ))?;
                    stmt.query_map(params![owner], parse_task_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at, id"
                    ))?;
                    stmt.query_map([], parse_task_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(tasks)
        })
    }

    /// Get a task by ID.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;

            match stmt.query_row(params![task_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Owner linked to a task, if any.
    pub fn task_owner(&self, task_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            match conn.query_row(
                "SELECT owner_id FROM tasks WHERE id = ?1",
                params![task_id],
                |row| row.get::<_, Option<String>>(0),
            ) {
                Ok(owner) => Ok(owner),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Apply a batch of operations in one SQLite transaction.
    ///
    /// Either every operation commits or none does. A change event is
    /// published after commit.
    pub fn apply_batch(&self, ops: &[TxOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for op in ops {
                apply_op(&tx, op)?;
            }
            tx.commit()?;
            Ok(())
        })?;

        let owners: BTreeSet<&str> = ops.iter().filter_map(TxOp::owner).collect();
        let owner = match (owners.len(), owners.iter().next()) {
            (1, Some(owner)) => Some(owner.to_string()),
            _ => None,
        };

        debug!(ops = ops.len(), owner = ?owner, "Committed task batch");
        self.feed().publish(ChangeEvent::remote(owner));
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for Database {
    async fn query_tasks(&self, owner: Option<&str>) -> crate::error::Result<Vec<Task>> {
        Ok(self.list_tasks(owner)?)
    }

    async fn transact(&self, ops: Vec<TxOp>) -> crate::error::Result<()> {
        Ok(self.apply_batch(&ops)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::TaskFields;
    use crate::types::TaskPatch;

    fn db_with_user(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(id, &format!("{id}@example.com")).unwrap();
        db
    }

    fn full(title: &str, created_at: i64) -> TaskFields {
        TaskFields {
            title: Some(title.into()),
            completed: Some(false),
            created_at: Some(created_at),
            order: Some(created_at as f64),
        }
    }

    #[test]
    fn upsert_creates_then_merges() {
        let db = db_with_user("u1");
        db.apply_batch(&[TxOp::upsert("t1", full("Buy milk", 100)).link_owner("u1")])
            .unwrap();

        db.apply_batch(&[TxOp::upsert(
            "t1",
            TaskFields {
                completed: Some(true),
                ..TaskFields::default()
            },
        )])
        .unwrap();

        let task = db.get_task("t1").unwrap().unwrap();
        assert_eq!(task.title, "Buy milk");
        assert!(task.completed);
        assert_eq!(task.order, Some(100.0));
        assert_eq!(db.task_owner("t1").unwrap().as_deref(), Some("u1"));
    }

    #[test]
    fn list_filters_by_owner() {
        let db = db_with_user("u1");
        db.insert_user("u2", "u2@example.com").unwrap();
        db.apply_batch(&[
            TxOp::upsert("a", full("A", 1)).link_owner("u1"),
            TxOp::upsert("b", full("B", 2)).link_owner("u2"),
            TxOp::upsert("c", full("C", 3)),
        ])
        .unwrap();

        let mine = db.list_tasks(Some("u1")).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "a");
        assert_eq!(db.list_tasks(None).unwrap().len(), 3);
    }

    #[test]
    fn failed_batch_rolls_back() {
        let db = db_with_user("u1");
        let result = db.apply_batch(&[
            TxOp::upsert("a", full("A", 1)).link_owner("u1"),
            // Unknown owner violates the foreign key
            TxOp::upsert("b", full("B", 2)).link_owner("ghost"),
        ]);
        assert!(result.is_err());
        assert!(db.get_task("a").unwrap().is_none());
    }

    #[test]
    fn delete_removes_row() {
        let db = db_with_user("u1");
        db.apply_batch(&[TxOp::upsert("a", full("A", 1)).link_owner("u1")])
            .unwrap();
        db.apply_batch(&[TxOp::delete("a"), TxOp::delete("missing")])
            .unwrap();
        assert!(db.get_task("a").unwrap().is_none());
    }

    fn db_with_two_owners() -> Database {
        let db = db_with_user("u1");
        db.insert_user("u2", "u2@example.com").unwrap();
        db.apply_batch(&[TxOp::upsert("b", full("Walk dog", 1)).link_owner("u2")])
            .unwrap();
        db
    }

    #[test]
    fn scoped_writes_leave_other_owners_tasks_alone() {
        let db = db_with_two_owners();
        let rename = TxOp::update("b", TaskFields::from(&TaskPatch::title("mine now")));

        assert!(db.apply_batch(&[rename.link_owner("u1")]).is_err());
        db.apply_batch(&[TxOp::delete("b").link_owner("u1")])
            .unwrap();

        let task = db.get_task("b").unwrap().unwrap();
        assert_eq!(task.title, "Walk dog");
        assert_eq!(db.task_owner("b").unwrap().as_deref(), Some("u2"));
    }

    #[test]
    fn scoped_writes_reach_own_tasks() {
        let db = db_with_two_owners();
        db.apply_batch(&[
            TxOp::update("b", TaskFields::from(&TaskPatch::completed(true))).link_owner("u2"),
        ])
        .unwrap();
        assert!(db.get_task("b").unwrap().unwrap().completed);

        db.apply_batch(&[TxOp::delete("b").link_owner("u2")])
            .unwrap();
        assert!(db.get_task("b").unwrap().is_none());
    }

    #[test]
    fn update_of_unknown_task_creates_nothing() {
        let db = db_with_user("u1");
        let toggle = TxOp::update("ghost", TaskFields::from(&TaskPatch::completed(true)));
        assert!(db.apply_batch(&[toggle.link_owner("u1")]).is_err());
        assert!(db.get_task("ghost").unwrap().is_none());
    }

    #[test]
    fn upsert_cannot_take_over_another_owners_task() {
        let db = db_with_two_owners();
        let result = db.apply_batch(&[
            TxOp::upsert("a", full("A", 1)).link_owner("u1"),
            TxOp::upsert("b", full("Taken", 2)).link_owner("u1"),
        ]);
        assert!(result.is_err());
        assert!(db.get_task("a").unwrap().is_none());
        assert_eq!(db.get_task("b").unwrap().unwrap().title, "Walk dog");
    }

    #[tokio::test]
    async fn commit_publishes_owner_event() {
        let db = db_with_user("u1");
        let mut rx = db.feed().subscribe();
        db.transact(vec![TxOp::upsert("a", full("A", 1)).link_owner("u1")])
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ChangeEvent::remote(Some("u1".into()))
        );
    }
}
