//! Guest task store.
//!
//! Keeps anonymous tasks as one JSON array under a single storage entry.
//! Reads fail soft: an unreadable or malformed entry is logged and treated as
//! an empty list. Writes are best effort: a failed write is logged and the
//! mutation is dropped.

use crate::storage::KeyValueStorage;
use crate::types::{Task, TaskPatch};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Default storage entry name for guest tasks.
pub const DEFAULT_GUEST_KEY: &str = "todo-sync-guest-tasks";

/// CRUD over the guest task list.
#[derive(Clone)]
pub struct GuestStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl GuestStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_key(storage, DEFAULT_GUEST_KEY)
    }

    pub fn with_key(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The storage the guest list lives in.
    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    /// All guest tasks, in stored (unsorted) order.
    pub fn list(&self) -> Vec<Task> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(key = %self.key, error = %e, "Error reading guest tasks");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Malformed guest tasks, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the whole guest list.
    fn save(&self, tasks: &[Task]) {
        let json = match serde_json::to_string(tasks) {
            Ok(json) => json,
            Err(e) => {
                error!(key = %self.key, error = %e, "Error serializing guest tasks");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.key, &json) {
            error!(key = %self.key, error = %e, "Error saving guest tasks");
        }
    }

    /// Prepend a task. Duplicate ids are not rejected.
    pub fn add(&self, task: Task) {
        let mut tasks = self.list();
        debug!(task_id = %task.id, "Adding guest task");
        tasks.insert(0, task);
        self.save(&tasks);
    }

    /// Merge `patch` into the task with `id`. No-op if it does not exist.
    pub fn update(&self, id: &str, patch: &TaskPatch) {
        let mut tasks = self.list();
        let mut found = false;
        for task in tasks.iter_mut().filter(|t| t.id == id) {
            patch.apply_to(task);
            found = true;
        }
        if found {
            self.save(&tasks);
        } else {
            debug!(task_id = %id, "Guest task not found for update");
        }
    }

    /// Remove the task with `id`. No-op if it does not exist.
    pub fn delete(&self, id: &str) {
        let mut tasks = self.list();
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() != before {
            self.save(&tasks);
        }
    }

    /// Remove the storage entry entirely.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            error!(key = %self.key, error = %e, "Error clearing guest tasks");
        }
    }

    /// Whether there is at least one guest task.
    pub fn has_any(&self) -> bool {
        if !self.entry_exists() {
            return false;
        }
        !self.list().is_empty()
    }

    /// Whether the storage entry exists at all, whatever it holds.
    pub fn entry_exists(&self) -> bool {
        match self.storage.contains(&self.key) {
            Ok(exists) => exists,
            Err(e) => {
                error!(key = %self.key, error = %e, "Error checking guest tasks");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, GuestStore) {
        let storage = Arc::new(MemoryStorage::new());
        let guest = GuestStore::new(storage.clone());
        (storage, guest)
    }

    fn task(id: &str, created_at: i64) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {id}"),
            completed: false,
            created_at,
            order: Some(created_at as f64),
        }
    }

    #[test]
    fn missing_entry_is_empty() {
        let (_, guest) = store();
        assert!(guest.list().is_empty());
        assert!(!guest.has_any());
        assert!(!guest.entry_exists());
    }

    #[test]
    fn add_prepends() {
        let (_, guest) = store();
        guest.add(task("a", 1));
        guest.add(task("b", 2));
        let ids: Vec<_> = guest.list().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(guest.has_any());
    }

    #[test]
    fn update_merges_fields() {
        let (_, guest) = store();
        guest.add(task("a", 1));
        guest.update("a", &TaskPatch::title("renamed"));
        let t = &guest.list()[0];
        assert_eq!(t.title, "renamed");
        assert_eq!(t.created_at, 1);
        assert!(!t.completed);

        // Unknown id is a no-op
        guest.update("zzz", &TaskPatch::completed(true));
        assert!(!guest.list()[0].completed);
    }

    #[test]
    fn delete_and_clear() {
        let (storage, guest) = store();
        guest.add(task("a", 1));
        guest.add(task("b", 2));
        guest.delete("a");
        guest.delete("missing");
        assert_eq!(guest.list().len(), 1);

        guest.clear();
        assert!(!storage.contains(DEFAULT_GUEST_KEY).unwrap());
        assert!(guest.list().is_empty());
    }

    #[test]
    fn malformed_entry_reads_as_empty() {
        let (storage, guest) = store();
        storage.set(DEFAULT_GUEST_KEY, "{not json").unwrap();
        assert!(guest.list().is_empty());
        assert!(guest.entry_exists());
        assert!(!guest.has_any());
    }

    #[test]
    fn reads_entries_without_order() {
        let (storage, guest) = store();
        storage
            .set(
                DEFAULT_GUEST_KEY,
                r#"[{"id":"a","title":"Old","completed":false,"createdAt":42}]"#,
            )
            .unwrap();
        let tasks = guest.list();
        assert_eq!(tasks[0].order, None);
        assert_eq!(tasks[0].created_at, 42);
    }

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("quota exceeded".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("quota exceeded".into()))
        }
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let guest = GuestStore::new(Arc::new(BrokenStorage));
        guest.add(task("a", 1));
        guest.update("a", &TaskPatch::completed(true));
        guest.delete("a");
        guest.clear();
        assert!(guest.list().is_empty());
        assert!(!guest.has_any());
    }
}
