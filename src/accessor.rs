//! Unified task access.
//!
//! [`TaskAccessor`] is the single entry point for reading and mutating the
//! task list. It picks the guest store or the remote store from the current
//! [`AuthState`], normalizes both into [`Task`], and sorts by effective order.
//!
//! Store failures stay inside the accessor: mutations log and drop them. The
//! only read error a caller sees is [`Error::QueryFailed`].

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::guest::GuestStore;
use crate::order::{self, OrderPatch, OrderPolicy, ReorderPlan};
use crate::remote::{RemoteStore, TaskFields, TxOp};
use crate::subscriptions::{ChangeEvent, ChangeFeed};
use crate::types::{AuthState, Task, TaskPatch, sort_tasks};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Storage operations shared by the guest and remote backends.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// All tasks visible to this backend, unsorted.
    async fn list(&self) -> Result<Vec<Task>>;

    async fn add(&self, task: Task) -> Result<()>;

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Persist several order keys.
    async fn set_orders(&self, patches: &[OrderPatch]) -> Result<()> {
        for patch in patches {
            self.update(&patch.id, &TaskPatch::order(patch.order)).await?;
        }
        Ok(())
    }
}

/// Guest backend. Every mutation is followed by a synthetic change event.
pub struct GuestBackend {
    store: GuestStore,
    feed: ChangeFeed,
}

impl GuestBackend {
    pub fn new(store: GuestStore, feed: ChangeFeed) -> Self {
        Self { store, feed }
    }

    fn changed(&self) {
        self.feed.publish(ChangeEvent::guest());
    }
}

#[async_trait]
impl TaskBackend for GuestBackend {
    async fn list(&self) -> Result<Vec<Task>> {
        Ok(self.store.list())
    }

    async fn add(&self, task: Task) -> Result<()> {
        self.store.add(task);
        self.changed();
        Ok(())
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<()> {
        self.store.update(id, patch);
        self.changed();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id);
        self.changed();
        Ok(())
    }

}

/// Remote backend scoped to one owner. Updates and deletes only reach
/// tasks that owner already has.
pub struct RemoteBackend {
    remote: Arc<dyn RemoteStore>,
    owner: String,
}

impl RemoteBackend {
    pub fn new(remote: Arc<dyn RemoteStore>, owner: impl Into<String>) -> Self {
        Self {
            remote,
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl TaskBackend for RemoteBackend {
    async fn list(&self) -> Result<Vec<Task>> {
        self.remote.query_tasks(Some(&self.owner)).await
    }

    async fn add(&self, task: Task) -> Result<()> {
        let op = TxOp::upsert(task.id.clone(), TaskFields::from_task(&task)).link_owner(&self.owner);
        self.remote.transact(vec![op]).await
    }

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<()> {
        let op = TxOp::update(id, TaskFields::from(patch)).link_owner(&self.owner);
        self.remote.transact(vec![op]).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let op = TxOp::delete(id).link_owner(&self.owner);
        self.remote.transact(vec![op]).await
    }

    async fn set_orders(&self, patches: &[OrderPatch]) -> Result<()> {
        let ops = patches
            .iter()
            .map(|patch| TxOp::from(patch).link_owner(&self.owner))
            .collect();
        self.remote.transact(ops).await
    }
}

/// Which store a list was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSource {
    Guest,
    Remote { owner: String },
}

/// A sorted task list and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskList {
    pub source: TaskSource,
    pub tasks: Vec<Task>,
}

impl TaskList {
    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

/// Result of one read cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskView {
    /// Identity not resolved yet; nothing to show.
    Loading,
    Ready(TaskList),
}

impl TaskView {
    pub fn tasks(&self) -> &[Task] {
        match self {
            TaskView::Loading => &[],
            TaskView::Ready(list) => &list.tasks,
        }
    }
}

/// Entry point for reading and mutating tasks in either store.
#[derive(Clone)]
pub struct TaskAccessor {
    guest: GuestStore,
    remote: Arc<dyn RemoteStore>,
    feed: ChangeFeed,
    clock: Arc<dyn Clock>,
    policy: OrderPolicy,
}

impl TaskAccessor {
    pub fn new(
        guest: GuestStore,
        remote: Arc<dyn RemoteStore>,
        feed: ChangeFeed,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guest,
            remote,
            feed,
            clock,
            policy: OrderPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OrderPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    /// Receive a change event after every mutation the view should re-read for.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Remote when signed in with a known user id, guest otherwise.
    pub fn backend_for(&self, auth: &AuthState) -> Box<dyn TaskBackend> {
        match auth.user_id() {
            Some(owner) => Box::new(RemoteBackend::new(Arc::clone(&self.remote), owner)),
            None => Box::new(GuestBackend::new(self.guest.clone(), self.feed.clone())),
        }
    }

    /// Read the current list in display order.
    ///
    /// Remote tasks without an order key get one assigned and persisted
    /// before the list is returned.
    pub async fn load(&self, auth: &AuthState) -> Result<TaskView> {
        if auth.is_loading() {
            return Ok(TaskView::Loading);
        }

        let Some(owner) = auth.user_id() else {
            let mut tasks = self.guest.list();
            sort_tasks(&mut tasks);
            return Ok(TaskView::Ready(TaskList {
                source: TaskSource::Guest,
                tasks,
            }));
        };

        let raw = self
            .remote
            .query_tasks(Some(owner))
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;

        let (mut tasks, patches) = order::backfill(raw);
        if !patches.is_empty() {
            info!(owner = %owner, count = patches.len(), "Backfilling task order keys");
            let ops = patches
                .iter()
                .map(|patch| TxOp::from(patch).link_owner(owner))
                .collect();
            if let Err(e) = self.remote.transact(ops).await {
                warn!(owner = %owner, error = %e, "Failed to persist order backfill");
            }
        }

        sort_tasks(&mut tasks);
        Ok(TaskView::Ready(TaskList {
            source: TaskSource::Remote {
                owner: owner.to_string(),
            },
            tasks,
        }))
    }

    /// Add a task at the end of the list.
    ///
    /// Returns `None` without touching any store when the title is blank, or
    /// when the write failed.
    pub async fn add_task(&self, auth: &AuthState, title: &str) -> Option<Task> {
        if title.trim().is_empty() {
            debug!("Ignoring blank task title");
            return None;
        }

        let task = Task::new(title, self.clock.now_ms());
        match self.backend_for(auth).add(task.clone()).await {
            Ok(()) => Some(task),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Failed to add task");
                None
            }
        }
    }

    pub async fn toggle_task(&self, auth: &AuthState, id: &str, completed: bool) {
        self.patch(auth, id, TaskPatch::completed(completed)).await;
    }

    /// Rename a task. Blank titles are ignored.
    pub async fn update_task_title(&self, auth: &AuthState, id: &str, title: &str) {
        if title.trim().is_empty() {
            debug!(task_id = %id, "Ignoring blank task title");
            return;
        }
        self.patch(auth, id, TaskPatch::title(title)).await;
    }

    pub async fn delete_task(&self, auth: &AuthState, id: &str) {
        if let Err(e) = self.backend_for(auth).delete(id).await {
            warn!(task_id = %id, error = %e, "Failed to delete task");
        }
    }

    /// Set a task's order key directly.
    pub async fn reorder_task(&self, auth: &AuthState, id: &str, order: f64) {
        self.patch(auth, id, TaskPatch::order(order)).await;
    }

    /// Move `id` to `new_index` within `visible` (the list as displayed).
    ///
    /// Usually writes one order key; writes several when the gap at the
    /// target was exhausted. Returns the plan that was applied.
    pub async fn move_task(
        &self,
        auth: &AuthState,
        visible: &[Task],
        id: &str,
        new_index: usize,
    ) -> Option<ReorderPlan> {
        let plan = order::plan_move(visible, id, new_index, &self.policy)?;
        let backend = self.backend_for(auth);

        let result = match &plan {
            ReorderPlan::Single(patch) => {
                backend
                    .update(&patch.id, &TaskPatch::order(patch.order))
                    .await
            }
            ReorderPlan::Rebalance(patches) => {
                info!(count = patches.len(), "Renumbering order keys");
                backend.set_orders(patches).await
            }
        };

        if let Err(e) = result {
            warn!(task_id = %id, error = %e, "Failed to reorder task");
        }
        Some(plan)
    }

    async fn patch(&self, auth: &AuthState, id: &str, patch: TaskPatch) {
        if let Err(e) = self.backend_for(auth).update(id, &patch).await {
            warn!(task_id = %id, error = %e, "Failed to update task");
        }
    }
}
