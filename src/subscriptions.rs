//! Change notifications for live task views.
//!
//! The guest store has no push mechanism of its own, so the accessor publishes
//! a synthetic event after every guest mutation. The remote store publishes
//! after each committed batch and the auth service on sign-in and sign-out.
//! A view subscribes once and re-reads whenever an event arrives.

use tokio::sync::broadcast;
use tracing::trace;

/// Default buffer of undelivered events per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Categories of state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The guest task list was rewritten.
    GuestTasks,
    /// A batch was committed against the remote task store.
    RemoteTasks,
    /// A user signed in or out.
    Auth,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Owner whose tasks changed, when known.
    pub owner: Option<String>,
}

impl ChangeEvent {
    pub fn guest() -> Self {
        Self {
            kind: ChangeKind::GuestTasks,
            owner: None,
        }
    }

    pub fn remote(owner: Option<String>) -> Self {
        Self {
            kind: ChangeKind::RemoteTasks,
            owner,
        }
    }

    pub fn auth(owner: Option<String>) -> Self {
        Self {
            kind: ChangeKind::Auth,
            owner,
        }
    }
}

/// Broadcast channel of change events. Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!(?event, "Publishing change");
        let _ = self.tx.send(event);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
