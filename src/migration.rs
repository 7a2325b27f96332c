//! One-shot transfer of guest tasks into a newly signed-in account.
//!
//! The migrator runs at most one attempt per sign-in. A failed batch still
//! marks the migration done so it is not retried on every cycle; the guest
//! tasks stay in place and can be migrated by hand. The done flag is kept
//! in memory and also persisted per user next to the guest list, so later
//! runs of the program see it. Signing out clears it.

use crate::error::{Error, Result};
use crate::guest::GuestStore;
use crate::remote::{RemoteStore, TaskFields, TxOp};
use crate::types::AuthState;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Storage entry that records a finished migration for `user_id`.
pub fn migration_done_key(user_id: &str) -> String {
    format!("migration-done:{}", user_id)
}

/// Per-session migration progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationState {
    #[default]
    Idle,
    Migrating,
    Done,
}

/// What a call to [`Migrator::on_auth_change`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to do for this auth state.
    Skipped,
    /// Signed in with no guest tasks; marked done without touching the remote store.
    NothingToMigrate,
    /// Moved this many tasks and cleared the guest store.
    Migrated(usize),
}

pub struct Migrator {
    guest: GuestStore,
    remote: Arc<dyn RemoteStore>,
    state: MigrationState,
}

impl Migrator {
    pub fn new(guest: GuestStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            guest,
            remote,
            state: MigrationState::Idle,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// React to the current auth state. Call once per cycle.
    ///
    /// Returns [`Error::MigrationFailed`] when the batch was rejected. The
    /// state is `Done` afterwards regardless and the guest tasks are kept.
    pub async fn on_auth_change(&mut self, auth: &AuthState) -> Result<MigrationOutcome> {
        match auth {
            AuthState::Loading => return Ok(MigrationOutcome::Skipped),
            AuthState::Anonymous => {
                if self.state != MigrationState::Idle {
                    debug!("Signed out, resetting migration state");
                }
                self.state = MigrationState::Idle;
                return Ok(MigrationOutcome::Skipped);
            }
            AuthState::Authenticated(_) => {}
        }

        let Some(user_id) = auth.user_id() else {
            return Ok(MigrationOutcome::Skipped);
        };
        if self.state != MigrationState::Idle {
            return Ok(MigrationOutcome::Skipped);
        }
        if self.persisted_done(user_id) {
            debug!(user_id = %user_id, "Migration already recorded for this sign-in");
            self.state = MigrationState::Done;
            return Ok(MigrationOutcome::Skipped);
        }

        if !self.guest.has_any() {
            self.mark_done(user_id);
            return Ok(MigrationOutcome::NothingToMigrate);
        }

        self.state = MigrationState::Migrating;
        let result = self.migrate(user_id).await;
        self.mark_done(user_id);
        result
    }

    fn persisted_done(&self, user_id: &str) -> bool {
        match self.guest.storage().contains(&migration_done_key(user_id)) {
            Ok(done) => done,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Error reading migration flag");
                false
            }
        }
    }

    fn mark_done(&mut self, user_id: &str) {
        self.state = MigrationState::Done;
        if let Err(e) = self
            .guest
            .storage()
            .set(&migration_done_key(user_id), "true")
        {
            warn!(user_id = %user_id, error = %e, "Error saving migration flag");
        }
    }

    async fn migrate(&self, user_id: &str) -> Result<MigrationOutcome> {
        let tasks = self.guest.list();
        let count = tasks.len();

        let ops: Vec<TxOp> = tasks
            .iter()
            .map(|task| {
                TxOp::upsert(task.id.clone(), TaskFields::from_task(task)).link_owner(user_id)
            })
            .collect();

        match self.remote.transact(ops).await {
            Ok(()) => {
                self.guest.clear();
                info!(user_id = %user_id, count, "Migrated guest tasks");
                Ok(MigrationOutcome::Migrated(count))
            }
            Err(e) => {
                error!(user_id = %user_id, count, error = %e, "Error migrating guest tasks");
                Err(Error::MigrationFailed {
                    count,
                    reason: e.to_string(),
                })
            }
        }
    }
}
