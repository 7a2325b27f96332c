//! Wiring of stores, auth, accessor, and migrator from a [`Config`].

use crate::accessor::{TaskAccessor, TaskView};
use crate::auth::LocalAuth;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::guest::GuestStore;
use crate::migration::{MigrationOutcome, Migrator};
use crate::remote::{AuthService, RemoteStore};
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use crate::subscriptions::ChangeFeed;
use crate::types::AuthState;
use std::sync::Arc;
use tracing::{debug, error};

/// Everything one cycle produced.
#[derive(Debug)]
pub struct Cycle {
    pub auth: AuthState,
    /// Migration result for this cycle. Failures are reported, not retried.
    pub migration: Result<MigrationOutcome>,
    pub view: TaskView,
}

pub struct App {
    config: Config,
    db: Database,
    guest: GuestStore,
    auth: LocalAuth,
    accessor: TaskAccessor,
    migrator: Migrator,
}

impl App {
    /// Open file-backed storage and database at the configured locations.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn KeyValueStorage> =
            Arc::new(FileStorage::open(&config.storage.data_dir)?);
        let db = Database::open(config.db_path())?;
        Ok(Self::assemble(config, storage, db, Arc::new(SystemClock::new())))
    }

    /// Fully in-memory app, for tests and demos.
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::assemble(config, Arc::new(MemoryStorage::new()), db, clock))
    }

    fn assemble(
        config: Config,
        storage: Arc<dyn KeyValueStorage>,
        db: Database,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let feed = ChangeFeed::new();
        let db = db.with_feed(feed.clone());
        let remote: Arc<dyn RemoteStore> = Arc::new(db.clone());
        let guest = GuestStore::with_key(Arc::clone(&storage), config.storage.guest_key.clone());

        let auth = LocalAuth::new(db.clone(), Arc::clone(&storage), Arc::clone(&clock))
            .with_session_key(config.storage.session_key.clone())
            .with_code_ttl_secs(config.auth.code_ttl_secs);

        let accessor = TaskAccessor::new(guest.clone(), Arc::clone(&remote), feed, clock)
            .with_policy(config.ordering.policy());
        let migrator = Migrator::new(guest.clone(), remote);

        Self {
            config,
            db,
            guest,
            auth,
            accessor,
            migrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn guest(&self) -> &GuestStore {
        &self.guest
    }

    pub fn auth(&self) -> &LocalAuth {
        &self.auth
    }

    pub fn accessor(&self) -> &TaskAccessor {
        &self.accessor
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Resolve identity, run the migrator, and read the list.
    ///
    /// Fails only when the remote list cannot be loaded.
    pub async fn cycle(&mut self) -> Result<Cycle> {
        let auth = self.auth.current_user();
        debug!(?auth, "Starting cycle");

        let migration = self.migrator.on_auth_change(&auth).await;
        if let Err(ref e) = migration {
            error!(error = %e, "Guest task migration failed; guest tasks were kept");
        }

        let view = self.accessor.load(&auth).await?;
        Ok(Cycle {
            auth,
            migration,
            view,
        })
    }
}
