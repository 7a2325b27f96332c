//! Configuration types and structures.

use crate::auth::{DEFAULT_CODE_TTL_SECS, DEFAULT_SESSION_KEY};
use crate::error::{Error, Result};
use crate::guest::DEFAULT_GUEST_KEY;
use crate::order::{DEFAULT_REBALANCE_STEP, DEFAULT_TAIL_GAP, OrderPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub ordering: OrderingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local storage for guest tasks and the signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one file per storage entry.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Entry name for the guest task list.
    #[serde(default = "default_guest_key")]
    pub guest_key: String,

    /// Entry name for the signed-in session.
    #[serde(default = "default_session_key")]
    pub session_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            guest_key: default_guest_key(),
            session_key: default_session_key(),
        }
    }
}

/// Account-backed task database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Path to the SQLite database file. Defaults to `<data_dir>/todo-sync.db`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Magic-code sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// How long an issued code stays valid.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl_secs(),
        }
    }
}

/// Order key assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Gap added past the last task when moving to the end.
    #[serde(default = "default_tail_gap")]
    pub tail_gap: f64,

    /// Spacing between keys after a renumbering.
    #[serde(default = "default_rebalance_step")]
    pub rebalance_step: f64,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            tail_gap: default_tail_gap(),
            rebalance_step: default_rebalance_step(),
        }
    }
}

impl OrderingConfig {
    pub fn policy(&self) -> OrderPolicy {
        OrderPolicy {
            tail_gap: self.tail_gap,
            rebalance_step: self.rebalance_step,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (e.g. `info`, `todo_sync=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("todo-sync"))
        .unwrap_or_else(|| PathBuf::from(".todo-sync"))
}

fn default_guest_key() -> String {
    DEFAULT_GUEST_KEY.to_string()
}

fn default_session_key() -> String {
    DEFAULT_SESSION_KEY.to_string()
}

fn default_code_ttl_secs() -> u64 {
    DEFAULT_CODE_TTL_SECS
}

fn default_tail_gap() -> f64 {
    DEFAULT_TAIL_GAP
}

fn default_rebalance_step() -> f64 {
    DEFAULT_REBALANCE_STEP
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Resolved database path.
    pub fn db_path(&self) -> PathBuf {
        self.remote
            .db_path
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("todo-sync.db"))
    }

    /// Reject values that would break ordering or sign-in.
    pub fn validate(&self) -> Result<()> {
        let ordering = &self.ordering;
        if !(ordering.tail_gap.is_finite() && ordering.tail_gap > 0.0) {
            return Err(Error::Config(format!(
                "ordering.tail_gap must be a positive number, got {}",
                ordering.tail_gap
            )));
        }
        if !(ordering.rebalance_step.is_finite() && ordering.rebalance_step > 0.0) {
            return Err(Error::Config(format!(
                "ordering.rebalance_step must be a positive number, got {}",
                ordering.rebalance_step
            )));
        }
        if self.storage.guest_key.trim().is_empty() || self.storage.session_key.trim().is_empty() {
            return Err(Error::Config("storage keys must not be empty".into()));
        }
        if self.storage.guest_key == self.storage.session_key {
            return Err(Error::Config(
                "storage.guest_key and storage.session_key must differ".into(),
            ));
        }
        if self.auth.code_ttl_secs == 0 {
            return Err(Error::Config("auth.code_ttl_secs must be positive".into()));
        }
        Ok(())
    }
}
