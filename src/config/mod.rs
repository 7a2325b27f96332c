//! Layered configuration.
//!
//! Tiers, lowest to highest priority:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/todo-sync/config.yaml`
//! 3. **User** - `~/.todo-sync/config.yaml`
//! 4. **Environment** - the variables below
//!
//! YAML tiers are deep-merged field by field.
//!
//! ## Environment Variables
//! - `TODO_SYNC_CONFIG_PATH` - Explicit config file (replaces the project and user tiers)
//! - `TODO_SYNC_DATA_DIR` - Local storage directory
//! - `TODO_SYNC_DB_PATH` - Database path
//! - `TODO_SYNC_LOG_LEVEL` - Default log filter
//! - `TODO_SYNC_USER_DIR` - User config dir (default: `~/.todo-sync`)
//! - `TODO_SYNC_PROJECT_DIR` - Project config dir (default: `./todo-sync`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
