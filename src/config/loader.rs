//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::Config;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Compiled-in defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/todo-sync/)
    Project = 1,
    /// User-level config (~/.todo-sync/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        // User dir: TODO_SYNC_USER_DIR or ~/.todo-sync
        let user_dir = std::env::var("TODO_SYNC_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".todo-sync")));

        // Project dir: TODO_SYNC_PROJECT_DIR or $CWD/todo-sync
        let project_dir = std::env::var("TODO_SYNC_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("todo-sync")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Read a YAML file as a JSON value for merging. Missing files are skipped;
/// unreadable or malformed ones are skipped with a warning.
fn read_tier(path: &Path, tier: ConfigTier) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), %tier, error = %e, "Skipping unreadable config");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(path = %path.display(), %tier, "Loaded config tier");
            Some(value)
        }
        Err(e) => {
            warn!(path = %path.display(), %tier, error = %e, "Skipping malformed config");
            None
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers. An explicit config file (from
    /// `--config` or `TODO_SYNC_CONFIG_PATH`) takes the place of the project
    /// and user tiers.
    pub fn load_with(paths: ConfigPaths, explicit: Option<&Path>) -> Result<Self> {
        let mut loader = Self::load_tiers(paths, explicit)?;
        Self::apply_env_overrides(&mut loader.config, |key| std::env::var(key).ok());
        loader.config.validate()?;
        Ok(loader)
    }

    /// Merge defaults with either an explicit file or the project and user tiers.
    fn load_tiers(paths: ConfigPaths, explicit: Option<&Path>) -> Result<Self> {
        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults
        configs.push(serde_json::to_value(Config::default())?);

        if let Some(path) = explicit {
            // An explicit file must exist and parse
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            let value: Value = serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
            configs.push(value);
            sources.push(path.to_path_buf());
        } else {
            // Tier 2: Project config
            if let Some(ref project_dir) = paths.project_dir {
                let file = project_dir.join("config.yaml");
                if let Some(value) = read_tier(&file, ConfigTier::Project) {
                    configs.push(value);
                    sources.push(file);
                }
            }

            // Tier 3: User config
            if let Some(ref user_dir) = paths.user_dir {
                let file = user_dir.join("config.yaml");
                if let Some(value) = read_tier(&file, ConfigTier::User) {
                    configs.push(value);
                    sources.push(file);
                }
            }
        }

        let merged = deep_merge_all(configs);
        let config: Config =
            serde_json::from_value(merged).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Tier 4: environment variable overrides.
    fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
        if let Some(data_dir) = var("TODO_SYNC_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Some(db_path) = var("TODO_SYNC_DB_PATH") {
            config.remote.db_path = Some(PathBuf::from(db_path));
        }

        if let Some(level) = var("TODO_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}
