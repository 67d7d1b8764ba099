//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::Config;
use super::merge::deep_merge_all;
use crate::error::RecurResult;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// Project-level config ($CWD/task-recur/)
    Project = 1,
    /// User-level config (~/.task-recur/)
    User = 2,
    /// Environment variables
    Environment = 3,
    /// Command-line `--rc` overrides (highest priority)
    CommandLine = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
            ConfigTier::CommandLine => write!(f, "command line"),
        }
    }
}

/// Environment variables and the setting each one overrides.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("TASK_RECUR_DB_PATH", "store.db_path"),
    ("TASK_RECUR_RECURRENCE", "recurrence"),
    ("TASK_RECUR_RECURRENCE_LIMIT", "recurrence.limit"),
    ("TASK_RECUR_UNTIL_POLICY", "recurrence.until_policy"),
    ("TASK_RECUR_CONFIRMATION", "confirmation"),
];

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project-level config directory
    pub project_dir: Option<PathBuf>,
    /// User-level config directory
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
        // User dir: TASK_RECUR_USER_DIR or ~/.task-recur
        let user_dir = std::env::var("TASK_RECUR_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-recur")));

        // Project dir: TASK_RECUR_PROJECT_DIR or $CWD/task-recur
        let project_dir = std::env::var("TASK_RECUR_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-recur")));

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

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Config files that contributed, lowest tier first
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    ///
    /// An explicit file (argument or `TASK_RECUR_CONFIG_PATH`) replaces the
    /// project and user tiers.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("TASK_RECUR_CONFIG_PATH").ok().map(PathBuf::from));
        match explicit {
            Some(path) => Self::load_explicit(&path, ConfigPaths::discover()),
            None => Self::load_with_paths(ConfigPaths::discover()),
        }
    }

    /// Load a single explicit config file over the defaults.
    pub fn load_explicit(path: &Path, paths: ConfigPaths) -> Result<Self> {
        let mut config = Config::load(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        Self::apply_env_overrides(&mut config)?;
        Ok(Self {
            paths,
            config,
            sources: vec![path.to_path_buf()],
        })
    }

    /// Load configuration with explicit tier directories.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        // Tier 2: Project config, then Tier 3: User config
        let tier_dirs = [
            (ConfigTier::Project, paths.project_dir.as_deref()),
            (ConfigTier::User, paths.user_dir.as_deref()),
        ];
        for (tier, dir) in tier_dirs {
            let Some(dir) = dir else { continue };
            let config_file = dir.join("config.yaml");
            if !config_file.exists() {
                continue;
            }
            let parsed = std::fs::read_to_string(&config_file)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_yaml::from_str::<Value>(&content)?));
            match parsed {
                Ok(value) => {
                    debug!(tier = %tier, path = %config_file.display(), "loaded config tier");
                    configs.push(value);
                    sources.push(config_file);
                }
                Err(e) => {
                    warn!(tier = %tier, path = %config_file.display(), "ignoring unreadable config: {}", e);
                }
            }
        }

        // Merge all configs
        let merged = deep_merge_all(configs);
        let mut config: Config = serde_json::from_value(merged)?;
        config.validate()?;

        // Tier 4: Environment variable overrides
        Self::apply_env_overrides(&mut config)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    fn apply_env_overrides(config: &mut Config) -> RecurResult<()> {
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = std::env::var(var) {
                debug!(tier = %ConfigTier::Environment, var, key, "config override");
                config.set(key, &value)?;
            }
        }
        Ok(())
    }

    /// Apply command-line `key=value` overrides (the highest tier).
    pub fn apply_cli_overrides(&mut self, overrides: &[String]) -> RecurResult<()> {
        if !overrides.is_empty() {
            debug!(tier = %ConfigTier::CommandLine, count = overrides.len(), "config overrides");
        }
        self.config
            .apply_overrides(overrides.iter().map(String::as_str))
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

    /// Config files that contributed to the result, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}
