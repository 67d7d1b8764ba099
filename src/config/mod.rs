//! Configuration types and keyed overrides.
//!
//! Loading and tier merging live in [`loader`]; this module defines the
//! settings themselves and the `key=value` override grammar shared by
//! environment variables and the `--rc` flag.

pub mod loader;
pub mod merge;

pub use loader::{ConfigLoader, ConfigPaths};
pub use merge::{deep_merge, deep_merge_all};

use crate::error::{RecurError, RecurResult};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub recurrence: RecurrenceConfig,

    /// Ask before propagating an edit or deletion to sibling instances.
    /// When off, propagation proceeds as if the answer were yes.
    #[serde(default = "default_true")]
    pub confirmation: bool,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recurrence: RecurrenceConfig::default(),
            confirmation: true,
            store: StoreConfig::default(),
        }
    }
}

/// Settings consumed by the limit/enable gate and the expiry pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    /// Master switch. When off, no instance is ever generated.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of pending instances kept ahead of "now" per parent.
    #[serde(default = "default_limit")]
    pub limit: u32,

    #[serde(default)]
    pub until_policy: UntilPolicy,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: default_limit(),
            until_policy: UntilPolicy::default(),
        }
    }
}

/// What an elapsed `until` does to instances that already exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntilPolicy {
    /// `until` only stops future generation.
    #[default]
    Gate,
    /// Pending tasks whose `until` has passed are soft-deleted on each trigger.
    Expire,
}

impl UntilPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UntilPolicy::Gate => "gate",
            UntilPolicy::Expire => "expire",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gate" => Some(UntilPolicy::Gate),
            "expire" => Some(UntilPolicy::Expire),
            _ => None,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_limit() -> u32 {
    1
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-recur/tasks.db")
}

/// Parse a yes/no style flag.
pub fn parse_bool(key: &str, value: &str) -> RecurResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "on" | "true" | "1" => Ok(true),
        "no" | "n" | "off" | "false" | "0" => Ok(false),
        other => Err(RecurError::invalid_config(
            key,
            format!("expected yes or no, got '{}'", other),
        )),
    }
}

impl Config {
    /// Load a single YAML file layered over the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let overlay: serde_json::Value = serde_yaml::from_str(&content)?;
        let merged = deep_merge(serde_json::to_value(Config::default())?, overlay);
        let config: Config = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values serde accepts but the engine cannot use.
    pub fn validate(&self) -> RecurResult<()> {
        if self.recurrence.limit == 0 {
            return Err(RecurError::invalid_config(
                "recurrence.limit",
                "must be a positive integer",
            ));
        }
        Ok(())
    }

    /// Set one setting by its external key name.
    ///
    /// Recognised keys: `recurrence`, `recurrence.limit`,
    /// `recurrence.until_policy`, `confirmation`, `store.db_path`
    /// (alias `data.location`).
    pub fn set(&mut self, key: &str, value: &str) -> RecurResult<()> {
        match key {
            "recurrence" | "recurrence.enabled" => {
                self.recurrence.enabled = parse_bool(key, value)?;
            }
            "recurrence.limit" => {
                let limit: u32 = value.trim().parse().map_err(|_| {
                    RecurError::invalid_config(key, format!("'{}' is not a positive integer", value))
                })?;
                if limit == 0 {
                    return Err(RecurError::invalid_config(key, "must be a positive integer"));
                }
                self.recurrence.limit = limit;
            }
            "recurrence.until_policy" => {
                self.recurrence.until_policy = UntilPolicy::from_str(value).ok_or_else(|| {
                    RecurError::invalid_config(key, format!("expected gate or expire, got '{}'", value))
                })?;
            }
            "confirmation" => {
                self.confirmation = parse_bool(key, value)?;
            }
            "store.db_path" | "data.location" => {
                self.store.db_path = PathBuf::from(value.trim());
            }
            _ => {
                return Err(RecurError::invalid_config(key, "unknown setting"));
            }
        }
        Ok(())
    }

    /// Apply `key=value` overrides in order.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> RecurResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for item in overrides {
            let item = item.strip_prefix("rc.").unwrap_or(item);
            let (key, value) = item.split_once(['=', ':']).ok_or_else(|| {
                RecurError::invalid_config(item, "expected key=value")
            })?;
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.store.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.recurrence.enabled);
        assert_eq!(config.recurrence.limit, 1);
        assert_eq!(config.recurrence.until_policy, UntilPolicy::Gate);
        assert!(config.confirmation);
    }

    #[test]
    fn test_overrides_use_external_names() {
        let mut config = Config::default();
        config
            .apply_overrides(["recurrence=no", "rc.recurrence.limit=4", "confirmation:off"])
            .unwrap();
        assert!(!config.recurrence.enabled);
        assert_eq!(config.recurrence.limit, 4);
        assert!(!config.confirmation);
    }

    #[test]
    fn test_limit_must_be_positive() {
        let mut config = Config::default();
        assert!(config.set("recurrence.limit", "0").is_err());
        assert!(config.set("recurrence.limit", "many").is_err());
        assert_eq!(config.recurrence.limit, 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut config = Config::default();
        let err = config.set("recurrence.speed", "fast").unwrap_err();
        assert!(matches!(err, RecurError::InvalidConfig { .. }));
    }

    #[test]
    fn test_until_policy_override() {
        let mut config = Config::default();
        config.set("recurrence.until_policy", "Expire").unwrap();
        assert_eq!(config.recurrence.until_policy, UntilPolicy::Expire);
        assert!(config.set("recurrence.until_policy", "sometimes").is_err());
    }

    #[test]
    fn test_load_yaml_file_layers_over_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "recurrence:\n  limit: 3\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.recurrence.limit, 3);
        assert!(config.recurrence.enabled);
    }
}
