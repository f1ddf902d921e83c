//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

/// How an object patch treats keys that already hold object sub-spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Merge into existing object sub-spaces; `null` deletes at any depth
    #[default]
    Recursive,
    /// Every merged key is replaced wholesale
    Shallow,
}

/// When merges performed inside an action notify observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyPolicy {
    /// Notify right after each merge
    #[default]
    Eager,
    /// Notify once, when the action settles
    Deferred,
}

/// Configuration shared by every space of one tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub merge: MergeStrategy,

    pub notify: NotifyPolicy,

    /// Field that identifies list items
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Display name of the root node
    #[serde(default = "default_root_name")]
    pub root_name: String,
}

fn default_id_field() -> String {
    String::from("id")
}

fn default_root_name() -> String {
    String::from("root")
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            merge: MergeStrategy::default(),
            notify: NotifyPolicy::default(),
            id_field: default_id_field(),
            root_name: default_root_name(),
        }
    }
}

impl SpaceConfig {
    /// Parse configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SpaceConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_field.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "id_field".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
