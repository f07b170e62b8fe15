//! Controller settings.
//!
//! Supports TOML files, environment variable overrides, and defaults.

use std::env;
use std::path::Path;

use query_model_core::config::DEFAULT_MAX_ROWS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings failures.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write settings file: {0}")]
    Write(#[source] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Model controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Page size for configs created by the controller (default: 20)
    pub default_max_rows: i64,
    /// Reload selections after paging, filter, sort, and view changes (default: false)
    pub load_selections: bool,
    /// Capacity of the event broadcast channel (default: 64)
    pub event_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            default_max_rows: DEFAULT_MAX_ROWS,
            load_selections: false,
            event_capacity: 64,
        }
    }
}

impl ControllerSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SettingsError::Read)?;
        Self::from_toml(&content)
    }

    /// Parses settings from a TOML string. Missing keys keep their defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves the settings to a TOML file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), toml).map_err(SettingsError::Write)
    }

    /// Applies environment variable overrides.
    /// Variables are prefixed with `QUERY_MODEL_`.
    /// Example: `QUERY_MODEL_DEFAULT_MAX_ROWS=100` overrides `default_max_rows`.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Applies overrides resolved through `lookup` by variable name.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        if let Some(val) = parse_override(&lookup, "QUERY_MODEL_DEFAULT_MAX_ROWS")? {
            self.default_max_rows = val;
        }
        if let Some(val) = parse_override(&lookup, "QUERY_MODEL_LOAD_SELECTIONS")? {
            self.load_selections = val;
        }
        if let Some(val) = parse_override(&lookup, "QUERY_MODEL_EVENT_CAPACITY")? {
            self.event_capacity = val;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, SettingsError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::InvalidEnv { name, value }),
        None => Ok(None),
    }
}
