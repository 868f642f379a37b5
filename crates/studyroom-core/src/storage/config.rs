//! TOML-based application configuration.
//!
//! Stores:
//! - Session store endpoint and credentials
//! - Focus timer cadence and expiry rules
//! - The current user and default room
//! - Timeline defaults
//!
//! Configuration is stored at `~/.config/studyroom/config.toml`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Session store API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Focus timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Minimum spacing between progress pulses.
    #[serde(default = "default_pulse_interval_secs")]
    pub pulse_interval_secs: u64,
    /// A remote session whose last pulse is older than this is not resumed.
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: u64,
    /// Local snapshots older than this are ignored and cleared.
    #[serde(default = "default_local_ttl_hours")]
    pub local_ttl_hours: u64,
    #[serde(default = "default_target_minutes")]
    pub default_target_minutes: u32,
}

/// Who is studying, and where.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

/// Timeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_total_days")]
    pub default_total_days: i64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/studyroom/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:5000/api".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_pulse_interval_secs() -> u64 {
    5
}
fn default_stale_after_minutes() -> u64 {
    30
}
fn default_local_ttl_hours() -> u64 {
    24
}
fn default_target_minutes() -> u32 {
    25
}
fn default_total_days() -> i64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            pulse_interval_secs: default_pulse_interval_secs(),
            stale_after_minutes: default_stale_after_minutes(),
            local_ttl_hours: default_local_ttl_hours(),
            default_target_minutes: default_target_minutes(),
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_total_days: default_total_days(),
        }
    }
}

impl FocusConfig {
    pub fn pulse_interval(&self) -> Result<Duration, ConfigError> {
        span("focus.pulse_interval_secs", self.pulse_interval_secs, Duration::try_seconds)
    }

    pub fn stale_after(&self) -> Result<Duration, ConfigError> {
        span("focus.stale_after_minutes", self.stale_after_minutes, Duration::try_minutes)
    }

    pub fn local_ttl(&self) -> Result<Duration, ConfigError> {
        span("focus.local_ttl_hours", self.local_ttl_hours, Duration::try_hours)
    }

    /// Check that every duration fits in a `chrono::Duration`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pulse_interval()?;
        self.stale_after()?;
        self.local_ttl()?;
        Ok(())
    }
}

fn span(key: &str, value: u64, build: fn(i64) -> Option<Duration>) -> Result<Duration, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(build)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value} is out of range"),
        })
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            }
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(leaf)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => value
                .parse::<i64>()
                .map(|n| serde_json::Value::Number(n.into()))
                .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
            serde_json::Value::Object(_) => {
                return Err(ConfigError::UnknownKey(key.to_string()));
            }
            // Optional strings serialize as null
            _ if value.is_empty() => serde_json::Value::Null,
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return (and write) the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving. An empty value
    /// clears optional fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.focus.validate()?;
        *self = updated;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
