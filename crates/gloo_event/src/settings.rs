//! Scheduler settings
//!
//! Loaded from JSON; every field is optional and falls back to its default.

use crate::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How a scheduler hooks into its runtime and handles listener failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Global table holding the hook library.
    pub hook_library: String,
    /// Registration function inside `hook_library`.
    pub hook_add: String,
    /// Per-frame event the tick hook listens on.
    pub hook_event: String,
    /// Prefix of the hook identifier; the scheduler id is appended.
    pub hook_id_prefix: String,
    /// Log and continue when a listener fails instead of aborting the tick.
    pub isolate_listener_failures: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            hook_library: "hook".to_string(),
            hook_add: "Add".to_string(),
            hook_event: "Think".to_string(),
            hook_id_prefix: "gloo_event_scheduler_".to_string(),
            isolate_listener_failures: true,
        }
    }
}

impl SchedulerSettings {
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.isolate_listener_failures {
            FailurePolicy::Isolate
        } else {
            FailurePolicy::Propagate
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let settings = SchedulerSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, SchedulerSettings::default());
        assert_eq!(settings.failure_policy(), FailurePolicy::Isolate);
    }

    #[test]
    fn test_partial_override() {
        let settings = SchedulerSettings::from_json_str(
            r#"{ "hook_event": "Tick", "isolate_listener_failures": false }"#,
        )
        .unwrap();
        assert_eq!(settings.hook_event, "Tick");
        assert_eq!(settings.hook_library, "hook");
        assert_eq!(settings.failure_policy(), FailurePolicy::Propagate);
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = SchedulerSettings::from_json_str("{ hook_event: 3 }").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SchedulerSettings::load("/nonexistent/gloo/settings.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
