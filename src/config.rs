//! Support for library configuration options

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// The product name, sent as the user agent of HTTP requests.
/// Feel free to override it when initing this library.
pub static PRODUCT_NAME: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("TaskFridge".to_string())));

/// The key local collections store their task list under, unless told otherwise.
/// Feel free to override it when initing this library.
pub static DEFAULT_STORAGE_KEY: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("tasks".to_string())));

pub fn product_name() -> String {
    PRODUCT_NAME.lock().map(|s| s.clone()).unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

pub fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.lock().map(|s| s.clone()).unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}


/// Options of a task store and of the collection it talks to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Whether toggling a task updates the local list before the remote collection confirms it
    pub optimistic_updates: bool,
    /// The key of the local task list (used when `remote_url` is not set)
    pub storage_key: String,
    /// How often an HTTP collection is polled for changes
    pub poll_interval_secs: u64,
    /// The base URL of an HTTP document service, if any
    pub remote_url: Option<Url>,
    /// The bearer token sent to the HTTP document service
    pub remote_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            optimistic_updates: true,
            storage_key: default_storage_key(),
            poll_interval_secs: 5,
            remote_url: None,
            remote_token: None,
        }
    }
}

impl StoreConfig {
    /// Load a config from a JSON file. Missing fields take their default values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"optimistic_updates": false}"#).unwrap();
        assert_eq!(config.optimistic_updates, false);
        assert_eq!(config.storage_key, "tasks");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = StoreConfig { poll_interval_secs: 0, ..StoreConfig::default() };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = StoreConfig::from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
