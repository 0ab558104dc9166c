//! Errors returned at the boundaries of this crate

use thiserror::Error;

use crate::task::TaskId;

/// Everything that can go wrong with a task store operation.
///
/// The store never lets these escape as panics: operations return them, and the latest one is
/// also kept in the store's `error` field so that a view can display it.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TaskError {
    /// The input is not acceptable (empty title, malformed date...)
    #[error("{0}")]
    Validation(String),
    /// The operation requires a signed-in user
    #[error("You must be signed in to manage tasks")]
    NotAuthenticated,
    /// The operation targets a task that is not in the current task list
    #[error("No task with id {0}")]
    NotFound(TaskId),
    /// The collection (or the network in front of it) failed
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl TaskError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        TaskError::Validation(msg.into())
    }
}

/// A failure of a remote collection, wrapping the message of the underlying service
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
}

impl RemoteError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("Network error: {}", err))
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid document: {}", err))
    }
}

/// A failure reported by the authentication service, in a human-readable form
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    message: String,
}

impl AuthError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Unable to load a [`StoreConfig`](crate::config::StoreConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Invalid config file {path}: {source}")]
    Parse { path: String, source: serde_json::Error },
}
