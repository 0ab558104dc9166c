use std::error::Error;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{AuthError, RemoteError};
use crate::session::Identity;
use crate::task::{Task, TaskId, TaskPatch, UserId};

/// A full list of an owner's tasks, or the reason it could not be produced
pub type Snapshot = Result<Vec<Task>, RemoteError>;
/// The sending half of a live query
pub type SnapshotSender = mpsc::UnboundedSender<Snapshot>;
/// The receiving half of a live query. Dropping it cancels the query.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Snapshot>;

/// A document collection that stores tasks, partitioned by owner
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Store a new document in the partition of `task.owner_id()`.
    /// Returns the id the document is stored under (the collection may pick its own).
    async fn create_document(&self, task: &Task) -> Result<TaskId, RemoteError>;

    /// Merge fields into an existing document of `owner`
    async fn update_fields(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), RemoteError>;

    /// Remove a document of `owner`. Removing a document that does not exist is not an error.
    async fn delete_document(&self, owner: &UserId, id: &TaskId) -> Result<(), RemoteError>;

    /// Open a live query on every document of `owner`.
    ///
    /// The current content is sent right away, then a full snapshot is sent whenever it changes.
    /// Snapshots are sent in the order the changes happened.
    async fn subscribe(&self, owner: &UserId) -> Result<SnapshotReceiver, RemoteError>;
}

/// A remote identity service
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    /// Change the display name of the currently signed-in user
    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// A stream of the session changes that happen on the service side.
    ///
    /// Its first element is the session that is active (or restored) when this is called.
    /// The next ones are changes that were not requested by this client (an expired session, a token refresh that switched users...).
    /// Sign-ins, sign-ups and sign-outs are reported by the return values of their functions instead.
    fn session_changes(&self) -> mpsc::UnboundedReceiver<Option<Identity>>;
}

/// A flat key-value slot, used to persist tasks locally when no remote collection is available
pub trait KeyValueSlot: Send + Sync {
    /// Returns the stored value, or `None` in case nothing has been stored under this key
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>>;
    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}
