//! A collection that persists tasks locally, for when no remote service is available

use std::collections::HashMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::collection::{parse_documents, DocumentSet};
use crate::error::RemoteError;
use crate::task::{Task, TaskId, TaskPatch, UserId};
use crate::traits::{KeyValueSlot, RemoteCollection, SnapshotReceiver};

/// A [`RemoteCollection`] that stores the JSON-serialized list of every task under a single key of a [`KeyValueSlot`].
///
/// The slot is read once at startup, and written on every mutation.
/// Absent or malformed content is not an error: the collection then starts empty.
pub struct LocalCollection<S: KeyValueSlot> {
    slot: S,
    key: String,
    data: Mutex<DocumentSet>,
}

impl<S: KeyValueSlot> LocalCollection<S> {
    /// Load the tasks stored under `key`
    pub fn new(slot: S, key: &str) -> Self {
        let documents = load(&slot, key);
        log::debug!("Loaded {} local tasks from key {:?}", documents.len(), key);
        Self {
            slot,
            key: key.to_string(),
            data: Mutex::new(DocumentSet::new(documents)),
        }
    }

    /// Load the tasks stored under the default key (see [`crate::config::DEFAULT_STORAGE_KEY`])
    pub fn with_default_key(slot: S) -> Self {
        let key = crate::config::default_storage_key();
        Self::new(slot, &key)
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    fn data(&self) -> MutexGuard<'_, DocumentSet> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist `documents`, then make them the current ones.
    /// In case they cannot be persisted, nothing changes.
    fn save_and_commit(&self, data: &mut DocumentSet, documents: Vec<Task>, owner: &UserId) -> Result<(), RemoteError> {
        let text = serde_json::to_string(&documents)?;
        if let Err(err) = self.slot.set(&self.key, &text) {
            log::warn!("Unable to save tasks under key {:?}: {}", self.key, err);
            return Err(RemoteError::new(format!("Unable to save tasks: {}", err)));
        }
        data.commit(documents, owner);
        Ok(())
    }
}

fn load<S: KeyValueSlot>(slot: &S, key: &str) -> Vec<Task> {
    let text = match slot.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(err) => {
            log::warn!("Unable to read key {:?}: {}. Using an empty task list", key, err);
            return Vec::new();
        },
    };

    match parse_documents(&text) {
        Ok(tasks) => tasks,
        Err(err) => {
            log::warn!("Invalid tasks data found under key {:?} ({}), using an empty task list", key, err);
            Vec::new()
        }
    }
}

#[async_trait]
impl<S: KeyValueSlot> RemoteCollection for LocalCollection<S> {
    async fn create_document(&self, task: &Task) -> Result<TaskId, RemoteError> {
        let mut data = self.data();
        let documents = data.with_created(task)?;
        self.save_and_commit(&mut data, documents, task.owner_id())?;
        Ok(task.id().clone())
    }

    async fn update_fields(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), RemoteError> {
        let mut data = self.data();
        let documents = data.with_updated(owner, id, patch)?;
        self.save_and_commit(&mut data, documents, owner)
    }

    async fn delete_document(&self, owner: &UserId, id: &TaskId) -> Result<(), RemoteError> {
        let mut data = self.data();
        match data.with_deleted(owner, id) {
            None => Ok(()),
            Some(documents) => self.save_and_commit(&mut data, documents, owner),
        }
    }

    async fn subscribe(&self, owner: &UserId) -> Result<SnapshotReceiver, RemoteError> {
        Ok(self.data().subscribe(owner))
    }
}


/// A [`KeyValueSlot`] that only lives in memory
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that already contains a value
    pub fn with_value(key: &str, value: &str) -> Self {
        let slot = Self::default();
        slot.values().insert(key.to_string(), value.to_string());
        slot
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueSlot for MemorySlot {
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }
}


/// A [`KeyValueSlot`] that stores every key in its own file of a folder
#[derive(Clone, Debug, PartialEq)]
pub struct FileSlot {
    backing_folder: PathBuf,
}

impl FileSlot {
    pub fn new(folder: &Path) -> Self {
        Self { backing_folder: PathBuf::from(folder) }
    }

    pub fn folder(&self) -> &Path {
        &self.backing_folder
    }

    /// Get the path to the file that stores a given key
    pub fn file_for(&self, key: &str) -> PathBuf {
        let mut filename = sanitize_filename::sanitize(key);
        filename.push_str(".json");
        self.backing_folder.join(filename)
    }
}

impl KeyValueSlot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let path = self.file_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(format!("Unable to open file {:?}: {}", path, err).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        std::fs::create_dir_all(&self.backing_folder)?;
        let path = self.file_for(key);
        std::fs::write(&path, value)
            .map_err(|err| format!("Unable to save file {:?}: {}", path, err).into())
    }
}
