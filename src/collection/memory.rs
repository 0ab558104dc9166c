//! A collection that only lives in memory

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::collection::DocumentSet;
use crate::error::RemoteError;
use crate::mock_behaviour::MockBehaviour;
use crate::task::{Task, TaskId, TaskPatch, UserId};
use crate::traits::{RemoteCollection, SnapshotReceiver};

/// An in-memory [`RemoteCollection`], that behaves like a hosted document store.
///
/// It can be told to fail some operations with a [`MockBehaviour`].
#[derive(Debug, Default)]
pub struct MemoryCollection {
    data: Mutex<DocumentSet>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mock_behaviour(mock_behaviour: Arc<Mutex<MockBehaviour>>) -> Self {
        Self {
            data: Mutex::new(DocumentSet::default()),
            mock_behaviour: Some(mock_behaviour),
        }
    }

    fn data(&self) -> MutexGuard<'_, DocumentSet> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check<F>(&self, f: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&mut MockBehaviour) -> Result<(), RemoteError>,
    {
        match &self.mock_behaviour {
            None => Ok(()),
            Some(b) => {
                let mut behaviour = b.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                f(&mut *behaviour)
            },
        }
    }

    /// Store a document without going through the mocked behaviour
    pub fn insert(&self, task: Task) {
        let owner = task.owner_id().clone();
        let mut data = self.data();
        let mut documents = data.documents().to_vec();
        documents.retain(|t| (t.owner_id() == &owner && t.id() == task.id()) == false);
        documents.push(task);
        data.commit(documents, &owner);
    }

    /// The documents of an owner, as currently stored
    pub fn documents_of(&self, owner: &UserId) -> Vec<Task> {
        self.data().partition(owner)
    }

    /// Make every live query of `owner` receive an error, as a failing service would do
    pub fn push_error(&self, owner: &UserId, error: RemoteError) {
        self.data().notify(owner, Err(error));
    }

    /// The number of live queries that have not been cancelled yet
    pub fn subscriber_count(&self) -> usize {
        self.data().subscriber_count()
    }
}

#[async_trait]
impl RemoteCollection for MemoryCollection {
    async fn create_document(&self, task: &Task) -> Result<TaskId, RemoteError> {
        self.check(|b| b.can_create_document())?;
        let mut data = self.data();
        let documents = data.with_created(task)?;
        data.commit(documents, task.owner_id());
        Ok(task.id().clone())
    }

    async fn update_fields(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), RemoteError> {
        self.check(|b| b.can_update_fields())?;
        let mut data = self.data();
        let documents = data.with_updated(owner, id, patch)?;
        data.commit(documents, owner);
        Ok(())
    }

    async fn delete_document(&self, owner: &UserId, id: &TaskId) -> Result<(), RemoteError> {
        self.check(|b| b.can_delete_document())?;
        let mut data = self.data();
        match data.with_deleted(owner, id) {
            None => log::debug!("Document {} does not exist, nothing to delete", id),
            Some(documents) => data.commit(documents, owner),
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &UserId) -> Result<SnapshotReceiver, RemoteError> {
        self.check(|b| b.can_subscribe())?;
        Ok(self.data().subscribe(owner))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::task::{CompletionStatus, Urgency};

    fn task(title: &str, owner: &str) -> Task {
        Task::new(title.to_string(), NaiveDate::from_ymd_opt(2025, 4, 16).unwrap(), Urgency::Important, UserId::from(owner))
    }

    #[tokio::test]
    async fn every_write_pushes_a_snapshot() {
        let collection = MemoryCollection::new();
        let owner = UserId::from("u");
        let mut rx = collection.subscribe(&owner).await.unwrap();
        assert!(rx.recv().await.unwrap().unwrap().is_empty());

        let t = task("a", "u");
        collection.create_document(&t).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap().len(), 1);

        let patch = TaskPatch::completion(CompletionStatus::Completed(chrono::Utc::now()));
        collection.update_fields(&owner, t.id(), &patch).await.unwrap();
        let snapshot = rx.recv().await.unwrap().unwrap();
        assert!(snapshot[0].completed());

        collection.delete_document(&owner, t.id()).await.unwrap();
        assert!(rx.recv().await.unwrap().unwrap().is_empty());

        // Deleting again is fine, and changes nothing
        collection.delete_document(&owner, t.id()).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn mocked_failures() {
        let behaviour = Arc::new(Mutex::new(MockBehaviour {
            create_document_behaviour: (1, 1),
            ..MockBehaviour::default()
        }));
        let collection = MemoryCollection::with_mock_behaviour(behaviour);
        assert!(collection.create_document(&task("a", "u")).await.is_ok());
        assert!(collection.create_document(&task("b", "u")).await.is_err());
        assert!(collection.create_document(&task("c", "u")).await.is_ok());
        assert_eq!(collection.documents_of(&UserId::from("u")).len(), 2);
    }
}
