//! Implementations of [`RemoteCollection`](crate::traits::RemoteCollection)
//!
//! * [`MemoryCollection`](memory::MemoryCollection) keeps documents in memory, and can be told to fail (see [`MockBehaviour`](crate::mock_behaviour::MockBehaviour))
//! * [`LocalCollection`](local::LocalCollection) persists documents in a [`KeyValueSlot`](crate::traits::KeyValueSlot), for when no remote service is available
//! * [`RestCollection`](rest::RestCollection) talks to a JSON document service over HTTP

pub mod memory;
pub mod local;
pub mod rest;

use crate::error::RemoteError;
use crate::task::{Task, TaskId, TaskPatch, UserId};
use crate::traits::{Snapshot, SnapshotReceiver, SnapshotSender};

/// Decode a JSON array of task documents.
///
/// Documents that cannot be decoded are skipped (and logged), so that a single bad document does not hide every other one.
pub fn parse_documents(text: &str) -> Result<Vec<Task>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
    let mut tasks = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<Task>(value) {
            Ok(task) => tasks.push(task),
            Err(err) => log::warn!("Skipping an invalid task document: {}", err),
        }
    }
    Ok(tasks)
}


/// A set of task documents (of every owner), and the live queries that watch them.
///
/// This is what in-memory and local collections are made of.
#[derive(Debug, Default)]
pub(crate) struct DocumentSet {
    documents: Vec<Task>,
    subscribers: Vec<(UserId, SnapshotSender)>,
}

impl DocumentSet {
    pub fn new(documents: Vec<Task>) -> Self {
        Self { documents, subscribers: Vec::new() }
    }

    pub fn documents(&self) -> &[Task] {
        &self.documents
    }

    /// The documents of a single owner
    pub fn partition(&self, owner: &UserId) -> Vec<Task> {
        self.documents.iter()
            .filter(|task| task.owner_id() == owner)
            .cloned()
            .collect()
    }

    /// Returns the list of documents as it would be after inserting `task`
    pub fn with_created(&self, task: &Task) -> Result<Vec<Task>, RemoteError> {
        let exists = self.documents.iter()
            .any(|t| t.owner_id() == task.owner_id() && t.id() == task.id());
        if exists {
            return Err(RemoteError::new(format!("Document {} already exists", task.id())));
        }
        let mut documents = self.documents.clone();
        documents.push(task.clone());
        Ok(documents)
    }

    /// Returns the list of documents as it would be after patching `id`
    pub fn with_updated(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<Vec<Task>, RemoteError> {
        let mut documents = self.documents.clone();
        match documents.iter_mut().find(|t| t.owner_id() == owner && t.id() == id) {
            None => Err(RemoteError::new(format!("No document {} to update", id))),
            Some(task) => {
                task.apply_patch(patch);
                Ok(documents)
            }
        }
    }

    /// Returns the list of documents as it would be after deleting `id`, or `None` if there is nothing to delete
    pub fn with_deleted(&self, owner: &UserId, id: &TaskId) -> Option<Vec<Task>> {
        let exists = self.documents.iter().any(|t| t.owner_id() == owner && t.id() == id);
        if exists == false {
            return None;
        }
        Some(self.documents.iter()
            .filter(|t| (t.owner_id() == owner && t.id() == id) == false)
            .cloned()
            .collect())
    }

    /// Replace the documents, and tell the subscribers of `owner`
    pub fn commit(&mut self, documents: Vec<Task>, owner: &UserId) {
        self.documents = documents;
        let snapshot = self.partition(owner);
        self.notify(owner, Ok(snapshot));
    }

    /// Open a live query. Its first message is the current partition of `owner`
    pub fn subscribe(&mut self, owner: &UserId) -> SnapshotReceiver {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        // This cannot fail, we're holding the receiver
        let _ = sender.send(Ok(self.partition(owner)));
        self.subscribers.push((owner.clone(), sender));
        receiver
    }

    /// Send something to every live query of `owner`, and forget about the cancelled ones
    pub fn notify(&mut self, owner: &UserId, snapshot: Snapshot) {
        self.subscribers.retain(|(sub_owner, sender)| {
            if sub_owner != owner {
                return sender.is_closed() == false;
            }
            sender.send(snapshot.clone()).is_ok()
        });
    }

    /// The number of live queries that have not been cancelled yet
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter()
            .filter(|(_, sender)| sender.is_closed() == false)
            .count()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::task::Urgency;

    fn task(title: &str, owner: &str) -> Task {
        Task::new(title.to_string(), NaiveDate::from_ymd_opt(2025, 4, 16).unwrap(), Urgency::Normal, UserId::from(owner))
    }

    #[test]
    fn parse_skips_invalid_documents() {
        let good = serde_json::to_value(task("ok", "u")).unwrap();
        let text = serde_json::to_string(&vec![good, serde_json::json!({"title": 3})]).unwrap();
        let tasks = parse_documents(&text).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title(), "ok");

        assert!(parse_documents("{not json").is_err());
    }

    #[tokio::test]
    async fn subscribers_only_see_their_partition() {
        let mut set = DocumentSet::default();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let mut rx_alice = set.subscribe(&alice);
        let mut rx_bob = set.subscribe(&bob);
        assert_eq!(rx_alice.recv().await.unwrap().unwrap().len(), 0);
        assert_eq!(rx_bob.recv().await.unwrap().unwrap().len(), 0);

        let t = task("alice's", "alice");
        let docs = set.with_created(&t).unwrap();
        set.commit(docs, &alice);

        assert_eq!(rx_alice.recv().await.unwrap().unwrap(), vec![t.clone()]);
        assert!(rx_bob.try_recv().is_err());

        // bob cannot touch alice's document
        assert!(set.with_updated(&bob, t.id(), &TaskPatch::default()).is_err());
        assert!(set.with_deleted(&bob, t.id()).is_none());

        drop(rx_bob);
        assert_eq!(set.subscriber_count(), 1);
    }
}
