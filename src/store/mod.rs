//! The task store: a local mirror of the current user's tasks
//!
//! A [`TaskStore`] never considers its local list as a source of truth.
//! It opens a live query on the collection for the signed-in user, and every snapshot this query delivers replaces the whole local list.
//! Operations are sent to the collection, and their effect becomes visible when the collection pushes the next snapshot.
//!
//! Every live query is tagged with a generation number. When the user changes, the generation is bumped and the local list is cleared,
//! so that snapshots of a previous query (i.e. of a previous user) can never be applied.

pub mod views;

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::StoreConfig;
use crate::error::TaskError;
use crate::session::{Identity, SessionProvider, SessionState};
use crate::task::{CompletionStatus, Task, TaskChanges, TaskId, TaskPatch, Urgency};
use crate::traits::{RemoteCollection, Snapshot, SnapshotReceiver};
use crate::utils::date;
pub use views::{DashboardStats, SearchResults};

#[derive(Debug, Default)]
struct StoreState {
    owner: Option<Identity>,
    tasks: Vec<Task>,
    loading: bool,
    error: Option<TaskError>,
    generation: u64,
    revision: u64,
}

struct StoreInner {
    collection: Arc<dyn RemoteCollection>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    revision: watch::Sender<u64>,
    /// The task that applies the snapshots of the current live query
    listener: Mutex<Option<JoinHandle<()>>>,
    /// The task that follows the session changes
    binding: Mutex<Option<JoinHandle<()>>>,
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tell watchers that something has changed. Must be called with the state locked.
    ///
    /// Locks are always taken in this order: `state`, then `listener`.
    fn bump(&self, state: &mut StoreState) {
        state.revision += 1;
        self.revision.send_replace(state.revision);
    }

    fn replace_handle(slot: &Mutex<Option<JoinHandle<()>>>, handle: Option<JoinHandle<()>>) {
        let previous = std::mem::replace(&mut *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()), handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Apply a snapshot of the live query tagged `generation`.
    /// Returns `false` if this query is outdated, and should not be listened to anymore.
    fn apply_snapshot(&self, generation: u64, snapshot: Snapshot) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            log::trace!("Dropping a stale snapshot (generation {}, current is {})", generation, state.generation);
            return false;
        }

        match snapshot {
            Ok(mut tasks) => {
                if let Some(owner) = &state.owner {
                    let before = tasks.len();
                    tasks.retain(|task| task.owner_id() == owner.uid());
                    if tasks.len() != before {
                        log::warn!("Ignoring {} tasks that do not belong to {}", before - tasks.len(), owner.uid());
                    }
                }
                log::debug!("Applying a snapshot of {} tasks (generation {})", tasks.len(), generation);
                state.tasks = tasks;
                state.loading = false;
            },
            Err(err) => {
                log::warn!("The live query failed: {}. Keeping the last known tasks", err);
                state.loading = false;
                state.error = Some(TaskError::Remote(err));
            },
        }
        self.bump(&mut state);
        true
    }

    /// Set the completion status of a cached task, unless the cache has moved to another user meanwhile
    fn set_cached_completion(&self, generation: u64, id: &TaskId, status: &CompletionStatus) {
        let mut state = self.state();
        if state.generation != generation {
            return;
        }
        if let Some(task) = state.tasks.iter_mut().find(|task| task.id() == id) {
            task.set_completion_status(status.clone());
            self.bump(&mut state);
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let handles = [self.listener.get_mut(), self.binding.get_mut()];
        for handle in handles.iter() {
            if let Ok(Some(handle)) = handle {
                handle.abort();
            }
        }
    }
}

async fn listen(inner: Weak<StoreInner>, generation: u64, mut receiver: SnapshotReceiver) {
    while let Some(snapshot) = receiver.recv().await {
        let strong = match inner.upgrade() {
            None => break,
            Some(strong) => strong,
        };
        if strong.apply_snapshot(generation, snapshot) == false {
            break;
        }
    }
    log::trace!("Live query of generation {} is over", generation);
}


/// The tasks of the current user, mirrored from a [`RemoteCollection`].
///
/// Cloning a `TaskStore` gives another handle to the same store.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

impl TaskStore {
    /// Create a store. It is empty until an identity is set (see [`Self::set_identity`] and [`Self::bind`])
    pub fn new(collection: Arc<dyn RemoteCollection>, config: StoreConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                collection,
                config,
                state: Mutex::new(StoreState::default()),
                revision,
                listener: Mutex::new(None),
                binding: Mutex::new(None),
            })
        }
    }

    pub fn with_collection(collection: Arc<dyn RemoteCollection>) -> Self {
        Self::new(collection, StoreConfig::default())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    //
    //
    // Synchronisation
    //
    //

    /// Follow the session of `session`: mirror the tasks of whoever is signed in, and nothing when nobody is.
    ///
    /// This replaces any previous binding. This must be called within a Tokio runtime.
    pub fn bind(&self, session: &SessionProvider) {
        let mut changes = session.watch();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let state = changes.borrow_and_update().clone();
                let store = match weak.upgrade() {
                    None => break,
                    Some(inner) => TaskStore { inner },
                };
                match state {
                    SessionState::Unknown => store.mark_loading(),
                    SessionState::Authenticated(identity) => store.set_identity(Some(identity)).await,
                    SessionState::Anonymous => store.set_identity(None).await,
                }
                drop(store);

                if changes.changed().await.is_err() {
                    break;
                }
            }
        });
        StoreInner::replace_handle(&self.inner.binding, Some(handle));
    }

    /// Stop following the session. The current live query (if any) keeps running
    pub fn unbind(&self) {
        StoreInner::replace_handle(&self.inner.binding, None);
    }

    /// Stop following the session, cancel the live query and forget the tasks
    pub fn shutdown(&self) {
        self.unbind();
        self.clear();
    }

    fn mark_loading(&self) {
        let mut state = self.inner.state();
        if state.owner.is_none() && state.loading == false {
            state.loading = true;
            self.inner.bump(&mut state);
        }
    }

    /// Mirror the tasks of `identity`, or nothing at all.
    ///
    /// Setting the identity that is already set only refreshes its details.
    /// Setting another one clears the cached tasks, cancels the current live query and opens a new one.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        match identity {
            None => self.clear(),
            Some(identity) => self.open(identity).await,
        }
    }

    fn clear(&self) {
        let mut state = self.inner.state();
        state.generation += 1;
        if let Some(owner) = state.owner.take() {
            log::debug!("Forgetting the tasks of {}", owner.uid());
        }
        state.tasks.clear();
        state.loading = false;
        state.error = None;
        // Swapped under the state lock: only a listener of an older generation can be aborted
        StoreInner::replace_handle(&self.inner.listener, None);
        self.inner.bump(&mut state);
    }

    async fn open(&self, identity: Identity) {
        let generation = {
            let mut state = self.inner.state();
            if state.owner.as_ref().map(|owner| owner.uid()) == Some(identity.uid()) {
                state.owner = Some(identity);
                return;
            }

            state.generation += 1;
            state.tasks.clear();
            state.loading = true;
            state.error = None;
            state.owner = Some(identity.clone());
            StoreInner::replace_handle(&self.inner.listener, None);
            self.inner.bump(&mut state);
            state.generation
        };
        log::debug!("Opening a live query for {} (generation {})", identity.uid(), generation);

        let receiver = match self.inner.collection.subscribe(identity.uid()).await {
            Ok(receiver) => receiver,
            Err(err) => {
                log::warn!("Unable to open a live query for {}: {}", identity.uid(), err);
                let mut state = self.inner.state();
                if state.generation == generation {
                    state.loading = false;
                    state.error = Some(TaskError::Remote(err));
                    self.inner.bump(&mut state);
                }
                return;
            }
        };

        let handle = tokio::spawn(listen(Arc::downgrade(&self.inner), generation, receiver));
        let state = self.inner.state();
        if state.generation == generation {
            StoreInner::replace_handle(&self.inner.listener, Some(handle));
        } else {
            // Someone else has set another identity meanwhile
            handle.abort();
        }
    }

    /// Get notified every time the store changes. The value is a revision counter.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    //
    //
    // State
    //
    //

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state().tasks.clone()
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.inner.state().tasks.iter().find(|task| task.id() == id).cloned()
    }

    /// Whether the first snapshot for the current user is still awaited
    pub fn loading(&self) -> bool {
        self.inner.state().loading
    }

    /// The error of the latest operation (or of the live query), if it failed
    pub fn error(&self) -> Option<TaskError> {
        self.inner.state().error.clone()
    }

    pub fn clear_error(&self) {
        let mut state = self.inner.state();
        if state.error.take().is_some() {
            self.inner.bump(&mut state);
        }
    }

    /// The user whose tasks are mirrored
    pub fn owner(&self) -> Option<Identity> {
        self.inner.state().owner.clone()
    }

    fn require_owner(&self) -> Result<Identity, TaskError> {
        self.owner().ok_or(TaskError::NotAuthenticated)
    }

    /// Keep the outcome of an operation in the `error` field
    fn record<T>(&self, result: Result<T, TaskError>) -> Result<T, TaskError> {
        let mut state = self.inner.state();
        let new_error = result.as_ref().err().cloned();
        if let Some(err) = &new_error {
            log::warn!("Task operation failed: {}", err);
        }
        if state.error != new_error {
            state.error = new_error;
            self.inner.bump(&mut state);
        }
        result
    }

    //
    //
    // Operations
    //
    //

    /// Create a task for the current user.
    ///
    /// The task shows up in [`Self::tasks`] once the collection has pushed it back.
    pub async fn add_task(&self, title: &str, due_date: &str, urgency: Urgency) -> Result<TaskId, TaskError> {
        let result = self.add_task_inner(title, due_date, urgency).await;
        self.record(result)
    }

    async fn add_task_inner(&self, title: &str, due_date: &str, urgency: Urgency) -> Result<TaskId, TaskError> {
        let title = validate_title(title)?;
        let due_date = date::parse_due_date(due_date)?;
        let owner = self.require_owner()?;

        let task = Task::new(title, due_date, urgency, owner.uid().clone());
        let id = self.inner.collection.create_document(&task).await?;
        log::debug!("Created task {} for {}", id, owner.uid());
        Ok(id)
    }

    /// Mark a task as completed (or as uncompleted, if it was completed).
    /// Returns whether it is now completed.
    ///
    /// With optimistic updates, the cached task changes right away, and is restored if the collection fails.
    pub async fn toggle_completion(&self, id: &TaskId) -> Result<bool, TaskError> {
        let result = self.toggle_completion_inner(id).await;
        self.record(result)
    }

    async fn toggle_completion_inner(&self, id: &TaskId) -> Result<bool, TaskError> {
        let owner = self.require_owner()?;
        let (generation, previous) = {
            let state = self.inner.state();
            let task = state.tasks.iter()
                .find(|task| task.id() == id)
                .ok_or_else(|| TaskError::NotFound(id.clone()))?;
            (state.generation, task.completion_status().clone())
        };
        let next = previous.toggled(Utc::now());
        let optimistic = self.inner.config.optimistic_updates;

        if optimistic {
            self.inner.set_cached_completion(generation, id, &next);
        }

        let patch = TaskPatch::completion(next.clone());
        match self.inner.collection.update_fields(owner.uid(), id, &patch).await {
            Ok(()) => Ok(next.is_completed()),
            Err(err) => {
                if optimistic {
                    let still_optimistic = self.get_task(id)
                        .map(|task| task.completion_status() == &next)
                        .unwrap_or(false);
                    if still_optimistic {
                        self.inner.set_cached_completion(generation, id, &previous);
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Change some fields of a task. Its id, owner and creation date never change.
    pub async fn update_task(&self, id: &TaskId, changes: TaskChanges) -> Result<(), TaskError> {
        let result = self.update_task_inner(id, changes).await;
        self.record(result)
    }

    async fn update_task_inner(&self, id: &TaskId, changes: TaskChanges) -> Result<(), TaskError> {
        let owner = self.require_owner()?;
        let current = self.get_task(id).ok_or_else(|| TaskError::NotFound(id.clone()))?;
        let patch = build_patch(&current, changes)?;
        if patch.is_empty() {
            log::debug!("Nothing to update in task {}", id);
            return Ok(());
        }
        self.inner.collection.update_fields(owner.uid(), id, &patch).await?;
        Ok(())
    }

    /// Delete a task. Deleting a task that does not exist is not an error.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), TaskError> {
        let result = self.delete_task_inner(id).await;
        self.record(result)
    }

    async fn delete_task_inner(&self, id: &TaskId) -> Result<(), TaskError> {
        let owner = self.require_owner()?;
        if self.get_task(id).is_none() {
            log::debug!("Task {} is not in the local list", id);
        }
        self.inner.collection.delete_document(owner.uid(), id).await?;
        Ok(())
    }

    //
    //
    // Derived queries
    //
    //

    pub fn tasks_due_today(&self) -> Vec<Task> {
        self.tasks_on(date::today())
    }

    /// Tasks due on a given day, completed or not
    pub fn tasks_on(&self, day: NaiveDate) -> Vec<Task> {
        views::due_on(&self.inner.state().tasks, day)
    }

    pub fn overdue_tasks(&self) -> Vec<Task> {
        self.overdue_tasks_as_of(date::today())
    }

    pub fn overdue_tasks_as_of(&self, today: NaiveDate) -> Vec<Task> {
        views::overdue_as_of(&self.inner.state().tasks, today)
    }

    pub fn upcoming_tasks(&self) -> Vec<Task> {
        self.upcoming_tasks_as_of(date::today())
    }

    pub fn upcoming_tasks_as_of(&self, today: NaiveDate) -> Vec<Task> {
        views::upcoming_as_of(&self.inner.state().tasks, today)
    }

    pub fn due_within_next_week(&self) -> Vec<Task> {
        views::due_within_next_week(&self.inner.state().tasks, date::today())
    }

    /// The share of today's tasks that are completed, 100 when there are none
    pub fn completion_percentage(&self) -> u32 {
        self.completion_percentage_on(date::today())
    }

    pub fn completion_percentage_on(&self, day: NaiveDate) -> u32 {
        views::completion_percentage(&self.inner.state().tasks, day)
    }

    pub fn search_tasks(&self, query: &str) -> Vec<Task> {
        views::search(&self.inner.state().tasks, query)
    }

    pub fn partition_search(&self, query: &str) -> SearchResults {
        views::partition_search(&self.inner.state().tasks, query)
    }

    pub fn overdue_by_date(&self) -> Vec<(NaiveDate, Vec<Task>)> {
        views::overdue_by_date(&self.inner.state().tasks, date::today())
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats::compute(&self.inner.state().tasks, date::today())
    }
}

fn validate_title(title: &str) -> Result<String, TaskError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskError::validation("A task needs a title"));
    }
    Ok(title.to_string())
}

/// Validate user changes, and turn them into what should be sent to a collection
fn build_patch(current: &Task, changes: TaskChanges) -> Result<TaskPatch, TaskError> {
    let mut patch = TaskPatch::default();
    if let Some(title) = changes.title {
        patch.title = Some(validate_title(&title)?);
    }
    if let Some(due_date) = changes.due_date {
        patch.due_date = Some(date::parse_due_date(&due_date)?);
    }
    patch.urgency = changes.urgency;
    if let Some(completed) = changes.completed {
        if completed != current.completed() {
            let status = if completed { CompletionStatus::Completed(Utc::now()) } else { CompletionStatus::Uncompleted };
            patch.completion = Some(status);
        }
    }
    Ok(patch)
}
