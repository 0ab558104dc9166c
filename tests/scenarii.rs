//! End-to-end scenarios: a task store that follows the session, across users and restarts

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use task_fridge::collection::local::{FileSlot, LocalCollection};
use task_fridge::collection::memory::MemoryCollection;
use task_fridge::config::StoreConfig;
use task_fridge::session::memory::MemoryAuth;
use task_fridge::traits::KeyValueSlot;
use task_fridge::{AppContext, Identity, Task, TaskId, TaskStore, Urgency, UserId};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn wait_for<F>(store: &TaskStore, condition: F)
where
    F: Fn(&TaskStore) -> bool,
{
    let mut changes = store.watch();
    let waiting = async {
        while condition(store) == false {
            if changes.changed().await.is_err() {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), waiting).await
        .expect("the store did not reach the expected state in time");
}

fn titles(store: &TaskStore) -> Vec<String> {
    let mut titles: Vec<String> = store.tasks().iter().map(|t| t.title().to_string()).collect();
    titles.sort();
    titles
}

fn owned_by(owner: &Identity) -> impl Fn(&TaskStore) -> bool + '_ {
    move |store: &TaskStore| store.owner().map(|o| o.uid() == owner.uid()).unwrap_or(false) && store.loading() == false
}

#[tokio::test]
async fn switching_users_never_leaks_tasks() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let collection = Arc::new(MemoryCollection::new());
    let context = AppContext::init(auth.clone(), collection.clone(), StoreConfig::default());
    let tasks = context.tasks().clone();
    wait_for(&tasks, |s| s.loading() == false && s.owner().is_none()).await;

    context.session().sign_up("alice@example.com", "secret123", "Alice").await.unwrap();
    let alice = context.session().current_identity().unwrap();
    wait_for(&tasks, owned_by(&alice)).await;
    tasks.add_task("Alice's task", "2025-04-16", Urgency::Normal).await.unwrap();
    wait_for(&tasks, |s| s.tasks().len() == 1).await;

    context.session().sign_out().await.unwrap();
    wait_for(&tasks, |s| s.owner().is_none()).await;
    assert!(tasks.tasks().is_empty());

    context.session().sign_up("bob@example.com", "secret123", "Bob").await.unwrap();
    let bob = context.session().current_identity().unwrap();
    wait_for(&tasks, owned_by(&bob)).await;
    assert!(tasks.tasks().is_empty());
    tasks.add_task("Bob's task", "2025-04-17", Urgency::Urgent).await.unwrap();
    wait_for(&tasks, |s| s.tasks().len() == 1).await;
    assert_eq!(titles(&tasks), vec!["Bob's task"]);

    context.session().sign_in("alice@example.com", "secret123").await.unwrap();
    wait_for(&tasks, |s| owned_by(&alice)(s) && s.tasks().len() == 1).await;
    assert_eq!(titles(&tasks), vec!["Alice's task"]);
    assert!(tasks.tasks().iter().all(|t| t.owner_id() == alice.uid()));

    context.shutdown();
}

#[tokio::test]
async fn snapshots_of_a_previous_user_are_dropped() {
    init_logger();
    let collection = Arc::new(MemoryCollection::new());
    let alice = Identity::new(UserId::from("alice"), None, None);
    let bob = Identity::new(UserId::from("bob"), None, None);
    let store = TaskStore::with_collection(collection.clone());

    store.set_identity(Some(alice.clone())).await;
    store.set_identity(Some(bob.clone())).await;
    wait_for(&store, owned_by(&bob)).await;

    // Alice's live query is outdated: whatever it delivers must not show up
    let due = NaiveDate::from_ymd_opt(2025, 4, 16).unwrap();
    collection.insert(Task::new("Alice's secret".to_string(), due, Urgency::Normal, alice.uid().clone()));
    collection.insert(Task::new("Bob's chore".to_string(), due, Urgency::Normal, bob.uid().clone()));
    wait_for(&store, |s| s.tasks().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(titles(&store), vec!["Bob's chore"]);
}

#[tokio::test]
async fn refreshing_the_same_user_keeps_the_tasks() {
    init_logger();
    let collection = Arc::new(MemoryCollection::new());
    let alice = Identity::new(UserId::from("alice"), None, None);
    let due = NaiveDate::from_ymd_opt(2025, 4, 16).unwrap();
    collection.insert(Task::new("Kept".to_string(), due, Urgency::Normal, alice.uid().clone()));

    let store = TaskStore::with_collection(collection.clone());
    store.set_identity(Some(alice.clone())).await;
    wait_for(&store, |s| s.tasks().len() == 1).await;

    let renamed = alice.clone().with_display_name(Some("Alice".to_string()));
    store.set_identity(Some(renamed)).await;
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.owner().unwrap().display_name(), Some("Alice"));

    store.set_identity(None).await;
    assert!(store.tasks().is_empty());
    assert!(store.owner().is_none());
}

#[tokio::test]
async fn local_tasks_survive_a_restart() {
    init_logger();
    let folder = std::env::temp_dir().join(format!("task-fridge-scenario-{}", TaskId::random()));
    let auth = Arc::new(MemoryAuth::new());

    let first_run = AppContext::from_config(auth.clone(), StoreConfig::default(), &folder).unwrap();
    first_run.session().sign_up("alice@example.com", "secret123", "").await.unwrap();
    let alice = first_run.session().current_identity().unwrap();
    wait_for(first_run.tasks(), owned_by(&alice)).await;
    let id = first_run.tasks().add_task("Persisted", "2025-04-16", Urgency::Important).await.unwrap();
    first_run.shutdown();

    let stored = FileSlot::new(&folder).get(&StoreConfig::default().storage_key).unwrap();
    assert!(stored.unwrap().contains("Persisted"));

    // The auth service still holds Alice's session, which the next run restores
    let second_run = AppContext::from_config(auth.clone(), StoreConfig::default(), &folder).unwrap();
    wait_for(second_run.tasks(), |s| s.get_task(&id).is_some()).await;
    let task = second_run.tasks().get_task(&id).unwrap();
    assert_eq!(task.title(), "Persisted");
    assert_eq!(task.urgency(), Urgency::Important);
    assert_eq!(task.owner_id(), alice.uid());
    second_run.shutdown();

    let _ = std::fs::remove_dir_all(&folder);
}

#[tokio::test]
async fn a_local_collection_behind_a_plain_store() {
    init_logger();
    let folder = std::env::temp_dir().join(format!("task-fridge-scenario-{}", TaskId::random()));
    let collection = Arc::new(LocalCollection::with_default_key(FileSlot::new(&folder)));
    let alice = Identity::new(UserId::from("alice"), None, None);
    let store = TaskStore::with_collection(collection.clone());
    store.set_identity(Some(alice)).await;

    let id = store.add_task("Water the plants", "2025-04-16", Urgency::Normal).await.unwrap();
    wait_for(&store, |s| s.get_task(&id).is_some()).await;
    store.toggle_completion(&id).await.unwrap();
    wait_for(&store, |s| s.get_task(&id).map(|t| t.completed()).unwrap_or(false)).await;

    let reloaded = LocalCollection::with_default_key(FileSlot::new(&folder));
    let store = TaskStore::with_collection(Arc::new(reloaded));
    store.set_identity(Some(Identity::new(UserId::from("alice"), None, None))).await;
    wait_for(&store, |s| s.tasks().len() == 1).await;
    assert!(store.get_task(&id).unwrap().completed());

    let _ = std::fs::remove_dir_all(&folder);
}
