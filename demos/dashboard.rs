//! This is an example of how task-fridge can be used.
//! It signs up a user, stores a few tasks in a local folder, and prints a dashboard.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use task_fridge::config::StoreConfig;
use task_fridge::session::memory::MemoryAuth;
use task_fridge::utils::{date, print_dashboard};
use task_fridge::{AppContext, TaskStore, Urgency};

const DATA_FOLDER: &str = "test_data/dashboard";

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("This example stores its tasks in {}", DATA_FOLDER);
    println!("Run it with RUST_LOG=debug to see what happens under the hood\n");

    let auth = Arc::new(MemoryAuth::new());
    let context = match AppContext::from_config(auth, StoreConfig::default(), Path::new(DATA_FOLDER)) {
        Ok(context) => context,
        Err(err) => {
            log::error!("Unable to set up the application: {}", err);
            return;
        }
    };

    if let Err(err) = context.session().sign_up("demo@example.com", "correct horse", "Demo user").await {
        log::error!("Unable to sign up: {}", err);
        return;
    }
    wait_until_ready(context.tasks()).await;

    let today = date::today();
    let samples = [
        ("Pay the rent", today - ChronoDuration::days(3), Urgency::Urgent),
        ("Call the plumber", today - ChronoDuration::days(1), Urgency::Important),
        ("Write the weekly report", today, Urgency::Important),
        ("Water the plants", today, Urgency::Normal),
        ("Book the train tickets", today + ChronoDuration::days(4), Urgency::Normal),
    ];
    for (title, due, urgency) in samples.iter() {
        if let Err(err) = context.tasks().add_task(title, &date::format_for_input(*due), *urgency).await {
            log::warn!("Unable to add {:?}: {}", title, err);
        }
    }
    wait_for_task_count(context.tasks(), samples.len()).await;

    if let Some(task) = context.tasks().tasks_due_today().first() {
        if let Err(err) = context.tasks().toggle_completion(task.id()).await {
            log::warn!("Unable to complete {:?}: {}", task.title(), err);
        }
    }

    println!("Hello, {}", context.session().display_name().unwrap_or_default());
    print_dashboard(context.tasks(), today);

    let stats = context.tasks().stats();
    println!("\n{} tasks, {} urgent, {} completed today", stats.total_tasks, stats.high_priority_count, stats.completed_today);

    context.shutdown();
}

async fn wait_until_ready(store: &TaskStore) {
    wait_for_task_count(store, 0).await
}

/// Wait until the store has settled on at least `count` tasks (or give up after a while)
async fn wait_for_task_count(store: &TaskStore, count: usize) {
    let mut changes = store.watch();
    let waiting = async {
        while store.owner().is_none() || store.loading() || store.tasks().len() < count {
            if changes.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(5), waiting).await.is_err() {
        log::warn!("The store is still not ready, showing what is available");
    }
}
