//! Some utility functions

pub mod date;

use chrono::NaiveDate;

use crate::store::TaskStore;
use crate::task::{Task, Urgency};

/// A debug utility that pretty-prints a task
pub fn print_task(task: &Task) {
    let completion = if task.completed() { "✓" } else { " " };
    let urgency = match task.urgency() {
        Urgency::Normal => " ",
        Urgency::Important => "!",
        Urgency::Urgent => "‼",
    };
    println!("    {}{} {}\t{}\t{}", completion, urgency, task.title(), date::format_for_input(task.due_date()), task.id());
}

/// A debug utility that pretty-prints the dashboard of a store, as of `today`
pub fn print_dashboard(store: &TaskStore, today: NaiveDate) {
    println!("Today ({}), {}% done", date::format_for_display(today), store.completion_percentage_on(today));
    for task in store.tasks_on(today) {
        print_task(&task);
    }

    println!("Overdue");
    for task in store.overdue_tasks_as_of(today) {
        println!("  {}", date::overdue_label(task.due_date(), today));
        print_task(&task);
    }

    println!("Upcoming");
    for task in store.upcoming_tasks_as_of(today) {
        print_task(&task);
    }
}
