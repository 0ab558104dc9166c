//! Read-only views computed from a task list, relative to a given day

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};

use crate::task::{Task, Urgency};
use crate::utils::date;

/// Tasks due on `day`, completed or not
pub fn due_on(tasks: &[Task], day: NaiveDate) -> Vec<Task> {
    tasks.iter()
        .filter(|task| task.due_date() == day)
        .cloned()
        .collect()
}

/// Uncompleted tasks that were due before `today`
pub fn overdue_as_of(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    tasks.iter()
        .filter(|task| task.due_date() < today && task.completed() == false)
        .cloned()
        .collect()
}

/// Uncompleted tasks due after `today`
pub fn upcoming_as_of(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    tasks.iter()
        .filter(|task| task.due_date() > today && task.completed() == false)
        .cloned()
        .collect()
}

/// Uncompleted tasks due in the 7 days after `today`
pub fn due_within_next_week(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    tasks.iter()
        .filter(|task| task.completed() == false && date::is_within_next_week(task.due_date(), today))
        .cloned()
        .collect()
}

/// The share (0 to 100, rounded half up) of the tasks due on `day` that are completed.
///
/// A day without any task is considered 100% complete.
pub fn completion_percentage(tasks: &[Task], day: NaiveDate) -> u32 {
    let todays: Vec<&Task> = tasks.iter().filter(|task| task.due_date() == day).collect();
    let total = todays.len() as u64;
    if total == 0 {
        return 100;
    }
    let completed = todays.iter().filter(|task| task.completed()).count() as u64;
    ((200 * completed + total) / (2 * total)) as u32
}

/// Tasks whose title contains `query`, ignoring case. A blank query matches everything.
pub fn search(tasks: &[Task], query: &str) -> Vec<Task> {
    let query = query.trim();
    if query.is_empty() {
        return tasks.to_vec();
    }
    let query = query.to_lowercase();
    tasks.iter()
        .filter(|task| task.title().to_lowercase().contains(&query))
        .cloned()
        .collect()
}

/// The result of a search, split into what is left to do and what is done
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub active: Vec<Task>,
    pub completed: Vec<Task>,
}

pub fn partition_search(tasks: &[Task], query: &str) -> SearchResults {
    let (completed, active): (Vec<Task>, Vec<Task>) = search(tasks, query)
        .into_iter()
        .partition(|task| task.completed());
    SearchResults { active, completed }
}

/// Overdue tasks, grouped by due date, the most recent date first
pub fn overdue_by_date(tasks: &[Task], today: NaiveDate) -> Vec<(NaiveDate, Vec<Task>)> {
    let mut groups: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for task in overdue_as_of(tasks, today) {
        groups.entry(task.due_date()).or_insert_with(Vec::new).push(task);
    }
    groups.into_iter().rev().collect()
}


/// Figures shown on top of a dashboard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DashboardStats {
    /// Urgent tasks that are not completed yet, whatever their due date
    pub high_priority_count: usize,
    /// Tasks that have been completed on `today` (local time)
    pub completed_today: usize,
    pub total_tasks: usize,
}

impl DashboardStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let high_priority_count = tasks.iter()
            .filter(|task| task.urgency() > Urgency::Important && task.completed() == false)
            .count();
        let completed_today = tasks.iter()
            .filter_map(|task| task.completed_at())
            .filter(|completed_at| completed_at.with_timezone(&Local).date_naive() == today)
            .count();

        Self {
            high_priority_count,
            completed_today,
            total_tasks: tasks.len(),
        }
    }
}
