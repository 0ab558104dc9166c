//! To-do tasks, and the changes that can be applied to them

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// The opaque identifier of a task
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId {
    content: String,
}

impl TaskId {
    /// Generate a random TaskId.
    pub fn random() -> Self {
        let random = Uuid::new_v4().to_hyphenated().to_string();
        Self { content: random }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl From<String> for TaskId {
    fn from(content: String) -> Self {
        Self { content }
    }
}
impl From<&str> for TaskId {
    fn from(content: &str) -> Self {
        Self { content: content.to_string() }
    }
}
impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.content)
    }
}


/// The unique id of a user, as given by the authentication service
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId {
    content: String,
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.content
    }
}

impl From<String> for UserId {
    fn from(content: String) -> Self {
        Self { content }
    }
}
impl From<&str> for UserId {
    fn from(content: &str) -> Self {
        Self { content: content.to_string() }
    }
}
impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.content)
    }
}


/// How pressing a task is. Stored as its ordinal (0, 1 or 2)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Urgency {
    Normal = 0,
    Important = 1,
    Urgent = 2,
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

impl Urgency {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Urgency {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Urgency::Normal),
            1 => Ok(Urgency::Important),
            2 => Ok(Urgency::Urgent),
            other => Err(format!("Invalid urgency level {} (expected 0, 1 or 2)", other)),
        }
    }
}

impl Display for Urgency {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Urgency::Normal => write!(f, "normal"),
            Urgency::Important => write!(f, "important"),
            Urgency::Urgent => write!(f, "urgent"),
        }
    }
}

/// Used to support serde
impl Serialize for Urgency {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}
/// Used to support serde
impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D>(deserializer: D) -> Result<Urgency, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = u8::deserialize(deserializer)?;
        Urgency::try_from(level).map_err(serde::de::Error::custom)
    }
}


/// A task is either completed (at a given instant) or not.
///
/// Keeping the completion flag and its timestamp in a single enum makes it impossible to have a
/// completion date on an uncompleted task (or the opposite).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed(DateTime<Utc>),
    Uncompleted,
}

impl CompletionStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionStatus::Completed(_))
    }

    pub fn completed_at(&self) -> Option<&DateTime<Utc>> {
        match self {
            CompletionStatus::Completed(date) => Some(date),
            CompletionStatus::Uncompleted => None,
        }
    }

    /// The status a toggle would lead to, if it happened at `now`
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        match self {
            CompletionStatus::Completed(_) => CompletionStatus::Uncompleted,
            CompletionStatus::Uncompleted => CompletionStatus::Completed(now),
        }
    }
}


/// A to-do task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskDocument", into = "TaskDocument")]
pub struct Task {
    id: TaskId,
    /// The display name of the task. Never empty.
    title: String,
    due_date: NaiveDate,
    urgency: Urgency,
    completion_status: CompletionStatus,
    owner_id: UserId,
    created_at: DateTime<Utc>,
}

impl Task {
    /// Create a brand new, uncompleted task.
    /// This will pick a new (random) task ID.
    pub fn new(title: String, due_date: NaiveDate, urgency: Urgency, owner_id: UserId) -> Self {
        Self::new_with_parameters(TaskId::random(), title, due_date, urgency,
                                  CompletionStatus::Uncompleted, owner_id, Utc::now())
    }

    /// Create a Task instance, that may exist in a collection already
    pub fn new_with_parameters(id: TaskId, title: String, due_date: NaiveDate, urgency: Urgency,
                               completion_status: CompletionStatus, owner_id: UserId,
                               created_at: DateTime<Utc>) -> Self
    {
        Self { id, title, due_date, urgency, completion_status, owner_id, created_at }
    }

    pub fn id(&self) -> &TaskId                { &self.id }
    pub fn title(&self) -> &str                { &self.title }
    pub fn due_date(&self) -> NaiveDate        { self.due_date }
    pub fn urgency(&self) -> Urgency           { self.urgency }
    pub fn owner_id(&self) -> &UserId          { &self.owner_id }
    pub fn created_at(&self) -> &DateTime<Utc> { &self.created_at }
    pub fn completed(&self) -> bool            { self.completion_status.is_completed() }
    pub fn completed_at(&self) -> Option<&DateTime<Utc>>    { self.completion_status.completed_at() }
    pub fn completion_status(&self) -> &CompletionStatus    { &self.completion_status }

    /// Collections sometimes pick their own ids on creation
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn set_completion_status(&mut self, new_completion_status: CompletionStatus) {
        self.completion_status = new_completion_status;
    }

    /// Merge a set of field changes into this task.
    /// The id, owner and creation date are never affected.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(urgency) = patch.urgency {
            self.urgency = urgency;
        }
        if let Some(completion) = &patch.completion {
            self.completion_status = completion.clone();
        }
    }
}


/// The flat document a task is stored as, e.g.
/// `{"id": "..", "title": "..", "dueDate": "2025-04-20", "urgency": 2, "completed": false, "completedAt": null, ...}`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDocument {
    id: TaskId,
    title: String,
    due_date: NaiveDate,
    #[serde(default)]
    urgency: Urgency,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    owner_id: UserId,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskDocument> for Task {
    type Error = String;

    fn try_from(doc: TaskDocument) -> Result<Self, Self::Error> {
        let completion_status = match (doc.completed, doc.completed_at) {
            (true, Some(date)) => CompletionStatus::Completed(date),
            (false, None) => CompletionStatus::Uncompleted,
            (true, None) => return Err(format!("Task {} is completed but has no completion date", doc.id)),
            (false, Some(_)) => return Err(format!("Task {} is not completed but has a completion date", doc.id)),
        };
        Ok(Task::new_with_parameters(doc.id, doc.title, doc.due_date, doc.urgency,
                                     completion_status, doc.owner_id, doc.created_at))
    }
}

impl From<Task> for TaskDocument {
    fn from(task: Task) -> Self {
        Self {
            completed: task.completed(),
            completed_at: task.completed_at().cloned(),
            id: task.id,
            title: task.title,
            due_date: task.due_date,
            urgency: task.urgency,
            owner_id: task.owner_id,
            created_at: task.created_at,
        }
    }
}


/// Fields to merge into an existing task, as sent to a collection.
///
/// Unlike [`TaskChanges`], these values have already been validated, and the completion date has
/// already been decided.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub urgency: Option<Urgency>,
    pub completion: Option<CompletionStatus>,
}

impl TaskPatch {
    pub fn completion(status: CompletionStatus) -> Self {
        Self { completion: Some(status), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.due_date.is_none() && self.urgency.is_none() && self.completion.is_none()
    }
}

/// Serialized as the subset of the document fields that change
impl Serialize for TaskPatch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(title) = &self.title {
            map.serialize_entry("title", title)?;
        }
        if let Some(due_date) = &self.due_date {
            map.serialize_entry("dueDate", due_date)?;
        }
        if let Some(urgency) = &self.urgency {
            map.serialize_entry("urgency", urgency)?;
        }
        if let Some(completion) = &self.completion {
            map.serialize_entry("completed", &completion.is_completed())?;
            map.serialize_entry("completedAt", &completion.completed_at())?;
        }
        map.end()
    }
}


/// Changes a user wants to make to a task. Nothing is validated yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub due_date: Option<String>,
    pub urgency: Option<Urgency>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn due_date<S: Into<String>>(mut self, due_date: S) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    pub fn urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }
}
