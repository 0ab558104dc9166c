//! This crate keeps a local mirror of a user's to-do tasks, stored in a remote document collection.
//!
//! Tasks are stored in a [`RemoteCollection`](traits::RemoteCollection), partitioned by owner.
//! Several collections are provided in the [`collection`] module: an in-memory one, a local one (for when no server is available), and an HTTP one.
//!
//! A [`SessionProvider`](session::SessionProvider) tracks who is signed in, on top of an [`AuthService`](traits::AuthService). \
//! A [`TaskStore`](store::TaskStore) follows it, and mirrors the tasks of the signed-in user. It also provides the usual views
//! (tasks due today, overdue tasks, upcoming tasks, completion percentage...). \
//! An [`AppContext`](context::AppContext) wires both together.

pub mod traits;
pub mod error;
pub mod config;

mod task;
pub use task::{CompletionStatus, Task, TaskChanges, TaskId, TaskPatch, Urgency, UserId};
pub mod session;
pub use session::{Identity, SessionProvider, SessionState};
pub mod store;
pub use store::TaskStore;
pub mod collection;
pub mod context;
pub use context::AppContext;

pub mod mock_behaviour;
pub mod utils;
