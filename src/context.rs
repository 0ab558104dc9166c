//! Everything an application needs, wired together

use std::path::Path;
use std::sync::Arc;

use crate::collection::local::{FileSlot, LocalCollection};
use crate::collection::rest::{Endpoint, RestCollection};
use crate::config::StoreConfig;
use crate::error::RemoteError;
use crate::session::SessionProvider;
use crate::store::TaskStore;
use crate::traits::{AuthService, RemoteCollection};

/// A session provider, and a task store that follows it.
///
/// Create it when the application starts, hand it to the views, and [`shut it down`](Self::shutdown) when the application exits.
pub struct AppContext {
    session: SessionProvider,
    tasks: TaskStore,
}

impl AppContext {
    /// Start tracking the session of `auth`, and mirror the tasks of the signed-in user from `collection`.
    ///
    /// This must be called within a Tokio runtime.
    pub fn init(auth: Arc<dyn AuthService>, collection: Arc<dyn RemoteCollection>, config: StoreConfig) -> Self {
        let session = SessionProvider::start(auth);
        let tasks = TaskStore::new(collection, config);
        tasks.bind(&session);
        log::info!("Application context is ready");
        Self { session, tasks }
    }

    /// Same as [`Self::init`], with the collection described by `config`:
    /// an HTTP document service if `remote_url` is set, or a local collection stored in `data_folder` otherwise.
    pub fn from_config(auth: Arc<dyn AuthService>, config: StoreConfig, data_folder: &Path) -> Result<Self, RemoteError> {
        let collection: Arc<dyn RemoteCollection> = match &config.remote_url {
            Some(url) => {
                log::info!("Using the remote collection at {}", url);
                let endpoint = Endpoint::new(url.clone(), config.remote_token.clone());
                Arc::new(RestCollection::new(endpoint, config.poll_interval())?)
            },
            None => {
                log::info!("Using a local collection in {:?}", data_folder);
                Arc::new(LocalCollection::new(FileSlot::new(data_folder), &config.storage_key))
            },
        };
        Ok(Self::init(auth, collection, config))
    }

    pub fn session(&self) -> &SessionProvider {
        &self.session
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    /// Stop every background activity. Cached tasks are forgotten
    pub fn shutdown(self) {
        self.tasks.shutdown();
        self.session.shutdown();
        log::info!("Application context has been shut down");
    }
}
