//! A collection hosted by a JSON document service, reached over HTTP
//!
//! Documents live at `{base}/users/{owner}/tasks/{id}`:
//! * `PUT` (with `If-None-Match: *`) creates a document
//! * `PATCH` merges fields into a document
//! * `DELETE` removes a document
//! * `GET {base}/users/{owner}/tasks` lists the documents of an owner, as a JSON array
//!
//! The service has no push channel, so live queries poll the listing and send a snapshot whenever it changes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::IF_NONE_MATCH;
use reqwest::{Method, Request, RequestBuilder, StatusCode};
use url::Url;

use crate::collection::parse_documents;
use crate::error::RemoteError;
use crate::task::{Task, TaskId, TaskPatch, UserId};
use crate::traits::{RemoteCollection, SnapshotReceiver};

/// Just a wrapper around a base URL and credentials
#[derive(Clone, Debug)]
pub struct Endpoint {
    url: Url,
    token: Option<String>,
}

impl Endpoint {
    pub fn new(url: Url, token: Option<String>) -> Self {
        Self { url, token }
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn token(&self) -> Option<&str> { self.token.as_deref() }

    /// The URL that lists the documents of `owner`
    pub fn tasks_url(&self, owner: &UserId) -> Result<Url, RemoteError> {
        self.build_url(&["users", owner.as_str(), "tasks"])
    }

    /// The URL of a single document
    pub fn task_url(&self, owner: &UserId, id: &TaskId) -> Result<Url, RemoteError> {
        self.build_url(&["users", owner.as_str(), "tasks", id.as_str()])
    }

    // Segments are percent-encoded, so that ids cannot escape their owner's partition
    fn build_url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut built = self.url.clone();
        built.path_segments_mut()
            .map_err(|_| RemoteError::new(format!("{} cannot be used as a base URL", self.url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(built)
    }
}


/// A [`RemoteCollection`] backed by a JSON document service
#[derive(Clone, Debug)]
pub struct RestCollection {
    endpoint: Endpoint,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl RestCollection {
    /// Create a collection. This does not start a connection
    pub fn new(endpoint: Endpoint, poll_interval: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::config::product_name())
            .build()?;
        Ok(Self { endpoint, client, poll_interval })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.endpoint.token() {
            None => builder,
            Some(token) => builder.bearer_auth(token),
        }
    }

    /// The request that creates the document of `task`
    fn create_request(&self, task: &Task) -> Result<Request, RemoteError> {
        let url = self.endpoint.task_url(task.owner_id(), task.id())?;
        Ok(self.request(Method::PUT, url)
            .header(IF_NONE_MATCH, "*")
            .json(task)
            .build()?)
    }

    /// The request that merges `patch` into a document
    fn update_request(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<Request, RemoteError> {
        let url = self.endpoint.task_url(owner, id)?;
        Ok(self.request(Method::PATCH, url)
            .json(patch)
            .build()?)
    }

    /// Fetch the current documents of `owner`
    pub async fn fetch(&self, owner: &UserId) -> Result<Vec<Task>, RemoteError> {
        let url = self.endpoint.tasks_url(owner)?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status().is_success() == false {
            return Err(unexpected_status(response.status()));
        }
        let text = response.text().await?;
        Ok(parse_documents(&text)?)
    }
}

fn unexpected_status(status: StatusCode) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::new(format!("Permission denied ({})", status)),
        _ => RemoteError::new(format!("Unexpected HTTP status code {:?}", status)),
    }
}

#[async_trait]
impl RemoteCollection for RestCollection {
    async fn create_document(&self, task: &Task) -> Result<TaskId, RemoteError> {
        let request = self.create_request(task)?;
        let response = self.client.execute(request).await?;

        if response.status().is_success() == false {
            return Err(unexpected_status(response.status()));
        }
        Ok(task.id().clone())
    }

    async fn update_fields(&self, owner: &UserId, id: &TaskId, patch: &TaskPatch) -> Result<(), RemoteError> {
        let request = self.update_request(owner, id, patch)?;
        let response = self.client.execute(request).await?;

        if response.status().is_success() == false {
            return Err(unexpected_status(response.status()));
        }
        Ok(())
    }

    async fn delete_document(&self, owner: &UserId, id: &TaskId) -> Result<(), RemoteError> {
        let url = self.endpoint.task_url(owner, id)?;
        let response = self.request(Method::DELETE, url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            log::debug!("Document {} was already deleted", id);
            return Ok(());
        }
        if status.is_success() == false {
            return Err(unexpected_status(status));
        }
        Ok(())
    }

    async fn subscribe(&self, owner: &UserId) -> Result<SnapshotReceiver, RemoteError> {
        let first = self.fetch(owner).await?;
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let _ = sender.send(Ok(first.clone()));

        let this = self.clone();
        let owner = owner.clone();
        tokio::spawn(async move {
            let mut last = Ok(first);
            loop {
                tokio::time::sleep(this.poll_interval).await;
                if sender.is_closed() {
                    log::debug!("Live query for {} has been cancelled", owner);
                    break;
                }

                let current = this.fetch(&owner).await;
                if current == last {
                    continue;
                }
                if let Err(err) = &current {
                    log::warn!("Unable to poll the tasks of {}: {}", owner, err);
                }
                if sender.send(current.clone()).is_err() {
                    break;
                }
                last = current;
            }
        });

        Ok(receiver)
    }
}
