//! Who is signed in
//!
//! A [`SessionProvider`] wraps an [`AuthService`] and keeps track of the current [`SessionState`].
//! Other parts of the application can either [`watch`](SessionProvider::watch) it, or register callbacks with [`subscribe`](SessionProvider::subscribe).

pub mod memory;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::AuthError;
use crate::task::UserId;
use crate::traits::AuthService;

/// An authenticated user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    uid: UserId,
    email: Option<String>,
    display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: UserId, email: Option<String>, display_name: Option<String>) -> Self {
        Self { uid, email, display_name }
    }

    pub fn uid(&self) -> &UserId { &self.uid }
    pub fn email(&self) -> Option<&str> { self.email.as_deref() }
    pub fn display_name(&self) -> Option<&str> { self.display_name.as_deref() }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }
}

/// The state of a session.
///
/// `Unknown` is the initial state, until the auth service tells whether a session exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unknown,
    Authenticated(Identity),
    Anonymous,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Unknown
    }
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        *self == SessionState::Unknown
    }

    /// Whether going from `self` to `other` is a change of user (or of loading state)
    fn is_other_user_than(&self, other: &SessionState) -> bool {
        match (self, other) {
            (SessionState::Authenticated(a), SessionState::Authenticated(b)) => a.uid() != b.uid(),
            (a, b) => std::mem::discriminant(a) != std::mem::discriminant(b),
        }
    }
}


type Callback = Box<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    next_id: u64,
    entries: HashMap<u64, Arc<Callback>>,
}

struct SessionInner {
    service: Arc<dyn AuthService>,
    state: watch::Sender<SessionState>,
    callbacks: Mutex<Callbacks>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    fn callbacks(&self) -> MutexGuard<'_, Callbacks> {
        self.callbacks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to the session described by `identity`.
    ///
    /// Subscribers are only called when this is another user (a refreshed session of the same user only updates the state).
    fn apply(&self, identity: Option<Identity>) {
        let new_state = match identity {
            Some(identity) => SessionState::Authenticated(identity),
            None => SessionState::Anonymous,
        };
        let previous = self.state.send_replace(new_state.clone());
        if previous.is_other_user_than(&new_state) == false {
            return;
        }

        match &new_state {
            SessionState::Authenticated(identity) => log::info!("Signed in as {}", identity.uid()),
            _ => log::info!("No user is signed in"),
        }

        // Callbacks may subscribe or unsubscribe, so they must not run under the lock
        let callbacks: Vec<Arc<Callback>> = self.callbacks().entries.values().cloned().collect();
        for callback in callbacks {
            callback(&new_state);
        }
    }
}


/// Keeps track of the current user, on top of an [`AuthService`]
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<SessionInner>,
}

impl SessionProvider {
    /// Start listening to the session changes of `service`.
    ///
    /// The state is [`SessionState::Unknown`] until the service reports the initial session.
    /// This must be called within a Tokio runtime.
    pub fn start(service: Arc<dyn AuthService>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        let inner = Arc::new(SessionInner {
            service,
            state,
            callbacks: Mutex::new(Callbacks::default()),
            listener: Mutex::new(None),
        });

        let mut changes = inner.service.session_changes();
        let weak = Arc::downgrade(&inner);
        let handle = tokio::spawn(async move {
            let mut first = true;
            while let Some(identity) = changes.recv().await {
                let inner = match weak.upgrade() {
                    None => break,
                    Some(inner) => inner,
                };
                // An explicit sign-in/out may have happened before the restored session is known
                if first && inner.state.borrow().is_loading() == false {
                    log::debug!("Ignoring the restored session, a newer one is already active");
                } else {
                    inner.apply(identity);
                }
                first = false;
            }
            log::debug!("Session changes are no longer listened to");
        });
        *inner.listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        Self { inner }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn display_name(&self) -> Option<String> {
        self.current_identity().and_then(|i| i.display_name().map(|s| s.to_string()))
    }

    pub fn email(&self) -> Option<String> {
        self.current_identity().and_then(|i| i.email().map(|s| s.to_string()))
    }

    /// Get notified of every state change
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Register a callback, that is invoked every time the signed-in user changes.
    ///
    /// The callback is released when the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks();
        let id = callbacks.next_id;
        callbacks.next_id += 1;
        callbacks.entries.insert(id, Arc::new(Box::new(callback)));
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        match self.inner.service.sign_in(email, password).await {
            Ok(identity) => {
                self.inner.apply(Some(identity));
                Ok(())
            },
            Err(err) => {
                log::warn!("Unable to sign in as {}: {}", email, err);
                Err(err)
            }
        }
    }

    /// Create an account (and sign in). The display name is set unless it is blank.
    ///
    /// Once the account exists, the session is authenticated even if setting the display name fails.
    /// That failure is still returned.
    pub async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<(), AuthError> {
        let identity = match self.inner.service.sign_up(email, password).await {
            Ok(identity) => identity,
            Err(err) => {
                log::warn!("Unable to sign up as {}: {}", email, err);
                return Err(err);
            }
        };
        self.inner.apply(Some(identity));

        if display_name.trim().is_empty() {
            return Ok(());
        }
        match self.inner.service.update_display_name(display_name.trim()).await {
            Ok(renamed) => {
                self.inner.apply(Some(renamed));
                Ok(())
            },
            Err(err) => {
                log::warn!("Signed up as {}, but unable to set the display name: {}", email, err);
                Err(err)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        match self.inner.service.sign_out().await {
            Ok(()) => {
                self.inner.apply(None);
                Ok(())
            },
            Err(err) => {
                log::warn!("Unable to sign out: {}", err);
                Err(err)
            }
        }
    }

    /// Stop listening to the auth service. The current state is kept
    pub fn shutdown(&self) {
        let handle = self.inner.listener.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}


/// A registered session callback. Dropping it unregisters the callback.
#[must_use = "the callback is unregistered as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    inner: Weak<SessionInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // See Drop
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.callbacks().entries.remove(&self.id);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn identity(uid: &str) -> Identity {
        Identity::new(UserId::from(uid), None, None)
    }

    #[test]
    fn user_changes() {
        let alice = SessionState::Authenticated(identity("alice"));
        let alice_renamed = SessionState::Authenticated(identity("alice").with_display_name(Some("Al".to_string())));
        let bob = SessionState::Authenticated(identity("bob"));

        assert!(SessionState::Unknown.is_other_user_than(&SessionState::Anonymous));
        assert!(SessionState::Unknown.is_other_user_than(&alice));
        assert!(alice.is_other_user_than(&bob));
        assert!(alice.is_other_user_than(&SessionState::Anonymous));
        assert!(alice.is_other_user_than(&alice_renamed) == false);
        assert!(SessionState::Anonymous.is_other_user_than(&SessionState::Anonymous) == false);
    }
}
