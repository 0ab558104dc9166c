//! An authentication service that only lives in memory

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::mock_behaviour::MockBehaviour;
use crate::session::Identity;
use crate::task::UserId;
use crate::traits::AuthService;

const MIN_PASSWORD_LENGTH: usize = 6;

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct AuthData {
    /// Accounts, by email
    accounts: HashMap<String, Account>,
    current: Option<Identity>,
    listeners: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

/// An in-memory [`AuthService`], with email/password accounts
#[derive(Default)]
pub struct MemoryAuth {
    data: Mutex<AuthData>,
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mock_behaviour(mock_behaviour: Arc<Mutex<MockBehaviour>>) -> Self {
        Self { data: Mutex::new(AuthData::default()), mock_behaviour: Some(mock_behaviour) }
    }

    fn data(&self) -> MutexGuard<'_, AuthData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check<F>(&self, f: F) -> Result<(), AuthError>
    where
        F: FnOnce(&mut MockBehaviour) -> Result<(), crate::error::RemoteError>,
    {
        match &self.mock_behaviour {
            None => Ok(()),
            Some(b) => {
                let mut behaviour = b.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                f(&mut *behaviour).map_err(|err| AuthError::new(err.message()))
            },
        }
    }

    /// Register an account, without signing in
    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        let identity = new_identity(email).with_display_name(display_name.map(|s| s.to_string()));
        self.data().accounts.insert(email.to_string(), Account {
            password: password.to_string(),
            identity: identity.clone(),
        });
        identity
    }

    /// Pretend a session was restored for this account (e.g. from a previous run).
    /// This only makes sense before [`AuthService::session_changes`] is called.
    pub fn restore_session(&self, email: &str) -> Option<Identity> {
        let mut data = self.data();
        let identity = data.accounts.get(email).map(|account| account.identity.clone());
        data.current = identity.clone();
        identity
    }

    /// Change the session on the service side, and tell the listeners
    pub fn force_session(&self, identity: Option<Identity>) {
        let mut data = self.data();
        data.current = identity.clone();
        data.listeners.retain(|listener| listener.send(identity.clone()).is_ok());
    }

    /// Make the current session expire
    pub fn expire_session(&self) {
        self.force_session(None);
    }

    pub fn current(&self) -> Option<Identity> {
        self.data().current.clone()
    }
}

fn new_identity(email: &str) -> Identity {
    let uid = Uuid::new_v4().to_hyphenated().to_string();
    Identity::new(UserId::from(uid), Some(email.to_string()), None)
}

#[async_trait]
impl AuthService for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.check(|b| b.can_sign_in())?;
        let mut data = self.data();
        let identity = match data.accounts.get(email) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(AuthError::new("Invalid email or password")),
        };
        data.current = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if email.contains('@') == false {
            return Err(AuthError::new("Invalid email address"));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::new(format!("Password should be at least {} characters", MIN_PASSWORD_LENGTH)));
        }

        let mut data = self.data();
        if data.accounts.contains_key(email) {
            return Err(AuthError::new("Email already in use"));
        }
        let identity = new_identity(email);
        data.accounts.insert(email.to_string(), Account {
            password: password.to_string(),
            identity: identity.clone(),
        });
        data.current = Some(identity.clone());
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError> {
        let mut data = self.data();
        let current = data.current.clone().ok_or_else(|| AuthError::new("No user is signed in"))?;
        let updated = current.with_display_name(Some(display_name.to_string()));
        if let Some(email) = updated.email() {
            if let Some(account) = data.accounts.get_mut(email) {
                account.identity = updated.clone();
            }
        }
        data.current = Some(updated.clone());
        Ok(updated)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.check(|b| b.can_sign_out())?;
        self.data().current = None;
        Ok(())
    }

    fn session_changes(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut data = self.data();
        let _ = sender.send(data.current.clone());
        data.listeners.push(sender);
        receiver
    }
}
