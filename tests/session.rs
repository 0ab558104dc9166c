//! The session state machine, on top of an in-memory auth service

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use task_fridge::error::AuthError;
use task_fridge::mock_behaviour::MockBehaviour;
use task_fridge::session::memory::MemoryAuth;
use task_fridge::traits::AuthService;
use task_fridge::{Identity, SessionProvider, SessionState};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wait until `condition` holds for the session state
async fn wait_for<F>(session: &SessionProvider, condition: F)
where
    F: Fn(&SessionState) -> bool,
{
    let mut changes = session.watch();
    let waiting = async {
        while condition(&changes.borrow_and_update()) == false {
            if changes.changed().await.is_err() {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), waiting).await
        .expect("the session did not reach the expected state in time");
}

async fn settled(auth: Arc<MemoryAuth>) -> SessionProvider {
    let session = SessionProvider::start(auth);
    wait_for(&session, |state| state.is_loading() == false).await;
    session
}

/// Records every state the callbacks are invoked with
fn recorder() -> (Arc<Mutex<Vec<SessionState>>>, impl Fn(&SessionState) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_callback = seen.clone();
    (seen, move |state: &SessionState| seen_by_callback.lock().unwrap().push(state.clone()))
}

#[tokio::test]
async fn without_a_session_the_state_becomes_anonymous() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let session = SessionProvider::start(auth.clone());
    wait_for(&session, |state| *state == SessionState::Anonymous).await;
    assert!(session.current_identity().is_none());
    assert!(session.email().is_none());
}

#[tokio::test]
async fn a_restored_session_is_authenticated() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let alice = auth.add_account("alice@example.com", "secret123", Some("Alice"));
    auth.restore_session("alice@example.com");

    let session = settled(auth).await;
    assert_eq!(session.state(), SessionState::Authenticated(alice));
    assert_eq!(session.display_name().as_deref(), Some("Alice"));
    assert_eq!(session.email().as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn sign_in_and_out() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let alice = auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth.clone()).await;

    let err = session.sign_in("alice@example.com", "wrong").await.unwrap_err();
    assert_eq!(err.message(), "Invalid email or password");
    assert_eq!(session.state(), SessionState::Anonymous);

    session.sign_in("alice@example.com", "secret123").await.unwrap();
    assert_eq!(session.current_identity(), Some(alice));

    session.sign_out().await.unwrap();
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(auth.current().is_none());
}

#[tokio::test]
async fn sign_up_sets_the_display_name() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let session = settled(auth.clone()).await;

    session.sign_up("alice@example.com", "secret123", "  Alice ").await.unwrap();
    assert_eq!(session.display_name().as_deref(), Some("Alice"));
    assert_eq!(auth.current().unwrap().display_name(), Some("Alice"));

    session.sign_out().await.unwrap();
    session.sign_up("bob@example.com", "secret123", "   ").await.unwrap();
    assert!(session.display_name().is_none());
    assert_eq!(session.email().as_deref(), Some("bob@example.com"));

    let err = session.sign_up("bob@example.com", "secret123", "Bob").await.unwrap_err();
    assert_eq!(err.message(), "Email already in use");
    assert_eq!(session.email().as_deref(), Some("bob@example.com"));
}

/// A service whose accounts cannot be renamed
struct NoProfileUpdates {
    auth: MemoryAuth,
}

#[async_trait]
impl AuthService for NoProfileUpdates {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.auth.sign_in(email, password).await
    }
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.auth.sign_up(email, password).await
    }
    async fn update_display_name(&self, _display_name: &str) -> Result<Identity, AuthError> {
        Err(AuthError::new("Profile update failed"))
    }
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await
    }
    fn session_changes(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
        self.auth.session_changes()
    }
}

#[tokio::test]
async fn sign_up_with_a_failing_rename_is_still_signed_in() {
    init_logger();
    let service = Arc::new(NoProfileUpdates { auth: MemoryAuth::new() });
    let session = SessionProvider::start(service.clone());
    wait_for(&session, |state| state.is_loading() == false).await;

    let (seen, callback) = recorder();
    let _subscription = session.subscribe(callback);

    let err = session.sign_up("alice@example.com", "secret123", "Alice").await.unwrap_err();
    assert_eq!(err.message(), "Profile update failed");

    let created = service.auth.current().unwrap();
    assert_eq!(session.current_identity(), Some(created.clone()));
    assert!(session.display_name().is_none());
    assert_eq!(*seen.lock().unwrap(), vec![SessionState::Authenticated(created)]);
}

#[tokio::test]
async fn callbacks_are_called_on_user_changes_only() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let alice = auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth.clone()).await;

    let (seen, callback) = recorder();
    let subscription = session.subscribe(callback);

    session.sign_in("alice@example.com", "secret123").await.unwrap();
    // Same user again: the state is refreshed, but this is not a change of user
    session.sign_in("alice@example.com", "secret123").await.unwrap();
    session.sign_out().await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![SessionState::Authenticated(alice), SessionState::Anonymous]);

    drop(subscription);
    session.sign_in("alice@example.com", "secret123").await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn explicit_unsubscribe() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth).await;

    let (kept, callback) = recorder();
    let _kept = session.subscribe(callback);
    let (released, callback) = recorder();
    session.subscribe(callback).unsubscribe();

    session.sign_in("alice@example.com", "secret123").await.unwrap();
    assert_eq!(kept.lock().unwrap().len(), 1);
    assert!(released.lock().unwrap().is_empty());
}

#[tokio::test]
async fn service_side_expiry() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth.clone()).await;
    session.sign_in("alice@example.com", "secret123").await.unwrap();

    let (seen, callback) = recorder();
    let _subscription = session.subscribe(callback);
    auth.expire_session();
    wait_for(&session, |state| *state == SessionState::Anonymous).await;
    assert_eq!(*seen.lock().unwrap(), vec![SessionState::Anonymous]);
}

#[tokio::test]
async fn failing_service() {
    init_logger();
    let mock = Arc::new(Mutex::new(MockBehaviour::new()));
    let auth = Arc::new(MemoryAuth::with_mock_behaviour(mock.clone()));
    auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth.clone()).await;

    mock.lock().unwrap().sign_in_behaviour = (0, 1);
    assert!(session.sign_in("alice@example.com", "secret123").await.is_err());
    assert_eq!(session.state(), SessionState::Anonymous);

    session.sign_in("alice@example.com", "secret123").await.unwrap();
    mock.lock().unwrap().sign_out_behaviour = (0, 1);
    assert!(session.sign_out().await.is_err());
    assert!(session.current_identity().is_some());
}

#[tokio::test]
async fn shutdown_stops_listening() {
    init_logger();
    let auth = Arc::new(MemoryAuth::new());
    let alice = auth.add_account("alice@example.com", "secret123", None);
    let session = settled(auth.clone()).await;
    session.sign_in("alice@example.com", "secret123").await.unwrap();

    session.shutdown();
    auth.expire_session();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.state(), SessionState::Authenticated(alice));
}
