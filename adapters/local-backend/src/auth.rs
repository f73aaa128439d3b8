//! Mock authentication service.
//!
//! Credentials are checked against a fixed in-memory directory (plaintext, a
//! local stand-in only) and the signed-in user is persisted through the
//! `LocalStore`, so the session survives restarts of a file-backed store.
//!
//! State machine: signed-out, or signed-in with exactly one session.
//!
//! Listeners registered with `on_auth_state_change` receive one initial event
//! reflecting the store at registration time. Further transitions are only
//! broadcast when `BackendOptions::live_auth_events` is set.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use domain::schema::Role;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::store::LocalStore;
use crate::BackendOptions;

/// Name given to sign-ups that don't provide one.
pub const DEFAULT_SIGNUP_NAME: &str = "Novo Usuário";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<domain::CoreError> for AuthError {
    fn from(err: domain::CoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

/// Identity of the signed-in actor as persisted. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignUpOptions {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub options: SignUpOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthData {
    pub user: Option<SessionUser>,
    pub session: Option<Session>,
}

/// Result of sign-in and sign-up: `{data: {user, session}, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub data: AuthData,
    pub error: Option<AuthError>,
}

impl AuthResponse {
    fn signed_in(user: SessionUser) -> Self {
        Self {
            data: AuthData {
                user: Some(user.clone()),
                session: Some(Session { user }),
            },
            error: None,
        }
    }

    fn failed(error: AuthError) -> Self {
        Self {
            data: AuthData::default(),
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Session, AuthError> {
        match (self.error, self.data.session) {
            (Some(err), _) => Err(err),
            (None, Some(session)) => Ok(session),
            (None, None) => Err(AuthError::InvalidCredentials),
        }
    }
}

/// Result of `get_session`: `{data: {session}, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub session: Option<Session>,
    pub error: Option<AuthError>,
}

/// Result of `sign_out`: `{error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutResponse {
    pub error: Option<AuthError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

impl AuthEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

struct DirectoryEntry {
    id: &'static str,
    email: &'static str,
    password: &'static str,
    role: Role,
    name: &'static str,
}

static DIRECTORY: [DirectoryEntry; 2] = [
    DirectoryEntry {
        id: "mock-admin-id",
        email: "admin@sistema.com",
        password: "admin123",
        role: Role::Admin,
        name: "Admin Sistema",
    },
    DirectoryEntry {
        id: "mock-user-id",
        email: "usuario@teste.com",
        password: "123456",
        role: Role::User,
        name: "Usuário Teste",
    },
];

type Listener = Arc<dyn Fn(AuthEvent, Option<Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    registered: BTreeMap<u64, Listener>,
}

/// Handle returned by `on_auth_state_change`.
pub struct AuthSubscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl AuthSubscription {
    /// Detach the listener. Safe to call after the service is gone.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock_listeners(&listeners).registered.remove(&self.id);
        }
    }
}

#[derive(Clone)]
pub struct MockAuth {
    store: LocalStore,
    options: BackendOptions,
    listeners: Arc<Mutex<Listeners>>,
}

impl MockAuth {
    pub fn new(store: LocalStore, options: BackendOptions) -> Self {
        Self {
            store,
            options,
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Check credentials against the directory and persist the session.
    pub async fn sign_in_with_password(&self, credentials: Credentials) -> AuthResponse {
        pause(self.options.auth_latency).await;

        let Some(entry) = DIRECTORY
            .iter()
            .find(|u| u.email == credentials.email && u.password == credentials.password)
        else {
            debug!("mock auth: sign-in rejected");
            return AuthResponse::failed(AuthError::InvalidCredentials);
        };

        let user = SessionUser {
            id: entry.id.to_string(),
            email: entry.email.to_string(),
            name: entry.name.to_string(),
            role: entry.role,
        };
        if let Err(e) = self.store.save_session(&user) {
            return AuthResponse::failed(e.into());
        }
        debug!(user_id = %user.id, "mock auth: signed in");
        self.broadcast(AuthEvent::SignedIn, Some(Session { user: user.clone() }));
        AuthResponse::signed_in(user)
    }

    /// Register and sign in a new account. Never fails on duplicates: there
    /// is no account table to check against, and the password is not kept.
    pub async fn sign_up(&self, request: SignUp) -> AuthResponse {
        pause(self.options.auth_latency).await;

        let user = SessionUser {
            id: format!("user-{}", uuid::Uuid::new_v4()),
            email: request.email,
            name: request
                .options
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SIGNUP_NAME.to_string()),
            role: Role::User,
        };
        if let Err(e) = self.store.save_session(&user) {
            return AuthResponse::failed(e.into());
        }
        debug!(user_id = %user.id, "mock auth: signed up");
        self.broadcast(AuthEvent::SignedIn, Some(Session { user: user.clone() }));
        AuthResponse::signed_in(user)
    }

    /// Clear the persisted session.
    pub async fn sign_out(&self) -> SignOutResponse {
        let error = self.store.clear_session().err().map(AuthError::from);
        if error.is_none() {
            debug!("mock auth: signed out");
            self.broadcast(AuthEvent::SignedOut, None);
        }
        SignOutResponse { error }
    }

    pub async fn get_session(&self) -> SessionResponse {
        pause(self.options.session_latency).await;
        match self.store.load_session() {
            Ok(user) => SessionResponse {
                session: user.map(|user| Session { user }),
                error: None,
            },
            Err(e) => SessionResponse {
                session: None,
                error: Some(e.into()),
            },
        }
    }

    /// Register a listener. It is called once, after `auth_event_delay`, with
    /// `SignedIn` and the session or `SignedOut` and `None`, depending on the
    /// store at that moment.
    ///
    /// Inside a Tokio runtime the deferred call is a spawned task; without one
    /// it runs on a short-lived thread after the same delay.
    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<Session>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(callback);
        let id = {
            let mut guard = lock_listeners(&self.listeners);
            let id = guard.next_id;
            guard.next_id += 1;
            guard.registered.insert(id, listener.clone());
            id
        };

        let store = self.store.clone();
        let delay = self.options.auth_event_delay;
        let weak = Arc::downgrade(&self.listeners);
        let deliver = move || {
            let still_registered = match weak.upgrade() {
                Some(listeners) => {
                    let registered = lock_listeners(&listeners).registered.contains_key(&id);
                    registered
                }
                None => false,
            };
            if still_registered {
                emit_current(&store, listener.as_ref());
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    pause(delay).await;
                    deliver();
                });
            }
            Err(_) => {
                trace!("mock auth: no runtime, deferring initial auth event on a thread");
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    deliver();
                });
            }
        }

        AuthSubscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock_listeners(&self.listeners).registered.len()
    }

    fn broadcast(&self, event: AuthEvent, session: Option<Session>) {
        if !self.options.live_auth_events {
            return;
        }
        // Call outside the lock so listeners may subscribe or unsubscribe.
        let targets: Vec<Listener> = lock_listeners(&self.listeners).registered.values().cloned().collect();
        trace!(event = event.as_str(), listeners = targets.len(), "mock auth: broadcasting");
        for listener in targets {
            listener(event, session.clone());
        }
    }
}

// A listener that panicked must not disable the rest.
fn lock_listeners(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

fn emit_current(store: &LocalStore, listener: &(dyn Fn(AuthEvent, Option<Session>) + Send + Sync)) {
    match store.load_session() {
        Ok(Some(user)) => listener(AuthEvent::SignedIn, Some(Session { user })),
        _ => listener(AuthEvent::SignedOut, None),
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
