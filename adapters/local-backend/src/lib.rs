//! local-backend: in-process stand-in for the hosted backend.
//!
//! Purpose
//! - Offer the same surface the hosted backend client exposes (`from`, `auth`,
//!   `channel`) so callers don't care which one is active.
//! - Keep all state in a `KeyValueStore`: one JSON array per collection and one
//!   entry for the signed-in user.
//!
//! API
//! - `LocalBackend::from(collection)` → `QueryBuilder` (chain, then a terminal).
//! - `LocalBackend::auth()` → `MockAuth` (sign in/up/out, session, listeners).
//! - `LocalBackend::channel(name)` → `Channel` (accepts subscriptions, never fires).
//!
//! Notes
//! - Every terminal and auth call waits a configurable latency first so UI
//!   loading states can be exercised; tests run on Tokio's paused clock.
//! - Credentials are plaintext and local. This is not a security boundary.

use std::sync::Arc;
use std::time::Duration;

use domain::ids::TimestampIds;
use domain::schema::Row;
use domain::{Clock, IdGenerator, KeyValueStore, SystemClock};

pub mod auth;
pub mod builder;
pub mod realtime;
pub mod store;

pub use auth::{
    AuthError, AuthEvent, AuthResponse, AuthSubscription, Credentials, MockAuth, Session, SessionResponse,
    SessionUser, SignOutResponse, SignUp, SignUpOptions,
};
pub use builder::{CountResponse, QueryBuilder, QueryResponse, SingleResponse};
pub use realtime::{Channel, ChannelHandler, RealtimeSubscription};
pub use store::LocalStore;

/// Simulated latencies and auth event behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Delay before every query terminal.
    pub query_latency: Duration,
    /// Delay before sign-in and sign-up.
    pub auth_latency: Duration,
    /// Delay before `get_session`.
    pub session_latency: Duration,
    /// Delay before a new auth listener receives its initial event.
    pub auth_event_delay: Duration,
    /// Broadcast every sign-in, sign-up and sign-out to registered listeners,
    /// not just the initial event.
    pub live_auth_events: bool,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            query_latency: Duration::from_millis(100),
            auth_latency: Duration::from_millis(200),
            session_latency: Duration::from_millis(50),
            auth_event_delay: Duration::from_millis(100),
            live_auth_events: false,
        }
    }
}

impl BackendOptions {
    /// No simulated latency anywhere.
    pub fn instant() -> Self {
        Self {
            query_latency: Duration::ZERO,
            auth_latency: Duration::ZERO,
            session_latency: Duration::ZERO,
            auth_event_delay: Duration::ZERO,
            live_auth_events: false,
        }
    }

    /// Scale from a single query latency, keeping the default ratios
    /// (auth 2x, session 0.5x, auth events 1x).
    pub fn with_query_latency(latency: Duration) -> Self {
        Self {
            query_latency: latency,
            auth_latency: latency * 2,
            session_latency: latency / 2,
            auth_event_delay: latency,
            live_auth_events: false,
        }
    }
}

pub(crate) struct Shared {
    pub(crate) store: LocalStore,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) options: BackendOptions,
}

/// The local backend client. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LocalBackend {
    shared: Arc<Shared>,
    auth: MockAuth,
}

impl LocalBackend {
    /// Backend over `kv` using the wall clock and time-based ids.
    pub fn new(kv: Arc<dyn KeyValueStore>, options: BackendOptions) -> Self {
        Self::with_parts(kv, options, Arc::new(SystemClock), Arc::new(TimestampIds::new(SystemClock)))
    }

    pub fn with_parts(
        kv: Arc<dyn KeyValueStore>,
        options: BackendOptions,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let store = LocalStore::new(kv, clock.now());
        let auth = MockAuth::new(store.clone(), options);
        Self {
            shared: Arc::new(Shared {
                store,
                ids,
                clock,
                options,
            }),
            auth,
        }
    }

    /// Start a query on a collection.
    pub fn from(&self, collection: &str) -> QueryBuilder {
        QueryBuilder::new(self.shared.clone(), collection.to_string())
    }

    /// Start a query on the collection a typed row belongs to.
    pub fn table<T: Row>(&self) -> QueryBuilder {
        self.from(T::COLLECTION)
    }

    pub fn auth(&self) -> &MockAuth {
        &self.auth
    }

    pub fn channel(&self, name: &str) -> Channel {
        Channel::new(name)
    }

    pub fn options(&self) -> BackendOptions {
        self.shared.options
    }

    pub fn store(&self) -> &LocalStore {
        &self.shared.store
    }
}
