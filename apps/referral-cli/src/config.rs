//! Centralized configuration for the referral CLI.
//!
//! Environment variables are loaded and validated once at startup so that a
//! bad value fails the process before any command runs.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use local_backend::BackendOptions;

/// Placeholder values shipped in example environment files. Either input equal
/// to one of these means the hosted backend was never configured.
pub const PLACEHOLDERS: [&str; 4] = [
    "your_supabase_url",
    "your-supabase-url",
    "your_supabase_anon_key",
    "your-supabase-anon-key",
];

/// Keys this short are never real anon keys.
pub const MIN_KEY_LEN: usize = 50;

/// Which backend implementation the process talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelection {
    /// A real hosted backend at `url`, authenticated with `key`.
    Hosted { url: String, key: String },
    /// The local backend over the configured store.
    Mock,
}

impl BackendSelection {
    pub fn is_mock(&self) -> bool {
        matches!(self, BackendSelection::Mock)
    }
}

/// Pick hosted only when both inputs are present, the URL is https, the key is
/// long enough and neither input is a placeholder.
pub fn select_backend(url: Option<&str>, key: Option<&str>) -> BackendSelection {
    let (Some(url), Some(key)) = (url, key) else {
        return BackendSelection::Mock;
    };
    if PLACEHOLDERS.contains(&url) || PLACEHOLDERS.contains(&key) {
        return BackendSelection::Mock;
    }
    if url.starts_with("https://") && key.len() > MIN_KEY_LEN {
        BackendSelection::Hosted {
            url: url.to_string(),
            key: key.to_string(),
        }
    } else {
        BackendSelection::Mock
    }
}

static SELECTION: OnceLock<BackendSelection> = OnceLock::new();

/// Process-wide selection, computed from the environment on first call and
/// never re-evaluated.
pub fn backend_selection() -> &'static BackendSelection {
    SELECTION.get_or_init(|| {
        let url = env::var("BACKEND_URL").ok();
        let key = env::var("BACKEND_ANON_KEY").ok();
        let selection = select_backend(url.as_deref(), key.as_deref());
        if selection.is_mock() {
            tracing::warn!(
                "BACKEND_URL/BACKEND_ANON_KEY missing or placeholders: using the local mock backend. \
                 Data stays on this machine and credentials are fixed test accounts."
            );
        } else {
            tracing::info!("using hosted backend");
        }
        selection
    })
}

/// Where the local backend keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreProvider {
    /// In-memory store (data lost on exit)
    Memory,
    /// SQLite file-based store
    Sqlite,
}

impl StoreProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::Sqlite
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store provider (default: sqlite)
    pub store_provider: StoreProvider,
    /// SQLite file (default: ./data/referrals.db)
    pub store_path: PathBuf,
    /// Simulated query latency; auth and session latencies scale from it
    pub latency: Duration,
    /// Broadcast every auth transition to listeners
    pub live_auth_events: bool,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_provider =
            StoreProvider::from_str(&env::var("STORE_PROVIDER").unwrap_or_else(|_| "sqlite".into()));

        let store_path = env::var("STORE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(sqlite_store::DEFAULT_PATH));

        let latency = match env::var("MOCK_LATENCY_MS") {
            Ok(raw) => raw.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| ConfigError {
                field: "MOCK_LATENCY_MS",
                message: format!("Invalid millisecond count '{}': {}", raw, e),
            })?,
            Err(_) => Duration::from_millis(100),
        };

        let live_auth_events = is_truthy(&env::var("LIVE_AUTH_EVENTS").unwrap_or_default());

        let log_format = LogFormat::from_str(&env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()));

        Ok(Self {
            store_provider,
            store_path,
            latency,
            live_auth_events,
            log_format,
        })
    }

    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            live_auth_events: self.live_auth_events,
            ..BackendOptions::with_query_latency(self.latency)
        }
    }

    /// Log warnings about surprising configuration.
    pub fn warn_if_ephemeral(&self) {
        if self.store_provider == StoreProvider::Memory {
            tracing::warn!("STORE_PROVIDER=memory: nothing is persisted once this command exits.");
        }
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
