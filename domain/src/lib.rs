//! Domain library for the referral tracker.
//!
//! This crate holds the record model, the filter/order/limit query plan and its
//! pure evaluation, the typed per-collection rows, and the ports (traits) the
//! backends implement. Keep async runtimes, timers and IO concerns out of this
//! crate; they belong to the adapters.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub use serde_json::Value;

/// An open-ended record as stored in a collection: field name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Name of the field holding a record's unique identifier.
pub const ID_FIELD: &str = "id";
/// Name of the field holding a record's insertion timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Returns the `id` of a record when it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Format a point in time as an ISO-8601 UTC timestamp with millisecond precision,
/// e.g. `2024-05-01T12:30:00.000Z`.
pub fn iso8601(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Record id generator; every call must return a value not returned before.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Persistent string key-value store backing the local backend.
///
/// Implementations only need last-write-wins semantics per key; no
/// transactions or compare-and-swap are expected.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Error payload carried in the `error` field of a backend response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<CoreError> for ErrorBody {
    fn from(err: CoreError) -> Self {
        Self::new(err.to_string())
    }
}

/// Core domain errors (no external error crates to keep the domain lean).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input rejected at the boundary where a typed record is constructed.
    InvalidInput(String),
    /// A stored record does not match the schema of its collection.
    InvalidRecord(String),
    Store(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            CoreError::InvalidRecord(msg) => write!(f, "invalid record: {}", msg),
            CoreError::Store(msg) => write!(f, "store error: {}", msg),
        }
    }
}

impl Error for CoreError {}

pub mod adapters;
pub mod assign;
pub mod filter;
pub mod ids;
pub mod query;
pub mod schema;
pub mod seed;
pub mod stats;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn iso8601_formats_utc_with_millis() {
        let t = SystemTime::UNIX_EPOCH + Duration::from_millis(1_714_566_600_123);
        assert_eq!(iso8601(t), "2024-05-01T12:30:00.123Z");
    }

    #[test]
    fn record_id_requires_string() {
        let mut r = Record::new();
        assert_eq!(record_id(&r), None);
        r.insert("id".into(), Value::from(7));
        assert_eq!(record_id(&r), None);
        r.insert("id".into(), Value::from("7"));
        assert_eq!(record_id(&r), Some("7"));
    }

    #[test]
    fn core_error_into_error_body() {
        let body: ErrorBody = CoreError::Store("disk full".into()).into();
        assert_eq!(body.message, "store error: disk full");
    }
}
