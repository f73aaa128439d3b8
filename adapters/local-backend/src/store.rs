//! Collection and session persistence over a `KeyValueStore`.
//!
//! Each collection is one entry holding its full record array as JSON text,
//! under `mock_<collection>`. The active session is one entry under
//! `mock_user`; absence means signed out. A collection literally named `user`
//! would share the session key, so don't create one.

use std::sync::Arc;
use std::time::SystemTime;

use domain::seed::seed_records;
use domain::{CoreError, KeyValueStore, Record};
use serde::{Deserialize, Serialize};

use crate::auth::SessionUser;

/// Reserved key of the persisted session.
pub const SESSION_KEY: &str = "mock_user";

/// Store key of a collection.
pub fn collection_key(collection: &str) -> String {
    format!("mock_{collection}")
}

/// Namespaced view over the raw key-value store.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    seeded_at: SystemTime,
}

impl LocalStore {
    /// `seeded_at` stamps the seed records of collections that have never been
    /// written, so repeated reads of an untouched collection agree.
    pub fn new(kv: Arc<dyn KeyValueStore>, seeded_at: SystemTime) -> Self {
        Self { kv, seeded_at }
    }

    /// Materialize a collection, falling back to its seed records when the
    /// store has no entry for it yet.
    pub fn load_collection(&self, collection: &str) -> Result<Vec<Record>, CoreError> {
        match self.kv.get(&collection_key(collection))? {
            Some(text) => serde_json::from_str(&text)
                .map_err(|e| CoreError::Store(format!("corrupt collection {collection}: {e}"))),
            None => Ok(seed_records(collection, self.seeded_at)),
        }
    }

    /// Replace the stored array of a collection.
    pub fn save_collection(&self, collection: &str, records: &[Record]) -> Result<(), CoreError> {
        let text = serde_json::to_string(records).map_err(|e| CoreError::Store(e.to_string()))?;
        self.kv.set(&collection_key(collection), &text)
    }

    pub fn load_session(&self) -> Result<Option<SessionUser>, CoreError> {
        match self.kv.get(SESSION_KEY)? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| CoreError::Store(format!("corrupt session: {e}"))),
            None => Ok(None),
        }
    }

    pub fn save_session(&self, user: &SessionUser) -> Result<(), CoreError> {
        let text = serde_json::to_string(user).map_err(|e| CoreError::Store(e.to_string()))?;
        self.kv.set(SESSION_KEY, &text)
    }

    pub fn clear_session(&self) -> Result<(), CoreError> {
        self.kv.remove(SESSION_KEY)
    }
}

/// Snapshot of what a store holds, for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub collections: Vec<(String, usize)>,
    pub signed_in: bool,
}

impl LocalStore {
    pub fn summary(&self, collections: &[&str]) -> Result<StoreSummary, CoreError> {
        let mut out = StoreSummary::default();
        for name in collections {
            out.collections.push((name.to_string(), self.load_collection(name)?.len()));
        }
        out.signed_in = self.load_session()?.is_some();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::adapters::memory_store::InMemoryStore;
    use domain::schema::Role;
    use serde_json::json;

    fn store() -> (LocalStore, Arc<InMemoryStore>) {
        let kv = Arc::new(InMemoryStore::new());
        (LocalStore::new(kv.clone(), SystemTime::UNIX_EPOCH), kv)
    }

    #[test]
    fn unwritten_collection_reads_seeds_without_persisting() {
        let (store, kv) = store();
        assert_eq!(store.load_collection("sellers").unwrap().len(), 2);
        assert_eq!(store.load_collection("nothing").unwrap().len(), 0);
        assert!(kv.keys().unwrap().is_empty());
    }

    #[test]
    fn saved_collection_replaces_seeds() {
        let (store, kv) = store();
        let rec = json!({"id": "x"}).as_object().cloned().unwrap();
        store.save_collection("sellers", &[rec]).unwrap();
        assert_eq!(kv.get("mock_sellers").unwrap().as_deref(), Some(r#"[{"id":"x"}]"#));
        assert_eq!(store.load_collection("sellers").unwrap().len(), 1);
    }

    #[test]
    fn corrupt_collection_is_an_error() {
        let (store, kv) = store();
        kv.set("mock_users", "{not json").unwrap();
        assert!(matches!(store.load_collection("users"), Err(CoreError::Store(_))));
    }

    #[test]
    fn session_roundtrip_and_clear() {
        let (store, _kv) = store();
        assert_eq!(store.load_session().unwrap(), None);
        let user = SessionUser {
            id: "mock-admin-id".into(),
            email: "admin@sistema.com".into(),
            name: "Admin Sistema".into(),
            role: Role::Admin,
        };
        store.save_session(&user).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(user));
        store.clear_session().unwrap();
        assert_eq!(store.load_session().unwrap(), None);
    }

    #[test]
    fn summary_counts_collections() {
        let (store, _kv) = store();
        let summary = store.summary(&["users", "indications"]).unwrap();
        assert_eq!(summary.collections, vec![("users".to_string(), 2), ("indications".to_string(), 4)]);
        assert!(!summary.signed_in);
    }
}
