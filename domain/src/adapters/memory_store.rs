use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{CoreError, KeyValueStore};

/// Simple in-memory key-value store. Data lives as long as the value does.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Keys currently held, in sorted order.
    pub fn keys(&self) -> Result<Vec<String>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(map.keys().cloned().collect())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))?;
        map.remove(key);
        Ok(())
    }
}
