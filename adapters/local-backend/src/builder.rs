//! Chainable, lazily evaluated collection queries.
//!
//! Chained calls only grow the `Query` plan. Nothing touches the store until a
//! terminal operation runs (`execute`, `single`, `head`, `insert`, `update`,
//! `delete`); every terminal consumes the builder, waits the configured
//! latency, then re-reads the collection so it sees the last written state.
//!
//! Terminals never fail outright: store problems come back in the `error`
//! field and an empty match is an empty `data`, not an error.
//!
//! Writes are read-modify-write with no locking. Two writers racing on one
//! collection resolve as last write wins.

use std::sync::Arc;

use domain::query::Query;
use domain::schema::{decode_rows, Row};
use domain::{iso8601, record_id, CoreError, ErrorBody, Record, Value, CREATED_AT_FIELD, ID_FIELD};
use serde::Serialize;
use tracing::debug;

use crate::Shared;

/// Response of `execute`, `insert`, `update` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub data: Vec<Record>,
    pub error: Option<ErrorBody>,
    /// Number of records in `data`; absent on write responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl QueryResponse {
    fn ok(data: Vec<Record>, count: Option<usize>) -> Self {
        Self {
            data,
            error: None,
            count,
        }
    }

    fn failed(err: CoreError) -> Self {
        Self {
            data: Vec::new(),
            error: Some(err.into()),
            count: None,
        }
    }

    /// Decode `data` into typed rows of `T`'s collection.
    pub fn rows<T: Row>(self) -> Result<Vec<T>, CoreError> {
        if let Some(err) = self.error {
            return Err(CoreError::Store(err.message));
        }
        decode_rows(self.data)
    }
}

/// Response of `single`: the first matching record or `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleResponse {
    pub data: Option<Record>,
    pub error: Option<ErrorBody>,
}

impl SingleResponse {
    pub fn row<T: Row>(self) -> Result<Option<T>, CoreError> {
        if let Some(err) = self.error {
            return Err(CoreError::Store(err.message));
        }
        self.data.map(T::from_record).transpose()
    }
}

/// Response of `head`: a count and no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountResponse {
    pub count: Option<usize>,
    pub error: Option<ErrorBody>,
}

/// Single-use query over one collection.
pub struct QueryBuilder {
    shared: Arc<Shared>,
    collection: String,
    query: Query,
}

impl QueryBuilder {
    pub(crate) fn new(shared: Arc<Shared>, collection: String) -> Self {
        Self {
            shared,
            collection,
            query: Query::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The plan accumulated so far.
    pub fn plan(&self) -> &Query {
        &self.query
    }

    pub fn select(self, columns: &str) -> Self {
        self.map(|q| q.select(columns))
    }

    pub fn eq<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.map(|q| q.eq(field, value))
    }

    pub fn neq<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.map(|q| q.neq(field, value))
    }

    pub fn gte<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.map(|q| q.gte(field, value))
    }

    pub fn lte<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.map(|q| q.lte(field, value))
    }

    pub fn order<F: Into<String>>(self, field: F, ascending: bool) -> Self {
        self.map(|q| q.order(field, ascending))
    }

    pub fn limit(self, n: usize) -> Self {
        self.map(|q| q.limit(n))
    }

    fn map(mut self, f: impl FnOnce(Query) -> Query) -> Self {
        self.query = f(self.query);
        self
    }

    async fn latency(&self) {
        let d = self.shared.options.query_latency;
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }

    fn load(&self) -> Result<Vec<Record>, CoreError> {
        self.shared.store.load_collection(&self.collection)
    }

    fn save(&self, records: &[Record]) -> Result<(), CoreError> {
        self.shared.store.save_collection(&self.collection, records)
    }

    /// Filter, order, limit, project.
    pub async fn execute(self) -> QueryResponse {
        self.latency().await;
        match self.load() {
            Ok(records) => {
                let data = self.query.apply(records);
                debug!(collection = %self.collection, rows = data.len(), "execute");
                let count = data.len();
                QueryResponse::ok(data, Some(count))
            }
            Err(e) => QueryResponse::failed(e),
        }
    }

    /// First record `execute` would return.
    pub async fn single(self) -> SingleResponse {
        let resp = self.execute().await;
        SingleResponse {
            data: resp.data.into_iter().next(),
            error: resp.error,
        }
    }

    /// Count of the whole stored collection. Filters, ordering and limit are
    /// deliberately ignored; use `execute` and the returned `count` for a
    /// filtered count.
    pub async fn head(self) -> CountResponse {
        self.latency().await;
        match self.load() {
            Ok(records) => CountResponse {
                count: Some(records.len()),
                error: None,
            },
            Err(e) => CountResponse {
                count: None,
                error: Some(e.into()),
            },
        }
    }

    /// Append one record, assigning `id` and `created_at` when missing. A
    /// caller-supplied id that already exists is replaced with a fresh one.
    pub async fn insert(self, mut record: Record) -> QueryResponse {
        self.latency().await;
        let mut records = match self.load() {
            Ok(r) => r,
            Err(e) => return QueryResponse::failed(e),
        };

        let taken = |id: &str| records.iter().any(|r| record_id(r) == Some(id));
        let supplied = record_id(&record).map(str::to_owned);
        if supplied.as_deref().map_or(true, |id| id.is_empty() || taken(id)) {
            let mut id = self.shared.ids.next_id();
            while taken(&id) {
                id = self.shared.ids.next_id();
            }
            if supplied.is_some() {
                debug!(collection = %self.collection, "insert: supplied id already used, reassigned");
            }
            record.insert(ID_FIELD.into(), Value::from(id));
        }
        if !record.contains_key(CREATED_AT_FIELD) {
            let now = iso8601(self.shared.clock.now());
            record.insert(CREATED_AT_FIELD.into(), Value::from(now));
        }

        records.push(record.clone());
        if let Err(e) = self.save(&records) {
            return QueryResponse::failed(e);
        }
        debug!(collection = %self.collection, "insert");
        QueryResponse::ok(vec![record], None)
    }

    /// Merge `patch` into every record matching the filters. `id` is never
    /// overwritten. Returns the updated records.
    pub async fn update(self, mut patch: Record) -> QueryResponse {
        self.latency().await;
        let mut records = match self.load() {
            Ok(r) => r,
            Err(e) => return QueryResponse::failed(e),
        };
        patch.remove(ID_FIELD);

        let mut updated = Vec::new();
        for record in records.iter_mut().filter(|r| self.query.matches(r)) {
            for (k, v) in &patch {
                record.insert(k.clone(), v.clone());
            }
            updated.push(record.clone());
        }

        if !updated.is_empty() {
            if let Err(e) = self.save(&records) {
                return QueryResponse::failed(e);
            }
        }
        debug!(collection = %self.collection, rows = updated.len(), "update");
        QueryResponse::ok(updated, None)
    }

    /// Remove every record matching the filters.
    pub async fn delete(self) -> QueryResponse {
        self.latency().await;
        let mut records = match self.load() {
            Ok(r) => r,
            Err(e) => return QueryResponse::failed(e),
        };
        let before = records.len();
        records.retain(|r| !self.query.matches(r));
        if records.len() != before {
            if let Err(e) = self.save(&records) {
                return QueryResponse::failed(e);
            }
        }
        debug!(collection = %self.collection, rows = before - records.len(), "delete");
        QueryResponse::ok(Vec::new(), None)
    }
}
