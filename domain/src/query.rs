//! The filter/order/limit plan of a collection query.
//!
//! `Query` is a plain value: every chained call consumes it and returns the
//! extended plan, so two chains never share mutable state. Evaluation is pure;
//! loading and persisting records is the backend's job.
//!
//! Evaluation order is fixed: filters (AND), then ordering, then limit, then
//! field projection.

use serde::{Deserialize, Serialize};

use crate::filter::{compare_values, matches_all, Filter, FilterOp};
use crate::{Record, Value};

/// Single ordering clause.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

/// Accumulated query plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    columns: Option<Vec<String>>,
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned records to a comma-separated column list. `*` or an
    /// empty list selects every field.
    pub fn select(mut self, columns: &str) -> Self {
        let cols: Vec<String> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();
        self.columns = if cols.is_empty() || cols.iter().any(|c| c == "*") {
            None
        } else {
            Some(cols)
        };
        self
    }

    pub fn eq<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn neq<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.filter(field, FilterOp::Neq, value)
    }

    pub fn gte<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.filter(field, FilterOp::Gte, value)
    }

    pub fn lte<F: Into<String>, V: Into<Value>>(self, field: F, value: V) -> Self {
        self.filter(field, FilterOp::Lte, value)
    }

    /// Add a clause. A clause with the same field and operator replaces the
    /// earlier one in place.
    pub fn filter<F: Into<String>, V: Into<Value>>(mut self, field: F, op: FilterOp, value: V) -> Self {
        let clause = Filter {
            field: field.into(),
            op,
            value: value.into(),
        };
        match self
            .filters
            .iter_mut()
            .find(|f| f.field == clause.field && f.op == clause.op)
        {
            Some(existing) => *existing = clause,
            None => self.filters.push(clause),
        }
        self
    }

    /// Set the ordering; a later call replaces the earlier one.
    pub fn order<F: Into<String>>(mut self, field: F, ascending: bool) -> Self {
        self.order = Some(Order {
            field: field.into(),
            ascending,
        });
        self
    }

    /// Cap the number of returned records. Zero removes the cap.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = (n > 0).then_some(n);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.limit
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Checks a record against every filter clause.
    pub fn matches(&self, record: &Record) -> bool {
        matches_all(record, &self.filters)
    }

    /// Run the plan over a materialized collection.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut out: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = &self.order {
            // sort_by is stable: equal keys keep their stored order
            out.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.field), b.get(&order.field));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }

        match &self.columns {
            Some(cols) => out.into_iter().map(|r| project(r, cols)).collect(),
            None => out,
        }
    }
}

fn project(mut record: Record, columns: &[String]) -> Record {
    record.retain(|k, _| columns.iter().any(|c| c == k));
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Record> {
        [
            json!({"id": "1", "status": "em_contato", "user_id": "u1", "score": 3}),
            json!({"id": "2", "status": "fechados", "user_id": "u1", "score": 9}),
            json!({"id": "3", "status": "nao_interessado", "user_id": "u2", "score": 3}),
            json!({"id": "4", "status": "negociacao", "user_id": "u1", "score": 5}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn empty_plan_returns_everything_in_order() {
        let out = Query::new().apply(rows());
        assert_eq!(ids(&out), ["1", "2", "3", "4"]);
    }

    #[test]
    fn clauses_on_different_fields_combine_with_and() {
        let q = Query::new().eq("user_id", "u1").gte("score", 4).lte("score", 9).neq("status", "fechados");
        assert_eq!(ids(&q.apply(rows())), ["4"]);
    }

    #[test]
    fn same_field_same_operator_overwrites() {
        let q = Query::new().neq("status", "fechados").neq("status", "nao_interessado");
        assert_eq!(q.filters().len(), 1);
        assert_eq!(ids(&q.apply(rows())), ["1", "2", "4"]);
    }

    #[test]
    fn same_field_different_operators_accumulate() {
        let q = Query::new().gte("score", 4).lte("score", 5);
        assert_eq!(q.filters().len(), 2);
        assert_eq!(ids(&q.apply(rows())), ["4"]);
    }

    #[test]
    fn order_is_stable_for_equal_keys() {
        let asc = Query::new().order("score", true).apply(rows());
        assert_eq!(ids(&asc), ["1", "3", "4", "2"]);
        let desc = Query::new().order("score", false).apply(rows());
        assert_eq!(ids(&desc), ["2", "4", "1", "3"]);
    }

    #[test]
    fn limit_applies_after_ordering() {
        let q = Query::new().order("score", false).limit(2);
        assert_eq!(ids(&q.apply(rows())), ["2", "4"]);
        let unlimited = Query::new().limit(0);
        assert_eq!(unlimited.max_rows(), None);
    }

    #[test]
    fn select_projects_columns() {
        let out = Query::new().select("id, user_id").eq("status", "fechados").apply(rows());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[0]["user_id"], json!("u1"));

        assert_eq!(Query::new().select("*").columns(), None);
    }

    #[test]
    fn apply_is_repeatable() {
        let q = Query::new().eq("user_id", "u1").order("score", true);
        assert_eq!(q.apply(rows()), q.apply(rows()));
    }
}
