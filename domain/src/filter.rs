//! Predicate evaluation and value ordering for collection queries.
//!
//! Values compare by their natural ordering only: numbers numerically, strings
//! lexicographically, booleans `false < true`. There is no type coercion.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{Record, Value};

/// Comparison operator of a filter clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
    Lte,
}

/// A single `(field, operator, value)` clause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Checks whether a record satisfies this clause.
    ///
    /// A missing field behaves like `null`: it never equals a value and never
    /// falls inside a range, so it only matches `neq` against a non-null value.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Neq => !values_equal(actual, &self.value),
            FilterOp::Gte => {
                matches!(partial_compare(actual, &self.value), Some(Ordering::Greater | Ordering::Equal))
            }
            FilterOp::Lte => {
                matches!(partial_compare(actual, &self.value), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

/// Checks if a record matches all clauses (AND semantics).
pub fn matches_all<'a, I>(record: &Record, filters: I) -> bool
where
    I: IntoIterator<Item = &'a Filter>,
{
    filters.into_iter().all(|f| f.matches(record))
}

/// Numbers compare by value, so `1` equals `1.0`; everything else structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => partial_compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two values of the same scalar type, `None` otherwise.
fn partial_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(xi), Some(yi)) = (x.as_i64(), y.as_i64()) {
                return Some(xi.cmp(&yi));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total ordering used for sorting.
///
/// Ordering rules:
/// - null (or missing) < bool < number < string < array < object
/// - same types use their natural ordering; arrays and objects compare equal
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);

    let rank = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => partial_compare(a, b).unwrap_or(Ordering::Equal),
        other => other,
    }
}
