//! Property-based tests for query evaluation and id generation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::filter::FilterOp;
use domain::ids::TimestampIds;
use domain::query::Query;
use domain::{Clock, IdGenerator, Record, Value};
use proptest::prelude::*;
use serde_json::json;

const FIELDS: [&str; 3] = ["n", "s", "b"];

// Small domains so equal values and range boundaries actually occur.
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-3i64..=3).prop_map(Value::from),
        "[a-c]{0,2}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop::collection::vec(prop::option::of(value_strategy()), FIELDS.len()).prop_map(|values| {
        let mut r = Record::new();
        for (field, v) in FIELDS.iter().zip(values) {
            if let Some(v) = v {
                r.insert(field.to_string(), v);
            }
        }
        r
    })
}

fn op_strategy() -> impl Strategy<Value = FilterOp> {
    prop_oneof![
        Just(FilterOp::Eq),
        Just(FilterOp::Neq),
        Just(FilterOp::Gte),
        Just(FilterOp::Lte),
    ]
}

fn clause_strategy() -> impl Strategy<Value = (&'static str, FilterOp, Value)> {
    (prop::sample::select(FIELDS.to_vec()), op_strategy(), value_strategy())
}

fn same_type_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_i64()?.partial_cmp(&y.as_i64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Straightforward restatement of the clause semantics: the last clause per
// (field, op) wins, and a record must satisfy every surviving clause.
fn brute_force(records: &[Record], clauses: &[(&'static str, FilterOp, Value)]) -> Vec<Record> {
    let mut effective: BTreeMap<(&str, FilterOp), &Value> = BTreeMap::new();
    for (field, op, value) in clauses {
        effective.insert((*field, *op), value);
    }
    records
        .iter()
        .filter(|r| {
            effective.iter().all(|((field, op), want)| {
                let got = r.get(*field);
                match op {
                    FilterOp::Eq => got == Some(*want),
                    FilterOp::Neq => got != Some(*want),
                    FilterOp::Gte => got
                        .and_then(|g| same_type_cmp(g, want))
                        .is_some_and(|o| o != Ordering::Less),
                    FilterOp::Lte => got
                        .and_then(|g| same_type_cmp(g, want))
                        .is_some_and(|o| o != Ordering::Greater),
                }
            })
        })
        .cloned()
        .collect()
}

fn build(clauses: &[(&'static str, FilterOp, Value)]) -> Query {
    clauses
        .iter()
        .fold(Query::new(), |q, (field, op, value)| q.filter(*field, *op, value.clone()))
}

proptest! {
    /// Filtering returns exactly the records satisfying every clause, in stored order.
    #[test]
    fn apply_matches_brute_force(
        records in prop::collection::vec(record_strategy(), 0..40),
        clauses in prop::collection::vec(clause_strategy(), 0..6),
    ) {
        let got = build(&clauses).apply(records.clone());
        prop_assert_eq!(got, brute_force(&records, &clauses));
    }

    /// Limit keeps a prefix of the filtered result.
    #[test]
    fn limit_is_prefix_of_filtered(
        records in prop::collection::vec(record_strategy(), 0..40),
        clauses in prop::collection::vec(clause_strategy(), 0..4),
        limit in 1usize..10,
    ) {
        let all = build(&clauses).apply(records.clone());
        let limited = build(&clauses).limit(limit).apply(records);
        prop_assert_eq!(limited.len(), all.len().min(limit));
        prop_assert_eq!(&all[..limited.len()], &limited[..]);
    }

    /// Ordering permutes the filtered result without adding or dropping records.
    #[test]
    fn order_is_a_permutation(
        records in prop::collection::vec(record_strategy(), 0..40),
        field in prop::sample::select(FIELDS.to_vec()),
        ascending in any::<bool>(),
    ) {
        let mut sorted = Query::new().order(field, ascending).apply(records.clone());
        let mut unsorted = records;
        let key = |r: &Record| serde_json::to_string(r).unwrap_or_default();
        sorted.sort_by_key(key);
        unsorted.sort_by_key(key);
        prop_assert_eq!(sorted, unsorted);
    }
}

// Replays a fixed sequence of instants, including repeats and steps backwards.
struct ScriptedClock {
    instants: Vec<u64>,
    next: AtomicUsize,
}

impl Clock for ScriptedClock {
    fn now(&self) -> SystemTime {
        let i = self.next.fetch_add(1, AtomicOrdering::SeqCst);
        let ms = self.instants.get(i % self.instants.len().max(1)).copied().unwrap_or(0);
        UNIX_EPOCH + Duration::from_millis(ms)
    }
}

proptest! {
    /// Ids stay unique and increasing whatever the clock does.
    #[test]
    fn timestamp_ids_are_unique(instants in prop::collection::vec(0u64..50, 1..100)) {
        let n = instants.len();
        let ids = TimestampIds::new(ScriptedClock { instants, next: AtomicUsize::new(0) });
        let issued: Vec<u64> = (0..n).map(|_| ids.next_id().parse().unwrap_or(0)).collect();
        let unique: HashSet<_> = issued.iter().collect();
        prop_assert_eq!(unique.len(), n);
        prop_assert!(issued.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn brute_force_sanity() {
    let r = json!({"n": 1, "s": "a"}).as_object().cloned().unwrap_or_default();
    let clauses = vec![("n", FilterOp::Gte, json!(1)), ("s", FilterOp::Neq, json!("b"))];
    assert_eq!(brute_force(std::slice::from_ref(&r), &clauses).len(), 1);
    assert_eq!(build(&clauses).apply(vec![r]).len(), 1);
}
