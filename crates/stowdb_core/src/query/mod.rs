//! In-memory query engine.
//!
//! Queries are plain values: build one with the chainable methods, then
//! run it with [`execute`] (or [`crate::Table::select`], which fetches the
//! store first). Execution is filter, then sort, then limit, over the full
//! record set.
//!
//! ```rust
//! use stowdb_codec::{record, Value};
//! use stowdb_core::query::{execute, Direction, Operators, Query};
//!
//! let rows = vec![
//!     Value::Map(record! { "n" => 1, "done" => true }),
//!     Value::Map(record! { "n" => 2, "done" => false }),
//!     Value::Map(record! { "n" => 3, "done" => true }),
//! ];
//!
//! let query = Query::new()
//!     .eq("done", true)
//!     .when("n", Operators::new().greater_than(0))
//!     .order_by("n", Direction::Desc)
//!     .limit(1);
//!
//! assert_eq!(execute(&query, rows), vec![Value::Map(record! { "n" => 3, "done" => true })]);
//! ```

mod filter;
mod order;

pub use filter::{Condition, Operators, Predicate};
pub use order::{compare_records, Direction, OrderKey};

use stowdb_codec::Value;

/// Filter, ordering and limit for one read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Conditions every returned record satisfies.
    pub predicate: Predicate,
    /// Sort keys, highest priority first.
    pub order_by: Vec<OrderKey>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl Query {
    /// A query returning everything in natural order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every condition of `predicate`.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = self.predicate.and(predicate);
        self
    }

    /// Adds a condition on `field`.
    #[must_use]
    pub fn when(mut self, field: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.predicate = self.predicate.when(field, condition);
        self
    }

    /// Adds an equality condition on `field`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate = self.predicate.eq(field, value);
        self
    }

    /// Adds a sort key after the existing ones.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderKey::new(field, direction));
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Runs the query over `records`.
    pub fn execute(&self, records: Vec<Value>) -> Vec<Value> {
        execute(self, records)
    }
}

/// Applies `query` to `records`: filter, then a stable sort, then limit.
///
/// Without sort keys the input order is kept.
pub fn execute(query: &Query, records: Vec<Value>) -> Vec<Value> {
    let mut matched: Vec<Value> = records
        .into_iter()
        .filter(|record| query.predicate.matches(record))
        .collect();

    if !query.order_by.is_empty() {
        matched.sort_by(|a, b| compare_records(&query.order_by, a, b));
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowdb_codec::record;

    fn todos() -> Vec<Value> {
        vec![
            Value::Map(record! { "id" => 1, "completed" => true, "createdAt" => Value::Date(30) }),
            Value::Map(record! { "id" => 2, "completed" => false, "createdAt" => Value::Date(10) }),
            Value::Map(record! { "id" => 3, "completed" => true, "createdAt" => Value::Date(20) }),
            Value::Map(record! { "id" => 4, "completed" => false, "createdAt" => Value::Null }),
            Value::Map(record! { "id" => 5, "completed" => true, "createdAt" => Value::Date(20) }),
        ]
    }

    fn ids(records: &[Value]) -> Vec<i64> {
        records
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_integer))
            .collect()
    }

    #[test]
    fn filter_keeps_natural_order() {
        let result = Query::new().eq("completed", true).execute(todos());
        assert_eq!(ids(&result), vec![1, 3, 5]);
    }

    #[test]
    fn order_desc_puts_nulls_last() {
        let result = Query::new()
            .order_by("createdAt", Direction::Desc)
            .execute(todos());
        assert_eq!(ids(&result), vec![1, 3, 5, 2, 4]);
    }

    #[test]
    fn order_asc_puts_nulls_first_and_is_stable() {
        let result = Query::new()
            .order_by("createdAt", Direction::Asc)
            .execute(todos());
        assert_eq!(ids(&result), vec![4, 2, 3, 5, 1]);
    }

    #[test]
    fn secondary_key_breaks_ties() {
        let result = Query::new()
            .order_by("createdAt", Direction::Asc)
            .order_by("id", Direction::Desc)
            .execute(todos());
        assert_eq!(ids(&result), vec![4, 2, 5, 3, 1]);
    }

    #[test]
    fn limit_applies_after_filter_and_sort() {
        let result = Query::new()
            .eq("completed", true)
            .order_by("id", Direction::Desc)
            .limit(2)
            .execute(todos());
        assert_eq!(ids(&result), vec![5, 3]);

        assert!(Query::new().limit(0).execute(todos()).is_empty());
        assert_eq!(Query::new().limit(50).execute(todos()).len(), 5);
    }

    #[test]
    fn filter_merges_predicates() {
        let query = Query::new()
            .eq("completed", true)
            .filter(Predicate::new().when("id", Operators::new().greater_than(1)));
        assert_eq!(ids(&query.execute(todos())), vec![3, 5]);
    }
}
