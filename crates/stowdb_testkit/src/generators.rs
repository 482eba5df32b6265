//! Property-based test generators using proptest.
//!
//! Provides strategies for records, field values and query conditions
//! shaped like the todo schema.

use crate::fixtures::todo;
use proptest::prelude::*;
use stowdb_codec::{Map, Value};
use stowdb_core::query::{Direction, Operators};

/// Strategy for generating valid store names.
pub fn store_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating scalar values, null included.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z ]{0,12}".prop_map(Value::Text),
        (0..4_000_000_000_000i64).prop_map(Value::Date),
    ]
}

/// Strategy for generating values up to two levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating todo rows without a key.
pub fn todo_strategy() -> impl Strategy<Value = Map> {
    ("[a-z]{1,10}", any::<bool>(), 0..1_000_000i64)
        .prop_map(|(title, completed, created_at)| todo(&title, completed, created_at))
}

/// Strategy for generating a batch of todo rows.
pub fn todo_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Map>> {
    prop::collection::vec(todo_strategy(), 0..max)
}

/// Strategy for generating a single relational operator against `operand`
/// values drawn from [`scalar_value_strategy`].
pub fn relational_operator_strategy() -> impl Strategy<Value = Operators> {
    (0..4u8, scalar_value_strategy()).prop_map(|(which, operand)| match which {
        0 => Operators::new().greater_than(operand),
        1 => Operators::new().greater_than_or_equal(operand),
        2 => Operators::new().less_than(operand),
        _ => Operators::new().less_than_or_equal(operand),
    })
}

/// Strategy for generating a sort direction.
pub fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Asc), Just(Direction::Desc)]
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
