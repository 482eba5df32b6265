//! Per-field conditions and the predicates built from them.

use std::cmp::Ordering;
use stowdb_codec::{Map, Value};

/// Operator form of a field condition.
///
/// When several operators are set, only the first in this order is
/// evaluated: `equals`, `not_equals`, `greater_than`,
/// `greater_than_or_equal`, `less_than`, `less_than_or_equal`, `in_array`,
/// `is_between`, `contains`, `loose_contains`. With none set, the condition
/// matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operators {
    /// Field equals the operand.
    pub equals: Option<Value>,
    /// Field differs from the operand.
    pub not_equals: Option<Value>,
    /// Field is greater than the operand.
    pub greater_than: Option<Value>,
    /// Field is greater than or equal to the operand.
    pub greater_than_or_equal: Option<Value>,
    /// Field is less than the operand.
    pub less_than: Option<Value>,
    /// Field is less than or equal to the operand.
    pub less_than_or_equal: Option<Value>,
    /// Field equals one of the operands.
    pub in_array: Option<Vec<Value>>,
    /// Field lies within `[low, high]`, inclusive.
    pub is_between: Option<(Value, Value)>,
    /// Text field contains the operand.
    pub contains: Option<String>,
    /// Text field contains the operand, ignoring case.
    pub loose_contains: Option<String>,
}

impl Operators {
    /// Creates an operator set with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `equals`.
    #[must_use]
    pub fn equals(mut self, value: impl Into<Value>) -> Self {
        self.equals = Some(value.into());
        self
    }

    /// Sets `not_equals`.
    #[must_use]
    pub fn not_equals(mut self, value: impl Into<Value>) -> Self {
        self.not_equals = Some(value.into());
        self
    }

    /// Sets `greater_than`.
    #[must_use]
    pub fn greater_than(mut self, value: impl Into<Value>) -> Self {
        self.greater_than = Some(value.into());
        self
    }

    /// Sets `greater_than_or_equal`.
    #[must_use]
    pub fn greater_than_or_equal(mut self, value: impl Into<Value>) -> Self {
        self.greater_than_or_equal = Some(value.into());
        self
    }

    /// Sets `less_than`.
    #[must_use]
    pub fn less_than(mut self, value: impl Into<Value>) -> Self {
        self.less_than = Some(value.into());
        self
    }

    /// Sets `less_than_or_equal`.
    #[must_use]
    pub fn less_than_or_equal(mut self, value: impl Into<Value>) -> Self {
        self.less_than_or_equal = Some(value.into());
        self
    }

    /// Sets `in_array`.
    #[must_use]
    pub fn in_array<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.in_array = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets `is_between`.
    #[must_use]
    pub fn is_between(mut self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.is_between = Some((low.into(), high.into()));
        self
    }

    /// Sets `contains`.
    #[must_use]
    pub fn contains(mut self, needle: impl Into<String>) -> Self {
        self.contains = Some(needle.into());
        self
    }

    /// Sets `loose_contains`.
    #[must_use]
    pub fn loose_contains(mut self, needle: impl Into<String>) -> Self {
        self.loose_contains = Some(needle.into());
        self
    }

    fn matches(&self, field: &Value) -> bool {
        if let Some(operand) = &self.equals {
            return field == operand;
        }
        if let Some(operand) = &self.not_equals {
            return field != operand;
        }
        if let Some(operand) = &self.greater_than {
            return relation(field, operand, |o| o == Ordering::Greater);
        }
        if let Some(operand) = &self.greater_than_or_equal {
            return relation(field, operand, |o| o != Ordering::Less);
        }
        if let Some(operand) = &self.less_than {
            return relation(field, operand, |o| o == Ordering::Less);
        }
        if let Some(operand) = &self.less_than_or_equal {
            return relation(field, operand, |o| o != Ordering::Greater);
        }
        if let Some(operands) = &self.in_array {
            return operands.contains(field);
        }
        if let Some((low, high)) = &self.is_between {
            return relation(field, low, |o| o != Ordering::Less)
                && relation(field, high, |o| o != Ordering::Greater);
        }
        if let Some(needle) = &self.contains {
            return field.as_text().is_some_and(|text| text.contains(needle.as_str()));
        }
        if let Some(needle) = &self.loose_contains {
            return field
                .as_text()
                .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()));
        }
        false
    }
}

/// Null, missing and incomparable operands never match.
fn relation(field: &Value, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    field.compare(operand).is_some_and(accept)
}

/// A condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Bare value: the field must equal it.
    Value(Value),
    /// Operator form.
    Operators(Operators),
}

impl Condition {
    /// Whether `field` (null when missing) satisfies the condition.
    pub fn matches(&self, field: &Value) -> bool {
        match self {
            Condition::Value(expected) => field == expected,
            Condition::Operators(operators) => operators.matches(field),
        }
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        Condition::Value(value)
    }
}

impl From<Operators> for Condition {
    fn from(operators: Operators) -> Self {
        Condition::Operators(operators)
    }
}

/// AND-combined field conditions.
///
/// An empty predicate matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<(String, Condition)>,
}

impl Predicate {
    /// Creates a predicate that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on every field of a record-shaped map.
    #[must_use]
    pub fn from_record(fields: Map) -> Self {
        Self {
            conditions: fields
                .into_iter()
                .map(|(field, value)| (field, Condition::Value(value)))
                .collect(),
        }
    }

    /// Adds a condition on `field`.
    #[must_use]
    pub fn when(mut self, field: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.conditions.push((field.into(), condition.into()));
        self
    }

    /// Adds an equality condition on `field`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.when(field, Condition::Value(value.into()))
    }

    /// Adds every condition of `other`.
    #[must_use]
    pub fn and(mut self, other: Predicate) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    /// The conditions in registration order.
    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    /// Whether there are no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `record` satisfies every condition.
    pub fn matches(&self, record: &Value) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            condition.matches(record.get(field).unwrap_or(&Value::Null))
        })
    }
}
