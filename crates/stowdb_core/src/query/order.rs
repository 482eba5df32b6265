//! Result ordering.

use std::cmp::Ordering;
use stowdb_codec::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first; null and missing values lead.
    #[default]
    Asc,
    /// Largest first; null and missing values trail.
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    /// Field to sort by.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

impl OrderKey {
    /// Creates a sort key.
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Compares two records on this key.
    ///
    /// Null sorts before non-null ascending; descending reverses the whole
    /// comparison, null placement included.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let ordering = compare_fields(a.get(&self.field), b.get(&self.field));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.sort_cmp(b),
    }
}

/// Compares two records on successive keys; later keys break ties.
pub fn compare_records(keys: &[OrderKey], a: &Value, b: &Value) -> Ordering {
    keys.iter()
        .map(|key| key.compare(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
