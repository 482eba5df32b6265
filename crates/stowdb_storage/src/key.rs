//! Record keys.

use crate::error::{StorageError, StorageResult};
use std::cmp::Ordering;
use stowdb_codec::Value;

/// A valid record key.
///
/// Keys order the way IndexedDB orders them: numbers, then dates, then
/// text, then arrays. This is the "natural order" of a store.
#[derive(Debug, Clone)]
pub enum Key {
    /// A finite number. `-0.0` is normalised to `0.0`.
    Number(f64),
    /// Epoch milliseconds.
    Date(i64),
    /// Text, ordered by code units.
    Text(String),
    /// Array of keys, ordered element-wise.
    Array(Vec<Key>),
}

impl Key {
    /// Converts a record value into a key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for null, booleans, maps, NaN and
    /// arrays containing any of those.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_value(value: &Value) -> StorageResult<Self> {
        match value {
            Value::Integer(n) => Ok(Key::Number(*n as f64)),
            Value::Float(f) if f.is_nan() => Err(StorageError::InvalidKey("NaN".to_string())),
            Value::Float(f) => Ok(Key::Number(if *f == 0.0 { 0.0 } else { *f })),
            Value::Date(ms) => Ok(Key::Date(*ms)),
            Value::Text(s) => Ok(Key::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<StorageResult<Vec<_>>>()
                .map(Key::Array),
            other => Err(StorageError::InvalidKey(format!(
                "{:?} values cannot be keys",
                other.kind()
            ))),
        }
    }

    /// Converts the key back to a record value.
    ///
    /// Whole numbers within the `i64` range come back as integers.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Integer(*f as i64),
            Key::Number(f) => Value::Float(*f),
            Key::Date(ms) => Value::Date(*ms),
            Key::Text(s) => Value::Text(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::Text(_) => 2,
            Key::Array(_) => 3,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => a.total_cmp(b),
            (Key::Date(a), Key::Date(b)) => a.cmp(b),
            (Key::Text(a), Key::Text(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_by_kind_then_value() {
        let mut keys = vec![
            Key::Array(vec![]),
            Key::Text("b".into()),
            Key::Date(0),
            Key::Number(10.0),
            Key::Text("a".into()),
            Key::Number(-1.0),
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                Key::Number(-1.0),
                Key::Number(10.0),
                Key::Date(0),
                Key::Text("a".into()),
                Key::Text("b".into()),
                Key::Array(vec![]),
            ]
        );
    }

    #[test]
    fn integer_and_float_keys_coincide() {
        assert_eq!(
            Key::from_value(&Value::Integer(2)).unwrap(),
            Key::from_value(&Value::Float(2.0)).unwrap()
        );
        assert_eq!(
            Key::from_value(&Value::Float(-0.0)).unwrap(),
            Key::Number(0.0)
        );
        assert_eq!(Key::Number(2.0).to_value(), Value::Integer(2));
        assert_eq!(Key::Number(2.5).to_value(), Value::Float(2.5));
    }

    #[test]
    fn invalid_keys_rejected() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Float(f64::NAN),
            Value::Map(Default::default()),
            Value::Array(vec![Value::Null]),
        ] {
            assert!(matches!(
                Key::from_value(&value),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
