//! Dynamic record value type.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A record field map, keyed by field name.
pub type Map = BTreeMap<String, Value>;

/// A dynamic record value.
///
/// Records stored by StowDB are [`Value::Map`]s. `Integer` and `Float` are
/// both numbers: they compare and test equal numerically, so `1` and `1.0`
/// are the same value for querying purposes.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Point in time, as milliseconds since the Unix epoch.
    Date(i64),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of field name to value.
    Map(Map),
}

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Null`].
    Null,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Integer`] or [`Value::Float`].
    Number,
    /// [`Value::Text`].
    Text,
    /// [`Value::Date`].
    Date,
    /// [`Value::Array`].
    Array,
    /// [`Value::Map`].
    Map,
}

impl ValueKind {
    /// Rank used to order values of different kinds.
    fn rank(self) -> u8 {
        match self {
            ValueKind::Null => 0,
            ValueKind::Number => 1,
            ValueKind::Text => 2,
            ValueKind::Date => 3,
            ValueKind::Bool => 4,
            ValueKind::Array => 5,
            ValueKind::Map => 6,
        }
    }
}

impl Value {
    /// Builds a map value from field/value pairs.
    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) | Value::Float(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::Array(_) => ValueKind::Array,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is a number of either representation.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as epoch milliseconds, if it is a date.
    pub fn as_date(&self) -> Option<i64> {
        match self {
            Value::Date(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get this value as a mutable map, if it is one.
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Consumes the value, returning its map if it is one.
    pub fn into_map(self) -> Option<Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a field in this map value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(field))
    }

    /// Relational comparison.
    ///
    /// Defined only between two numbers, two texts, two dates, or two
    /// booleans. Everything else (including null) is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(i), Value::Float(f)) => compare_integer_float(*i, *f),
            (Value::Float(f), Value::Integer(i)) => {
                compare_integer_float(*i, *f).map(Ordering::reverse)
            }
            _ => None,
        }
    }

    /// Total order used for sorting.
    ///
    /// Values of different kinds order by kind (null, numbers, texts, dates,
    /// booleans, arrays, maps). NaN sorts after every other number.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        let (ka, kb) = (self.kind(), other.kind());
        if ka != kb {
            return ka.rank().cmp(&kb.rank());
        }
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                for (av, bv) in a.iter().zip(b.iter()) {
                    let ord = av.sort_cmp(bv);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ak, av), (bk, bv)) in a.iter().zip(b.iter()) {
                    let ord = ak.cmp(bk).then_with(|| av.sort_cmp(bv));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.compare(other).unwrap_or_else(|| {
                let a_nan = self.as_f64().is_some_and(f64::is_nan);
                let b_nan = other.as_f64().is_some_and(f64::is_nan);
                a_nan.cmp(&b_nan)
            }),
        }
    }
}

/// Exact comparison of an integer with a float, without rounding the
/// integer through `f64`. `None` when `f` is NaN.
#[allow(clippy::cast_possible_truncation)]
fn compare_integer_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63: the first float above every i64.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        None
    } else if f >= BOUND {
        Some(Ordering::Less)
    } else if f < -BOUND {
        Some(Ordering::Greater)
    } else {
        // In range, so the truncated float converts to i64 exactly.
        let whole = f.trunc();
        let by_whole = i.cmp(&(whole as i64));
        Some(by_whole.then(whole.partial_cmp(&f).unwrap_or(Ordering::Equal)))
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                compare_integer_float(*i, *f) == Some(Ordering::Equal)
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Map(m)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// Builds a [`Map`] from `field => value` pairs.
///
/// ```
/// use stowdb_codec::{record, Value};
///
/// let row = record! { "title" => "write docs", "done" => false };
/// assert_eq!(row.get("done"), Some(&Value::Bool(false)));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Map::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Map::new();
        $(map.insert(::std::string::String::from($field), $crate::Value::from($value));)+
        map
    }};
}
