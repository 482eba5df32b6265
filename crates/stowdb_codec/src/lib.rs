//! # StowDB Codec
//!
//! Record values and their canonical CBOR encoding.
//!
//! Every record StowDB stores is a [`Value::Map`]. This crate defines the
//! value model shared by the storage backends and the query engine:
//!
//! - [`Value`] with numeric equality across `Integer`/`Float`
//! - [`Value::compare`] for relational operators (partial, null-safe)
//! - [`Value::sort_cmp`] for ordering (total)
//! - Deterministic CBOR so a stored record is a byte snapshot
//! - JSON conversion for tooling and demos
//!
//! ## Usage
//!
//! ```
//! use stowdb_codec::{from_cbor, record, to_canonical_cbor, Value};
//!
//! let row = Value::Map(record! { "title" => "a", "completed" => false });
//! let bytes = to_canonical_cbor(&row);
//! assert_eq!(from_cbor(&bytes).unwrap(), row);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{from_json_str, to_json_string};
pub use value::{Map, Value, ValueKind};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e12f64..1.0e12).prop_map(Value::Float),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
            (0i64..4_102_444_800_000).prop_map(Value::Date),
        ]
    }

    fn value() -> impl Strategy<Value = Value> {
        scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(v in value()) {
            let bytes = to_canonical_cbor(&v);
            prop_assert_eq!(from_cbor(&bytes).unwrap(), v);
        }

        #[test]
        fn sort_cmp_is_antisymmetric(a in scalar(), b in scalar()) {
            prop_assert_eq!(a.sort_cmp(&b), b.sort_cmp(&a).reverse());
        }
    }
}
