//! Conversion between record values and JavaScript values.
//!
//! IndexedDB stores structured clones, so records cross the boundary as
//! plain objects. Dates go through `Date` rather than numbers: IndexedDB
//! orders date keys after number keys, and a millisecond count would sort
//! with the numbers.

use js_sys::{Array, Date, Object, Reflect};
use stowdb_codec::{CodecError, Map, Value};
use stowdb_storage::{StorageError, StorageResult};
use wasm_bindgen::{JsCast, JsValue};

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Converts a record value into a JavaScript value.
///
/// # Errors
///
/// Fails if a property cannot be set on the target object.
#[allow(clippy::cast_precision_loss)]
pub fn to_js(value: &Value) -> StorageResult<JsValue> {
    Ok(match value {
        Value::Null => JsValue::NULL,
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Integer(n) => JsValue::from_f64(*n as f64),
        Value::Float(f) => JsValue::from_f64(*f),
        Value::Text(s) => JsValue::from_str(s),
        Value::Date(ms) => Date::new(&JsValue::from_f64(*ms as f64)).into(),
        Value::Array(items) => {
            let array = Array::new_with_length(0);
            for item in items {
                array.push(&to_js(item)?);
            }
            array.into()
        }
        Value::Map(fields) => {
            let object = Object::new();
            for (field, item) in fields {
                Reflect::set(&object, &JsValue::from_str(field), &to_js(item)?)
                    .map_err(|e| js_failure("set property", &e))?;
            }
            object.into()
        }
    })
}

/// Converts a JavaScript value into a record value.
///
/// `undefined` becomes null. Whole numbers within the safe integer range
/// come back as integers.
///
/// # Errors
///
/// Fails for functions, symbols, bigints and invalid dates.
#[allow(clippy::cast_possible_truncation)]
pub fn from_js(value: &JsValue) -> StorageResult<Value> {
    if value.is_null() || value.is_undefined() {
        return Ok(Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(n) = value.as_f64() {
        return Ok(if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
            Value::Integer(n as i64)
        } else {
            Value::Float(n)
        });
    }
    if let Some(s) = value.as_string() {
        return Ok(Value::Text(s));
    }
    if let Some(date) = value.dyn_ref::<Date>() {
        let ms = date.get_time();
        if ms.is_nan() {
            return Err(unsupported("invalid Date"));
        }
        return Ok(Value::Date(ms as i64));
    }
    if Array::is_array(value) {
        let array: &Array = value.unchecked_ref();
        return array
            .iter()
            .map(|item| from_js(&item))
            .collect::<StorageResult<_>>()
            .map(Value::Array);
    }
    if value.is_function() || value.is_symbol() || value.is_bigint() {
        return Err(unsupported(&format!("{:?}", value.js_typeof())));
    }
    if let Some(object) = value.dyn_ref::<Object>() {
        let mut fields = Map::new();
        for key in Object::keys(object).iter() {
            let Some(field) = key.as_string() else {
                continue;
            };
            let item = Reflect::get(object, &key).map_err(|e| js_failure("get property", &e))?;
            fields.insert(field, from_js(&item)?);
        }
        return Ok(Value::Map(fields));
    }
    Err(unsupported(&format!("{:?}", value.js_typeof())))
}

/// Converts a JavaScript object into a record.
///
/// # Errors
///
/// Fails if `value` is not a plain object.
pub fn record_from_js(value: &JsValue) -> StorageResult<Map> {
    match from_js(value)? {
        Value::Map(fields) => Ok(fields),
        other => Err(unsupported(&format!("expected an object, got {:?}", other.kind()))),
    }
}

/// Converts a list of records into a JavaScript array.
///
/// # Errors
///
/// Fails if any record cannot be converted.
pub fn records_to_js(records: &[Value]) -> StorageResult<Array> {
    let array = Array::new_with_length(0);
    for record in records {
        array.push(&to_js(record)?);
    }
    Ok(array)
}

fn unsupported(what: &str) -> StorageError {
    StorageError::Codec(CodecError::unsupported_type(what))
}

pub(crate) fn js_failure(action: &str, error: &JsValue) -> StorageError {
    StorageError::Backend(format!(
        "{action}: {}",
        error.as_string().unwrap_or_else(|| format!("{error:?}"))
    ))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use stowdb_codec::record;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn dates_cross_as_date_objects() {
        let js = to_js(&Value::Date(1_700_000_000_000)).unwrap();
        assert!(js.is_instance_of::<Date>());
        assert_eq!(from_js(&js).unwrap(), Value::Date(1_700_000_000_000));
    }

    #[wasm_bindgen_test]
    fn whole_numbers_come_back_as_integers() {
        assert_eq!(from_js(&JsValue::from_f64(3.0)).unwrap(), Value::Integer(3));
        assert_eq!(from_js(&JsValue::from_f64(0.5)).unwrap(), Value::Float(0.5));
        assert_eq!(from_js(&JsValue::UNDEFINED).unwrap(), Value::Null);
    }

    #[wasm_bindgen_test]
    fn nested_records_survive() {
        let row = Value::Map(record! {
            "title" => "a",
            "tags" => Value::Array(vec![Value::from("x"), Value::Null]),
            "meta" => Value::Map(record! { "done" => true }),
        });
        assert_eq!(from_js(&to_js(&row).unwrap()).unwrap(), row);
    }

    #[wasm_bindgen_test]
    fn functions_are_rejected() {
        let f = js_sys::Function::new_no_args("return 1");
        assert!(matches!(from_js(&f.into()), Err(StorageError::Codec(_))));
    }
}
