//! Schema and query descriptions passed from JavaScript.
//!
//! A schema is a plain object keyed by store name:
//!
//! ```javascript
//! {
//!   todos: {
//!     columns: {
//!       id: { type: "number", primaryKey: true, autoIncrement: true },
//!       title: { type: "string" },
//!       updatedAt: { type: "date", nullable: true },
//!     },
//!     touchOnUpdate: "updatedAt",
//!   },
//! }
//! ```
//!
//! A query is `{ where, orderBy, limit }`, all optional. `where` maps a
//! field to a bare value (equality) or an operator object such as
//! `{ greaterThan: new Date() }`; `orderBy` is a list of
//! `[field, "asc" | "desc"]` pairs.

use crate::convert::record_from_js;
use crate::error::{WasmError, WasmResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use stowdb_codec::{Map, Value};
use stowdb_core::query::{Condition, Direction, Operators, Predicate, Query};
use stowdb_core::schema::{ColumnBuilder, ColumnType, SchemaBuilder};
use stowdb_core::Update;
use wasm_bindgen::JsValue;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColumnKind {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
}

impl From<ColumnKind> for ColumnType {
    fn from(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::String => ColumnType::String,
            ColumnKind::Number => ColumnType::Number,
            ColumnKind::Boolean => ColumnType::Boolean,
            ColumnKind::Date => ColumnType::Date,
            ColumnKind::Object => ColumnType::Object,
            ColumnKind::Array => ColumnType::Array,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnSpec {
    #[serde(rename = "type")]
    kind: ColumnKind,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    auto_increment: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    unique: bool,
}

impl ColumnSpec {
    fn into_builder(self) -> WasmResult<ColumnBuilder> {
        let mut builder = ColumnBuilder::new(self.kind.into());
        if self.primary_key {
            builder = builder.primary_key();
        }
        if self.auto_increment {
            builder = builder.auto_increment()?;
        }
        Ok(builder.with_nullable(self.nullable).with_unique(self.unique))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSpec {
    columns: BTreeMap<String, ColumnSpec>,
    #[serde(default)]
    touch_on_update: Option<String>,
}

/// Builds a schema from its JavaScript description.
///
/// # Errors
///
/// Fails if the description does not have the documented shape, or if a
/// column uses `autoIncrement` without being a number primary key.
pub fn schema_from_js(value: JsValue) -> WasmResult<SchemaBuilder> {
    let stores: BTreeMap<String, StoreSpec> = serde_wasm_bindgen::from_value(value)?;
    let mut schema = SchemaBuilder::new();
    for (name, spec) in stores {
        let columns = spec
            .columns
            .into_iter()
            .map(|(column, spec)| Ok((column, spec.into_builder()?)))
            .collect::<WasmResult<Vec<_>>>()?;
        schema = schema.store(name.clone(), columns);
        if let Some(column) = spec.touch_on_update {
            schema = schema.touch_on_update(name, column);
        }
    }
    Ok(schema)
}

fn invalid(message: impl Into<String>) -> WasmError {
    WasmError::InvalidInput(message.into())
}

/// Turns an operator object into [`Operators`]. Unknown keys are ignored,
/// so an object with no known operator matches nothing.
fn operators(fields: Map) -> WasmResult<Operators> {
    let mut ops = Operators::new();
    for (key, operand) in fields {
        ops = match key.as_str() {
            "equals" => ops.equals(operand),
            "notEquals" => ops.not_equals(operand),
            "greaterThan" => ops.greater_than(operand),
            "greaterThanOrEqual" => ops.greater_than_or_equal(operand),
            "lessThan" => ops.less_than(operand),
            "lessThanOrEqual" => ops.less_than_or_equal(operand),
            "inArray" => match operand {
                Value::Array(items) => ops.in_array(items),
                _ => return Err(invalid("inArray expects an array")),
            },
            "isBetween" => match operand {
                Value::Array(bounds) if bounds.len() == 2 => {
                    let mut bounds = bounds.into_iter();
                    match (bounds.next(), bounds.next()) {
                        (Some(low), Some(high)) => ops.is_between(low, high),
                        _ => return Err(invalid("isBetween expects [low, high]")),
                    }
                }
                _ => return Err(invalid("isBetween expects [low, high]")),
            },
            "contains" | "looseContains" => {
                let Value::Text(needle) = operand else {
                    return Err(invalid(format!("{key} expects a string")));
                };
                if key == "contains" {
                    ops.contains(needle)
                } else {
                    ops.loose_contains(needle)
                }
            }
            _ => ops,
        };
    }
    Ok(ops)
}

/// Builds a predicate from a `where` object.
///
/// # Errors
///
/// Fails if `value` is not an object or an operator has the wrong operand.
pub fn predicate_from_js(value: &JsValue) -> WasmResult<Predicate> {
    if value.is_null() || value.is_undefined() {
        return Ok(Predicate::new());
    }
    predicate(record_from_js(value)?)
}

fn predicate(conditions: Map) -> WasmResult<Predicate> {
    let mut predicate = Predicate::new();
    for (field, condition) in conditions {
        let condition = match condition {
            Value::Map(fields) => Condition::from(operators(fields)?),
            bare => Condition::from(bare),
        };
        predicate = predicate.when(field, condition);
    }
    Ok(predicate)
}

fn direction(value: &Value) -> WasmResult<Direction> {
    match value.as_text() {
        Some("asc") => Ok(Direction::Asc),
        Some("desc") => Ok(Direction::Desc),
        _ => Err(invalid("order direction must be \"asc\" or \"desc\"")),
    }
}

/// Builds a query from `{ where, orderBy, limit }`.
///
/// # Errors
///
/// Fails if any part does not have the documented shape.
pub fn query_from_js(value: &JsValue) -> WasmResult<Query> {
    if value.is_null() || value.is_undefined() {
        return Ok(Query::new());
    }
    let mut description = record_from_js(value)?;
    let mut query = match description.remove("where") {
        None | Some(Value::Null) => Query::new(),
        Some(Value::Map(conditions)) => Query::new().filter(predicate(conditions)?),
        Some(_) => return Err(invalid("where must be an object")),
    };

    match description.remove("orderBy") {
        None | Some(Value::Null) => {}
        Some(Value::Array(keys)) => {
            for key in keys {
                let pair = key.as_array().unwrap_or_default();
                match pair {
                    [Value::Text(field)] => query = query.order_by(field.clone(), Direction::Asc),
                    [Value::Text(field), dir] => {
                        query = query.order_by(field.clone(), direction(dir)?);
                    }
                    _ => return Err(invalid("orderBy entries are [field, direction]")),
                }
            }
        }
        Some(_) => return Err(invalid("orderBy must be an array")),
    }

    match description.remove("limit") {
        None | Some(Value::Null) => {}
        Some(Value::Integer(n)) if n >= 0 => {
            let limit = usize::try_from(n).map_err(|_| invalid("limit is too large"))?;
            query = query.limit(limit);
        }
        Some(_) => return Err(invalid("limit must be a non-negative integer")),
    }
    Ok(query)
}

/// Builds an update from a patch object and an optional `where` object.
///
/// # Errors
///
/// Fails if the patch is not an object or the predicate is malformed.
pub fn update_from_js(patch: &JsValue, where_clause: &JsValue) -> WasmResult<Update> {
    let patch = record_from_js(patch)?;
    Ok(Update::set(patch).filter(predicate_from_js(where_clause)?))
}
