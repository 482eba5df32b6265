//! Column definitions and their fluent builder.
//!
//! One builder type serves every column type; the type is fixed when the
//! builder is created by one of the free functions ([`string`], [`number`],
//! [`boolean`], [`date`], [`object`], [`array`]).
//!
//! ```rust
//! use stowdb_core::schema::{boolean, date, number, string};
//!
//! let id = number().primary_key().auto_increment()?;
//! let title = string();
//! let completed = boolean();
//! let updated_at = date().nullable();
//! assert!(id.build().is_auto_increment);
//! # Ok::<(), stowdb_core::EngineError>(())
//! ```

use crate::error::{EngineError, EngineResult};
use std::fmt;
use stowdb_codec::Value;

/// The value type a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Text.
    String,
    /// Integer or float.
    Number,
    /// Boolean.
    Boolean,
    /// Point in time.
    Date,
    /// Nested map.
    Object,
    /// Array of values.
    Array,
}

impl ColumnType {
    /// Whether a non-null value fits this type.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ColumnType::String, Value::Text(_))
                | (ColumnType::Number, Value::Integer(_) | Value::Float(_))
                | (ColumnType::Boolean, Value::Bool(_))
                | (ColumnType::Date, Value::Date(_))
                | (ColumnType::Object, Value::Map(_))
                | (ColumnType::Array, Value::Array(_))
        )
    }

    /// Whether the type can serve as a store key.
    pub fn is_key_type(self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Number)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::String => "STRING",
            ColumnType::Number => "NUMBER",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Object => "OBJECT",
            ColumnType::Array => "ARRAY",
        };
        f.write_str(name)
    }
}

/// Immutable description of one column.
///
/// `is_auto_increment` implies `is_primary_key` and a `Number` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Value type.
    pub column_type: ColumnType,
    /// The column is the store key.
    pub is_primary_key: bool,
    /// The backend generates the key.
    pub is_auto_increment: bool,
    /// The column may be omitted or null.
    pub is_nullable: bool,
    /// Values must be distinct across the store.
    pub is_unique: bool,
}

impl ColumnDefinition {
    fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            is_primary_key: false,
            is_auto_increment: false,
            is_nullable: false,
            is_unique: false,
        }
    }
}

/// Something legal but probably unintended in a column builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnWarning {
    /// The primary key is neither `STRING` nor `NUMBER`.
    NonScalarPrimaryKey(ColumnType),
    /// `unique` on a primary key, which is unique already.
    RedundantUnique,
}

impl fmt::Display for ColumnWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnWarning::NonScalarPrimaryKey(column_type) => {
                write!(f, "{column_type} primary key; prefer STRING or NUMBER")
            }
            ColumnWarning::RedundantUnique => {
                f.write_str("unique on a primary key is redundant")
            }
        }
    }
}

/// Fluent builder for a [`ColumnDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBuilder {
    definition: ColumnDefinition,
    warnings: Vec<ColumnWarning>,
}

impl ColumnBuilder {
    /// Starts a column of the given type.
    #[must_use]
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            definition: ColumnDefinition::new(column_type),
            warnings: Vec::new(),
        }
    }

    /// The column's type.
    pub fn column_type(&self) -> ColumnType {
        self.definition.column_type
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.definition.is_primary_key = true;
        let column_type = self.definition.column_type;
        if !column_type.is_key_type() {
            tracing::warn!(%column_type, "primary key on a non-scalar column");
            self.warn(ColumnWarning::NonScalarPrimaryKey(column_type));
        }
        if self.definition.is_unique {
            tracing::warn!("unique on a primary key column is redundant");
            self.warn(ColumnWarning::RedundantUnique);
        }
        self
    }

    /// Lets the backend generate keys.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchema`] unless the column is already a
    /// primary key of type `NUMBER`.
    pub fn auto_increment(mut self) -> EngineResult<Self> {
        if !self.definition.is_primary_key {
            return Err(EngineError::invalid_schema(
                "autoIncrement requires primaryKey to be called first",
            ));
        }
        if self.definition.column_type != ColumnType::Number {
            return Err(EngineError::invalid_schema(format!(
                "autoIncrement requires a NUMBER column, not {}",
                self.definition.column_type
            )));
        }
        self.definition.is_auto_increment = true;
        Ok(self)
    }

    /// Allows the column to be omitted or null.
    #[must_use]
    pub fn nullable(self) -> Self {
        self.with_nullable(true)
    }

    /// Sets or clears nullability.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.definition.is_nullable = nullable;
        self
    }

    /// Requires distinct values across the store.
    #[must_use]
    pub fn unique(self) -> Self {
        self.with_unique(true)
    }

    /// Sets or clears uniqueness.
    #[must_use]
    pub fn with_unique(mut self, unique: bool) -> Self {
        if unique && self.definition.is_primary_key {
            tracing::warn!("unique on a primary key column is redundant");
            self.warn(ColumnWarning::RedundantUnique);
        }
        self.definition.is_unique = unique;
        self
    }

    /// Snapshot of the definition. Repeatable.
    pub fn build(&self) -> ColumnDefinition {
        self.definition
    }

    /// Warnings raised while building.
    pub fn warnings(&self) -> &[ColumnWarning] {
        &self.warnings
    }

    fn warn(&mut self, warning: ColumnWarning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

/// A `STRING` column.
#[must_use]
pub fn string() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::String)
}

/// A `NUMBER` column.
#[must_use]
pub fn number() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::Number)
}

/// A `BOOLEAN` column.
#[must_use]
pub fn boolean() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::Boolean)
}

/// A `DATE` column.
#[must_use]
pub fn date() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::Date)
}

/// An `OBJECT` column.
#[must_use]
pub fn object() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::Object)
}

/// An `ARRAY` column.
#[must_use]
pub fn array() -> ColumnBuilder {
    ColumnBuilder::new(ColumnType::Array)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_column_has_no_flags() {
        let def = string().build();
        assert_eq!(def.column_type, ColumnType::String);
        assert!(!def.is_primary_key);
        assert!(!def.is_auto_increment);
        assert!(!def.is_nullable);
        assert!(!def.is_unique);
    }

    #[test]
    fn auto_increment_primary_key() {
        let def = number().primary_key().auto_increment().unwrap().build();
        assert!(def.is_primary_key);
        assert!(def.is_auto_increment);
    }

    #[test]
    fn auto_increment_before_primary_key_fails() {
        assert!(matches!(
            number().auto_increment(),
            Err(EngineError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn auto_increment_on_non_number_fails() {
        for builder in [string(), date(), boolean(), object(), array()] {
            assert!(matches!(
                builder.primary_key().auto_increment(),
                Err(EngineError::InvalidSchema { .. })
            ));
        }
    }

    #[test]
    fn flags_toggle() {
        let builder = string().nullable().unique();
        assert!(builder.build().is_nullable);
        assert!(builder.build().is_unique);

        let cleared = builder.with_nullable(false).with_unique(false).build();
        assert!(!cleared.is_nullable);
        assert!(!cleared.is_unique);
    }

    #[test]
    fn build_is_repeatable() {
        let builder = date().nullable();
        assert_eq!(builder.build(), builder.build());
    }

    #[test]
    fn non_scalar_primary_key_warns() {
        let builder = date().primary_key();
        assert!(builder.build().is_primary_key);
        assert_eq!(
            builder.warnings(),
            &[ColumnWarning::NonScalarPrimaryKey(ColumnType::Date)]
        );
        assert!(string().primary_key().warnings().is_empty());
    }

    #[test]
    fn unique_primary_key_warns_but_succeeds() {
        let builder = number().primary_key().unique();
        assert!(builder.build().is_unique);
        assert_eq!(builder.warnings(), &[ColumnWarning::RedundantUnique]);
    }

    #[test]
    fn unique_then_primary_key_warns_once() {
        let builder = string().unique().primary_key();
        assert!(builder.build().is_primary_key);
        assert_eq!(builder.warnings(), &[ColumnWarning::RedundantUnique]);

        let twice = string().unique().primary_key().unique().primary_key();
        assert_eq!(twice.warnings(), &[ColumnWarning::RedundantUnique]);
    }

    #[test]
    fn type_acceptance() {
        assert!(ColumnType::Number.accepts(&Value::Integer(1)));
        assert!(ColumnType::Number.accepts(&Value::Float(1.5)));
        assert!(ColumnType::Date.accepts(&Value::Date(0)));
        assert!(!ColumnType::Date.accepts(&Value::Integer(0)));
        assert!(!ColumnType::String.accepts(&Value::Null));
    }
}
