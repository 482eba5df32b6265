//! Schema declaration and compilation.
//!
//! A [`SchemaBuilder`] collects column builders per store; [`SchemaBuilder::build`]
//! compiles them into an immutable [`Schema`]. Compilation does not check
//! primary keys: a store with zero or several keys is only rejected when the
//! database opens.
//!
//! ```rust
//! use stowdb_core::schema::{boolean, date, number, string, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new()
//!     .store("todos", [
//!         ("id", number().primary_key().auto_increment()?),
//!         ("title", string()),
//!         ("completed", boolean()),
//!         ("updatedAt", date().nullable()),
//!     ])
//!     .touch_on_update("todos", "updatedAt")
//!     .build()?;
//!
//! assert_eq!(schema.store_names(), vec!["todos"]);
//! # Ok::<(), stowdb_core::EngineError>(())
//! ```

mod column;

pub use column::{
    array, boolean, date, number, object, string, ColumnBuilder, ColumnDefinition, ColumnType,
    ColumnWarning,
};

use crate::error::{EngineError, EngineResult};

/// A builder warning attributed to its column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaWarning {
    /// Store the column belongs to.
    pub store: String,
    /// Column name.
    pub column: String,
    /// The warning.
    pub warning: ColumnWarning,
}

/// Compiled columns of one store, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    name: String,
    columns: Vec<(String, ColumnDefinition)>,
    touch_column: Option<String>,
}

impl StoreSchema {
    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.columns.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Looks up a column.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, def)| def)
    }

    /// The single primary-key column.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchema`] if the store has no primary key
    /// or more than one.
    pub fn primary_key(&self) -> EngineResult<(&str, &ColumnDefinition)> {
        let mut keys = self.columns().filter(|(_, def)| def.is_primary_key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(EngineError::invalid_schema(format!(
                "store '{}' has no primary key",
                self.name
            ))),
            (Some((first, _)), Some((second, _))) => Err(EngineError::invalid_schema(format!(
                "store '{}' has more than one primary key ('{first}', '{second}')",
                self.name
            ))),
        }
    }

    /// Non-key columns flagged unique.
    pub fn unique_columns(&self) -> Vec<&str> {
        self.columns()
            .filter(|(_, def)| def.is_unique && !def.is_primary_key)
            .map(|(name, _)| name)
            .collect()
    }

    /// Column stamped with the current time on update, if any.
    pub fn touch_column(&self) -> Option<&str> {
        self.touch_column.as_deref()
    }

    /// Name of the unique index backing `column`.
    pub fn index_name(column: &str) -> String {
        format!("{column}_idx")
    }
}

/// Compiled schema: every store the database should contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    stores: Vec<StoreSchema>,
    warnings: Vec<SchemaWarning>,
}

impl Schema {
    /// Stores in declaration order.
    pub fn stores(&self) -> &[StoreSchema] {
        &self.stores
    }

    /// Looks up a store.
    pub fn store(&self, name: &str) -> Option<&StoreSchema> {
        self.stores.iter().find(|store| store.name == name)
    }

    /// Store names in declaration order.
    pub fn store_names(&self) -> Vec<&str> {
        self.stores.iter().map(StoreSchema::name).collect()
    }

    /// Builder warnings collected during compilation.
    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    /// Checks that every store has exactly one primary key.
    ///
    /// # Errors
    ///
    /// Returns the first store's [`EngineError::InvalidSchema`].
    pub fn validate(&self) -> EngineResult<()> {
        for store in &self.stores {
            store.primary_key()?;
        }
        Ok(())
    }
}

/// Declares stores and their columns.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    stores: Vec<(String, Vec<(String, ColumnBuilder)>)>,
    touch: Vec<(String, String)>,
}

impl SchemaBuilder {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a store. Declaring the same store again replaces it, and a
    /// repeated column name replaces the earlier column.
    #[must_use]
    pub fn store<I, K>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = (K, ColumnBuilder)>,
        K: Into<String>,
    {
        let name = name.into();
        let mut compiled: Vec<(String, ColumnBuilder)> = Vec::new();
        for (column, builder) in columns {
            let column = column.into();
            match compiled.iter_mut().find(|(existing, _)| *existing == column) {
                Some(slot) => slot.1 = builder,
                None => compiled.push((column, builder)),
            }
        }

        match self.stores.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = compiled,
            None => self.stores.push((name, compiled)),
        }
        self
    }

    /// Stamps `column` of `store` with the current time on every update
    /// that does not set it explicitly. The column must be a `DATE`.
    #[must_use]
    pub fn touch_on_update(mut self, store: impl Into<String>, column: impl Into<String>) -> Self {
        let store = store.into();
        self.touch.retain(|(existing, _)| *existing != store);
        self.touch.push((store, column.into()));
        self
    }

    /// Compiles every column builder.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidSchema`] if a touch column names an
    /// unknown store or column, or a column that is not a `DATE`.
    pub fn build(&self) -> EngineResult<Schema> {
        let mut warnings = Vec::new();
        let mut stores: Vec<StoreSchema> = self
            .stores
            .iter()
            .map(|(name, columns)| {
                for (column, builder) in columns {
                    warnings.extend(builder.warnings().iter().map(|warning| SchemaWarning {
                        store: name.clone(),
                        column: column.clone(),
                        warning: *warning,
                    }));
                }
                StoreSchema {
                    name: name.clone(),
                    columns: columns
                        .iter()
                        .map(|(column, builder)| (column.clone(), builder.build()))
                        .collect(),
                    touch_column: None,
                }
            })
            .collect();

        for (store_name, column) in &self.touch {
            let store = stores
                .iter_mut()
                .find(|store| store.name == *store_name)
                .ok_or_else(|| {
                    EngineError::invalid_schema(format!(
                        "touch column declared for unknown store '{store_name}'"
                    ))
                })?;
            match store.column(column) {
                Some(def) if def.column_type == ColumnType::Date => {}
                Some(def) => {
                    return Err(EngineError::invalid_schema(format!(
                        "touch column '{store_name}.{column}' must be DATE, not {}",
                        def.column_type
                    )))
                }
                None => {
                    return Err(EngineError::invalid_schema(format!(
                        "touch column '{store_name}.{column}' is not declared"
                    )))
                }
            }
            store.touch_column = Some(column.clone());
        }

        Ok(Schema { stores, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todos() -> SchemaBuilder {
        SchemaBuilder::new().store(
            "todos",
            [
                ("id", number().primary_key().auto_increment().unwrap()),
                ("title", string()),
                ("slug", string().unique()),
                ("updatedAt", date().nullable()),
            ],
        )
    }

    #[test]
    fn compiles_columns_in_order() {
        let schema = todos().build().unwrap();
        let store = schema.store("todos").unwrap();

        let names: Vec<&str> = store.columns().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "title", "slug", "updatedAt"]);
        assert_eq!(store.primary_key().unwrap().0, "id");
        assert_eq!(store.unique_columns(), vec!["slug"]);
        assert_eq!(StoreSchema::index_name("slug"), "slug_idx");
    }

    #[test]
    fn missing_primary_key_compiles_but_fails_validation() {
        let schema = SchemaBuilder::new()
            .store("notes", [("body", string())])
            .build()
            .unwrap();

        assert!(matches!(
            schema.validate(),
            Err(EngineError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn two_primary_keys_fail_validation() {
        let schema = SchemaBuilder::new()
            .store(
                "pairs",
                [("a", string().primary_key()), ("b", number().primary_key())],
            )
            .build()
            .unwrap();

        let err = schema.store("pairs").unwrap().primary_key().unwrap_err();
        assert!(err.to_string().contains("more than one primary key"));
    }

    #[test]
    fn redeclared_store_and_column_replace() {
        let schema = SchemaBuilder::new()
            .store("s", [("id", string().primary_key()), ("id", number().primary_key())])
            .store("s", [("key", string().primary_key())])
            .build()
            .unwrap();

        assert_eq!(schema.stores().len(), 1);
        assert_eq!(schema.store("s").unwrap().primary_key().unwrap().0, "key");
    }

    #[test]
    fn touch_column_is_recorded() {
        let schema = todos()
            .touch_on_update("todos", "updatedAt")
            .build()
            .unwrap();
        assert_eq!(
            schema.store("todos").unwrap().touch_column(),
            Some("updatedAt")
        );
    }

    #[test]
    fn touch_column_must_exist_and_be_date() {
        assert!(todos().touch_on_update("todos", "nope").build().is_err());
        assert!(todos().touch_on_update("other", "updatedAt").build().is_err());
        assert!(todos().touch_on_update("todos", "title").build().is_err());
    }

    #[test]
    fn builder_warnings_are_collected() {
        let schema = SchemaBuilder::new()
            .store("events", [("at", date().primary_key())])
            .build()
            .unwrap();

        assert_eq!(
            schema.warnings(),
            &[SchemaWarning {
                store: "events".to_string(),
                column: "at".to_string(),
                warning: ColumnWarning::NonScalarPrimaryKey(ColumnType::Date),
            }]
        );
    }
}
