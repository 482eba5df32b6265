//! Per-store CRUD operations.
//!
//! Every operation runs through the transaction gateway, one transaction
//! per backend request. Reads fetch the whole store and filter, sort and
//! limit in memory. Batch writes issue one transaction per record: a
//! failing record does not undo records already written.

use crate::database::DatabaseInner;
use crate::error::{EngineError, EngineResult};
use crate::future::EngineFuture;
use crate::query::{Condition, Predicate, Query};
use crate::schema::{ColumnDefinition, StoreSchema};
use std::fmt;
use std::rc::Rc;
use stowdb_codec::{Map, Value};
use stowdb_storage::TransactionMode;

/// A shallow patch and the records it applies to.
///
/// ```rust
/// use stowdb_codec::record;
/// use stowdb_core::Update;
///
/// let update = Update::set(record! { "completed" => true }).eq("id", 1);
/// assert_eq!(update.patch.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields written onto every matched record.
    pub patch: Map,
    /// Records the patch applies to.
    pub predicate: Predicate,
}

impl Update {
    /// Starts an update writing `patch`. Without conditions it matches
    /// every record.
    #[must_use]
    pub fn set(patch: Map) -> Self {
        Self {
            patch,
            predicate: Predicate::new(),
        }
    }

    /// Adds every condition of `predicate`.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = self.predicate.and(predicate);
        self
    }

    /// Adds a condition on `field`.
    #[must_use]
    pub fn when(mut self, field: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.predicate = self.predicate.when(field, condition);
        self
    }

    /// Adds an equality condition on `field`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate = self.predicate.eq(field, value);
        self
    }
}

/// CRUD handle for one store.
///
/// Obtained from [`crate::Database::store`]. Holding a table keeps the
/// database connection alive.
#[derive(Clone)]
pub struct Table {
    db: Rc<DatabaseInner>,
    schema: Rc<StoreSchema>,
}

impl Table {
    pub(crate) fn new(db: Rc<DatabaseInner>, schema: Rc<StoreSchema>) -> Self {
        Self { db, schema }
    }

    /// Store name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// The store's columns.
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Inserts `row` and returns its key.
    ///
    /// An auto-increment key may be omitted (or null) and is assigned by
    /// the backend. Nullable columns may be omitted.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotOpen`] unless the database is ready
    /// - [`EngineError::InvalidRecord`] if a required column is missing or
    ///   a value has the wrong type
    /// - [`EngineError::Storage`] if the backend rejects the write, for
    ///   example on a duplicate key or unique value
    pub async fn insert(&self, row: Map) -> EngineResult<Value> {
        self.db.ensure_ready()?;
        let row = self.prepare_insert(row)?;
        self.db
            .gateway
            .run(self.name(), TransactionMode::ReadWrite, move |store| {
                store.add(Value::Map(row))
            })
            .await
    }

    /// Every record in natural key order.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotOpen`] unless the database is ready, or the
    /// backend's error.
    pub async fn get_all(&self) -> EngineResult<Vec<Value>> {
        self.db.ensure_ready()?;
        self.db
            .gateway
            .run(self.name(), TransactionMode::ReadOnly, |store| {
                store.get_all()
            })
            .await
    }

    /// Runs `query` over the whole store.
    ///
    /// # Errors
    ///
    /// Same as [`Table::get_all`].
    pub async fn select(&self, query: &Query) -> EngineResult<Vec<Value>> {
        let records = self.get_all().await?;
        Ok(query.execute(records))
    }

    /// Number of records in the store.
    ///
    /// # Errors
    ///
    /// Same as [`Table::get_all`].
    pub async fn count(&self) -> EngineResult<usize> {
        Ok(self.get_all().await?.len())
    }

    /// Merges `update.patch` into every matching record and writes each back
    /// in its own transaction. Returns the number of records rewritten.
    ///
    /// The primary key is never rewritten; a key in the patch is ignored.
    /// If the store has a touch column and the patch does not set it, it is
    /// stamped with the current time.
    ///
    /// # Errors
    ///
    /// Fails before writing anything if the patch does not fit the columns.
    /// Otherwise every matched record is attempted and the first write
    /// error is returned; records written before or after it stay written.
    pub async fn update(&self, update: &Update) -> EngineResult<usize> {
        let records = self.get_all().await?;
        let (key, _) = self.schema.primary_key()?;
        self.check_patch(&update.patch)?;

        let stamp = self
            .schema
            .touch_column()
            .filter(|column| !update.patch.contains_key(*column))
            .map(|column| {
                (
                    column.to_string(),
                    Value::Date(self.db.config.clock.now_millis()),
                )
            });

        let mut pending = Vec::new();
        for record in records {
            if !update.predicate.matches(&record) {
                continue;
            }
            let Value::Map(mut merged) = record else {
                continue;
            };
            for (field, value) in &update.patch {
                if field != key {
                    merged.insert(field.clone(), value.clone());
                }
            }
            if let Some((column, now)) = &stamp {
                merged.insert(column.clone(), now.clone());
            }
            pending.push(
                self.db
                    .gateway
                    .run(self.name(), TransactionMode::ReadWrite, move |store| {
                        store.put(Value::Map(merged))
                    }),
            );
        }

        tracing::debug!(store = self.name(), matched = pending.len(), "update");
        settle_each(pending).await
    }

    /// Deletes every record matching `predicate`, each in its own
    /// transaction. Returns the number of records removed.
    ///
    /// # Errors
    ///
    /// Every matched record is attempted and the first error is returned;
    /// records deleted before or after it stay deleted.
    pub async fn delete(&self, predicate: &Predicate) -> EngineResult<usize> {
        let records = self.get_all().await?;
        let (key, _) = self.schema.primary_key()?;

        let pending: Vec<_> = records
            .iter()
            .filter(|record| predicate.matches(record))
            .filter_map(|record| record.get(key).cloned())
            .map(|id| {
                self.db
                    .gateway
                    .run(self.name(), TransactionMode::ReadWrite, move |store| {
                        store.delete(id)
                    })
            })
            .collect();

        tracing::debug!(store = self.name(), matched = pending.len(), "delete");
        settle_each(pending).await
    }

    fn prepare_insert(&self, mut row: Map) -> EngineResult<Map> {
        for (column, definition) in self.schema.columns() {
            let present = row.get(column).is_some_and(|value| !value.is_null());
            match row.get(column) {
                Some(value) if present => self.check_type(column, definition, value)?,
                _ if definition.is_auto_increment => {
                    row.remove(column);
                }
                _ if definition.is_nullable => {}
                _ => {
                    return Err(EngineError::invalid_record(
                        self.name(),
                        format!("missing value for column '{column}'"),
                    ))
                }
            }
        }
        Ok(row)
    }

    fn check_patch(&self, patch: &Map) -> EngineResult<()> {
        for (field, value) in patch {
            let Some(definition) = self.schema.column(field) else {
                continue;
            };
            if definition.is_primary_key {
                continue;
            }
            if value.is_null() {
                if !definition.is_nullable {
                    return Err(EngineError::invalid_record(
                        self.name(),
                        format!("column '{field}' is not nullable"),
                    ));
                }
                continue;
            }
            self.check_type(field, definition, value)?;
        }
        Ok(())
    }

    fn check_type(
        &self,
        column: &str,
        definition: &ColumnDefinition,
        value: &Value,
    ) -> EngineResult<()> {
        if definition.column_type.accepts(value) {
            return Ok(());
        }
        Err(EngineError::invalid_record(
            self.name(),
            format!(
                "column '{column}' expects {}, got {:?}",
                definition.column_type,
                value.kind()
            ),
        ))
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table").field("name", &self.name()).finish()
    }
}

/// Awaits every write, counting successes. The first error wins.
async fn settle_each<T>(pending: Vec<EngineFuture<T>>) -> EngineResult<usize> {
    let mut written = 0;
    let mut first_error = None;
    for write in pending {
        match write.await {
            Ok(_) => written += 1,
            Err(error) => {
                tracing::warn!(%error, "batch write failed");
                first_error.get_or_insert(error);
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::schema::{boolean, date, number, string, SchemaBuilder};
    use crate::{Config, Database};
    use stowdb_codec::record;
    use stowdb_storage::MemoryBackend;

    async fn notes(clock: Rc<ManualClock>) -> (MemoryBackend, Database) {
        let backend = MemoryBackend::new();
        let schema = SchemaBuilder::new()
            .store(
                "notes",
                [
                    ("id", number().primary_key().auto_increment().unwrap()),
                    ("body", string()),
                    ("pinned", boolean()),
                    ("editedAt", date().nullable()),
                ],
            )
            .touch_on_update("notes", "editedAt");
        let db = Database::connect(
            Rc::new(backend.clone()),
            Config::new("notes").clock(clock),
            schema,
        )
        .await
        .unwrap();
        (backend, db)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_assigns_keys_and_strips_null_key() {
        let (_, db) = notes(Rc::new(ManualClock::new(0))).await;
        let table = db.store("notes").unwrap();

        let first = table
            .insert(record! { "body" => "a", "pinned" => false })
            .await
            .unwrap();
        let second = table
            .insert(record! { "id" => Value::Null, "body" => "b", "pinned" => true })
            .await
            .unwrap();

        assert_eq!(first, Value::Integer(1));
        assert_eq!(second, Value::Integer(2));
        assert_eq!(table.count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn insert_rejects_missing_and_mistyped_columns() {
        let (backend, db) = notes(Rc::new(ManualClock::new(0))).await;
        let table = db.store("notes").unwrap();

        let missing = table.insert(record! { "body" => "a" }).await;
        assert!(matches!(missing, Err(EngineError::InvalidRecord { .. })));

        let mistyped = table
            .insert(record! { "body" => 5, "pinned" => false })
            .await;
        assert!(matches!(mistyped, Err(EngineError::InvalidRecord { .. })));
        assert_eq!(backend.record_count("notes", "notes"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_stamps_touch_column_unless_patched() {
        let clock = Rc::new(ManualClock::new(1_000));
        let (_, db) = notes(Rc::clone(&clock)).await;
        let table = db.store("notes").unwrap();
        table
            .insert(record! { "body" => "a", "pinned" => false })
            .await
            .unwrap();

        clock.set(5_000);
        let changed = table
            .update(&Update::set(record! { "pinned" => true }))
            .await
            .unwrap();
        assert_eq!(changed, 1);
        let rows = table.get_all().await.unwrap();
        assert_eq!(rows[0].get("editedAt"), Some(&Value::Date(5_000)));

        table
            .update(&Update::set(record! { "editedAt" => Value::Date(42) }))
            .await
            .unwrap();
        let rows = table.get_all().await.unwrap();
        assert_eq!(rows[0].get("editedAt"), Some(&Value::Date(42)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn update_rejects_bad_patch_before_writing() {
        let (_, db) = notes(Rc::new(ManualClock::new(0))).await;
        let table = db.store("notes").unwrap();
        table
            .insert(record! { "body" => "a", "pinned" => false })
            .await
            .unwrap();

        let result = table
            .update(&Update::set(record! { "body" => Value::Null }))
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRecord { .. })));
        assert_eq!(
            table.get_all().await.unwrap()[0].get("body"),
            Some(&Value::from("a"))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn delete_counts_removed_records() {
        let (_, db) = notes(Rc::new(ManualClock::new(0))).await;
        let table = db.store("notes").unwrap();
        for (body, pinned) in [("a", true), ("b", false), ("c", true)] {
            table
                .insert(record! { "body" => body, "pinned" => pinned })
                .await
                .unwrap();
        }

        let removed = table
            .delete(&Predicate::new().eq("pinned", true))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let left = table.get_all().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].get("body"), Some(&Value::from("b")));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn operations_fail_after_close() {
        let backend = MemoryBackend::new();
        let db = Database::new(Rc::new(backend), Config::new("late"));
        let open = db.open(
            SchemaBuilder::new().store("notes", [("id", string().primary_key())]),
        );
        open.await.unwrap();
        db.close();

        let table = db.store("notes").unwrap();
        assert_eq!(table.get_all().await, Err(EngineError::NotOpen));
        assert_eq!(
            table.insert(record! { "id" => "x" }).await,
            Err(EngineError::NotOpen)
        );
    }
}
