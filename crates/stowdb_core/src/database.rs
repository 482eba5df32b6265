//! Database facade: open, schema materialization and lifecycle.

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventFeed};
use crate::future::EngineFuture;
use crate::gateway::TransactionGateway;
use crate::ready::{DatabaseState, Readiness};
use crate::schema::{Schema, SchemaBuilder, StoreSchema};
use crate::table::Table;
use futures_channel::mpsc::UnboundedReceiver;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use stowdb_storage::{
    Connection, IndexOptions, StorageBackend, StorageError, StoreOptions, UpgradeTransaction,
    VersionChange,
};

/// The main database handle.
///
/// A handle opens once. [`Database::open`] compiles the schema, asks the
/// backend for a connection at the configured version and, when the stored
/// version is behind, creates every missing store and unique index. The
/// returned readiness future settles exactly once; operations issued before
/// it resolves, or after it rejects, fail with [`EngineError::NotOpen`].
///
/// Clones share the same connection, which is closed when the last clone
/// and every [`Table`] obtained from it are dropped.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
/// use stowdb_codec::record;
/// use stowdb_core::schema::{number, string, SchemaBuilder};
/// use stowdb_core::{Config, Database};
/// use stowdb_storage::MemoryBackend;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let schema = SchemaBuilder::new().store("notes", [
///     ("id", number().primary_key().auto_increment()?),
///     ("body", string()),
/// ]);
///
/// let db = Database::connect(Rc::new(MemoryBackend::new()), Config::new("app"), schema).await?;
/// let notes = db.store("notes")?;
/// let key = notes.insert(record! { "body" => "hello" }).await?;
/// assert_eq!(notes.count().await?, 1);
/// # let _ = key;
/// # Ok::<(), stowdb_core::EngineError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Rc<DatabaseInner>,
}

pub(crate) struct DatabaseInner {
    pub(crate) config: Config,
    pub(crate) gateway: TransactionGateway,
    backend: Rc<dyn StorageBackend>,
    readiness: Readiness,
    schema: RefCell<Option<Rc<Schema>>>,
    events: EventFeed,
}

impl DatabaseInner {
    /// Fails with `NotOpen` unless the handle is ready.
    pub(crate) fn ensure_ready(&self) -> EngineResult<()> {
        if self.readiness.state() == DatabaseState::Ready {
            Ok(())
        } else {
            Err(EngineError::NotOpen)
        }
    }

    fn on_version_change(&self, change: &VersionChange) {
        if !self.readiness.invalidate(DatabaseState::ReloadRequired) {
            return;
        }
        self.gateway.close();
        self.events.emit(EngineEvent::ReloadRequired {
            old_version: change.old_version,
            new_version: change.new_version,
        });
    }
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        self.gateway.close();
    }
}

impl Database {
    /// Creates an unopened handle.
    pub fn new(backend: Rc<dyn StorageBackend>, config: Config) -> Self {
        Self {
            inner: Rc::new(DatabaseInner {
                config,
                gateway: TransactionGateway::new(),
                backend,
                readiness: Readiness::new(),
                schema: RefCell::new(None),
                events: EventFeed::new(),
            }),
        }
    }

    /// Creates a handle, opens it with `schema` and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Returns the readiness error; see [`Database::open`].
    pub async fn connect(
        backend: Rc<dyn StorageBackend>,
        config: Config,
        schema: SchemaBuilder,
    ) -> EngineResult<Self> {
        let db = Self::new(backend, config);
        db.open(schema).await?;
        Ok(db)
    }

    /// Opens the database and returns the readiness future.
    ///
    /// Only the first call opens; later calls return the same outcome.
    ///
    /// # Errors
    ///
    /// The future rejects with:
    /// - [`EngineError::InvalidSchema`] if the schema does not compile, a
    ///   store has zero or several primary keys, or a declared store is
    ///   missing from a database whose version was not bumped
    /// - [`EngineError::Storage`] if the backend refuses the open
    pub fn open(&self, schema: SchemaBuilder) -> EngineFuture<()> {
        let inner = &self.inner;
        if !inner.readiness.begin() {
            return inner.readiness.wait();
        }
        tracing::info!(
            name = %inner.config.name,
            version = inner.config.version,
            "opening database"
        );

        let schema = match schema.build() {
            Ok(schema) => Rc::new(schema),
            Err(error) => {
                inner.readiness.reject(error);
                return inner.readiness.wait();
            }
        };
        for warning in schema.warnings() {
            inner
                .events
                .emit(EngineEvent::SchemaWarning(warning.clone()));
        }
        *inner.schema.borrow_mut() = Some(Rc::clone(&schema));

        // The backend only carries a StorageError out of the upgrade, so
        // the engine error is kept here.
        let upgrade_failure: Rc<RefCell<Option<EngineError>>> = Rc::new(RefCell::new(None));

        let request = {
            let weak = Rc::downgrade(inner);
            let failure = Rc::clone(&upgrade_failure);
            let schema = Rc::clone(&schema);
            inner.backend.open(
                &inner.config.name,
                inner.config.version,
                Box::new(move |change: &VersionChange, upgrade: &dyn UpgradeTransaction| {
                    let result = match weak.upgrade() {
                        Some(inner) => materialize(&schema, change, upgrade, &inner.events),
                        None => Err(EngineError::NotOpen),
                    };
                    result.map_err(|error| {
                        let reported = match &error {
                            EngineError::Storage(storage) => storage.clone(),
                            other => StorageError::Aborted(other.to_string()),
                        };
                        *failure.borrow_mut() = Some(error);
                        reported
                    })
                }),
            )
        };

        let weak = Rc::downgrade(inner);
        request.on_success(move |connection| match weak.upgrade() {
            Some(inner) => on_open(&inner, connection),
            None => connection.close(),
        });
        let weak = Rc::downgrade(inner);
        request.on_error(move |error| {
            let error = upgrade_failure
                .borrow_mut()
                .take()
                .unwrap_or(EngineError::Storage(error));
            if let Some(inner) = weak.upgrade() {
                tracing::warn!(name = %inner.config.name, %error, "open failed");
                inner.readiness.reject(error);
            }
        });

        inner.readiness.wait()
    }

    /// Waits for the readiness outcome of [`Database::open`].
    ///
    /// Resolves immediately once settled; every caller sees the same result.
    pub fn ready(&self) -> EngineFuture<()> {
        self.inner.readiness.wait()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DatabaseState {
        self.inner.readiness.state()
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Requested version.
    pub fn version(&self) -> u32 {
        self.inner.config.version
    }

    /// The compiled schema, once [`Database::open`] compiled it.
    pub fn schema(&self) -> Option<Rc<Schema>> {
        self.inner.schema.borrow().clone()
    }

    /// Store names in schema declaration order.
    pub fn store_names(&self) -> Vec<String> {
        self.schema()
            .map(|schema| schema.store_names().into_iter().map(String::from).collect())
            .unwrap_or_default()
    }

    /// CRUD handle for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotOpen`] before [`Database::open`] and
    /// [`EngineError::UnknownStore`] if the schema does not declare `name`.
    pub fn store(&self, name: &str) -> EngineResult<Table> {
        let schema = self.schema().ok_or(EngineError::NotOpen)?;
        let store = schema
            .store(name)
            .ok_or_else(|| EngineError::unknown_store(name))?;
        Ok(Table::new(Rc::clone(&self.inner), Rc::new(store.clone())))
    }

    /// Warnings and lifecycle events.
    pub fn events(&self) -> &EventFeed {
        &self.inner.events
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Closes the connection. A ready handle moves to
    /// [`DatabaseState::Closed`]; operations then fail with `NotOpen`.
    pub fn close(&self) {
        if self.inner.readiness.invalidate(DatabaseState::Closed) {
            tracing::info!(name = %self.inner.config.name, "database closed");
        }
        self.inner.gateway.close();
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.config.name)
            .field("version", &self.inner.config.version)
            .field("state", &self.state())
            .finish()
    }
}

/// Deletes the database `name` and every store in it.
///
/// Open handles receive a version-change notification and move to
/// [`DatabaseState::ReloadRequired`].
///
/// # Errors
///
/// Rejects with [`EngineError::Storage`] if the backend refuses, for
/// example because a connection stayed open.
pub fn delete_database(backend: &dyn StorageBackend, name: &str) -> EngineFuture<()> {
    let request = backend.delete_database(name);
    let (settle, future) =
        EngineFuture::channel(|| EngineError::Storage(StorageError::Aborted("delete dropped".to_string())));
    let on_success = settle.clone();
    request.on_success(move |()| {
        on_success.settle(Ok(()));
    });
    request.on_error(move |error| {
        settle.settle(Err(EngineError::Storage(error)));
    });
    future
}

/// Upgrade path: create what the schema declares and the database lacks.
fn materialize(
    schema: &Schema,
    change: &VersionChange,
    upgrade: &dyn UpgradeTransaction,
    events: &EventFeed,
) -> EngineResult<()> {
    // Nothing is created unless every store has exactly one key.
    schema.validate()?;

    let existing = upgrade.object_store_names();
    for store in schema.stores() {
        let (key, definition) = store.primary_key()?;
        // Existing stores are left untouched, indexes included.
        if existing.iter().any(|name| name == store.name()) {
            events.emit(EngineEvent::StoreSkipped {
                store: store.name().to_string(),
            });
            continue;
        }
        tracing::debug!(store = store.name(), key, "creating store");
        let object_store = upgrade.create_object_store(
            store.name(),
            StoreOptions {
                key_path: key.to_string(),
                auto_increment: definition.is_auto_increment,
            },
        )?;

        let indexes = object_store.index_names();
        for column in store.unique_columns() {
            let index = StoreSchema::index_name(column);
            if indexes.contains(&index) {
                events.emit(EngineEvent::IndexSkipped {
                    store: store.name().to_string(),
                    index,
                });
                continue;
            }
            tracing::debug!(store = store.name(), %index, "creating unique index");
            object_store.create_index(&index, column, IndexOptions { unique: true })?;
        }
    }

    events.emit(EngineEvent::Upgraded {
        old_version: change.old_version,
        new_version: change.new_version.unwrap_or(change.old_version),
    });
    Ok(())
}

/// Ready path: check the opened database against the schema, then publish.
fn on_open(inner: &Rc<DatabaseInner>, connection: Rc<dyn Connection>) {
    let checked = match inner.schema.borrow().as_ref() {
        Some(schema) => verify(schema, &connection.object_store_names()),
        None => Err(EngineError::NotOpen),
    };
    if let Err(error) = checked {
        tracing::warn!(name = %inner.config.name, %error, "open failed");
        connection.close();
        inner.readiness.reject(error);
        return;
    }

    let weak: Weak<DatabaseInner> = Rc::downgrade(inner);
    connection.on_version_change(Box::new(move |change| {
        if let Some(inner) = weak.upgrade() {
            inner.on_version_change(change);
        }
    }));
    let version = connection.version();
    inner.gateway.attach(connection);
    if inner.readiness.resolve() {
        inner.events.emit(EngineEvent::Ready { version });
    }
}

fn verify(schema: &Schema, existing: &[String]) -> EngineResult<()> {
    schema.validate()?;
    for name in schema.store_names() {
        if !existing.iter().any(|store| store == name) {
            return Err(EngineError::invalid_schema(format!(
                "store '{name}' does not exist; bump the version to create it"
            )));
        }
    }
    Ok(())
}
