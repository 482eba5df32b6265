//! In-memory storage backend.

mod transaction;

use crate::backend::{
    Connection, IndexOptions, StorageBackend, StoreOptions, Transaction, TransactionMode,
    UpgradeHandler, VersionChange, VersionChangeHandler,
};
use crate::error::{StorageError, StorageResult};
use crate::event::Request;
use crate::key::Key;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use stowdb_codec::{from_cbor, to_canonical_cbor, Value};
use transaction::{MemoryTransaction, MemoryUpgrade, Scope};

/// A failure to inject into a [`MemoryBackend`].
///
/// Each fault fires once and is then removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The `nth` write (add, put or delete, counted from 1) to `store`
    /// fails with `error`.
    FailWrite {
        /// Target store.
        store: String,
        /// Which write fails.
        nth: usize,
        /// Error the write request reports.
        error: StorageError,
    },
    /// The next commit of a transaction covering `store` aborts with `error`
    /// even though its requests succeeded.
    AbortCommit {
        /// Target store.
        store: String,
        /// Abort reason.
        error: StorageError,
    },
    /// The next open fails with `error`.
    FailOpen {
        /// Error the open request reports.
        error: StorageError,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct IndexData {
    field: String,
    unique: bool,
}

/// Largest key an auto-increment store hands out (2^53).
const MAX_GENERATED_KEY: i64 = 1 << 53;

/// One object store: records keyed in natural order, held as CBOR bytes.
#[derive(Debug, Clone)]
pub(crate) struct StoreData {
    name: String,
    key_path: String,
    auto_increment: bool,
    next_key: i64,
    indexes: BTreeMap<String, IndexData>,
    records: BTreeMap<Key, Vec<u8>>,
}

impl StoreData {
    fn new(name: &str, options: StoreOptions) -> Self {
        Self {
            name: name.to_string(),
            key_path: options.key_path,
            auto_increment: options.auto_increment,
            next_key: 1,
            indexes: BTreeMap::new(),
            records: BTreeMap::new(),
        }
    }

    fn decode(bytes: &[u8]) -> StorageResult<Value> {
        from_cbor(bytes).map_err(StorageError::from)
    }

    fn all(&self) -> StorageResult<Vec<Value>> {
        self.records.values().map(|bytes| Self::decode(bytes)).collect()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn insert(&mut self, record: Value, overwrite: bool) -> StorageResult<Value> {
        let mut map = record
            .into_map()
            .ok_or_else(|| StorageError::InvalidKey("records must be maps".to_string()))?;

        let mut generated = None;
        let key = match map.get(&self.key_path) {
            Some(value) if !value.is_null() => Key::from_value(value)?,
            _ if self.auto_increment => {
                if self.next_key > MAX_GENERATED_KEY {
                    return Err(StorageError::Constraint(format!(
                        "key generator for '{}' is exhausted",
                        self.name
                    )));
                }
                generated = Some(self.next_key);
                Key::Number(self.next_key as f64)
            }
            _ => {
                return Err(StorageError::InvalidKey(format!(
                    "record has no '{}' key",
                    self.key_path
                )))
            }
        };

        if !overwrite && self.records.contains_key(&key) {
            return Err(StorageError::Constraint(format!(
                "key {:?} already exists in '{}'",
                key.to_value(),
                self.name
            )));
        }

        if let Some(id) = generated {
            map.insert(self.key_path.clone(), Value::Integer(id));
        }
        let record = Value::Map(map);
        self.check_unique(&record, &key)?;

        match (&key, generated) {
            (_, Some(id)) => self.next_key = id + 1,
            (Key::Number(n), None) if self.auto_increment && *n >= self.next_key as f64 => {
                self.next_key = if *n >= MAX_GENERATED_KEY as f64 {
                    MAX_GENERATED_KEY + 1
                } else {
                    n.floor() as i64 + 1
                };
            }
            _ => {}
        }

        self.records.insert(key.clone(), to_canonical_cbor(&record));
        Ok(key.to_value())
    }

    fn remove(&mut self, key: &Value) -> StorageResult<()> {
        let key = Key::from_value(key)?;
        self.records.remove(&key);
        Ok(())
    }

    fn check_unique(&self, record: &Value, key: &Key) -> StorageResult<()> {
        for (index_name, index) in self.indexes.iter().filter(|(_, index)| index.unique) {
            let Some(value) = record.get(&index.field).filter(|v| !v.is_null()) else {
                continue;
            };
            for (other_key, bytes) in &self.records {
                if other_key == key {
                    continue;
                }
                if Self::decode(bytes)?.get(&index.field) == Some(value) {
                    return Err(StorageError::Constraint(format!(
                        "unique index '{index_name}' already contains {value:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn create_index(&mut self, name: &str, field: &str, options: IndexOptions) -> StorageResult<()> {
        if self.indexes.contains_key(name) {
            return Err(StorageError::IndexExists(name.to_string()));
        }

        if options.unique {
            let mut seen: Vec<Value> = Vec::new();
            for record in self.all()? {
                let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                    continue;
                };
                if seen.contains(value) {
                    return Err(StorageError::Constraint(format!(
                        "existing records violate unique index '{name}'"
                    )));
                }
                seen.push(value.clone());
            }
        }

        self.indexes.insert(
            name.to_string(),
            IndexData {
                field: field.to_string(),
                unique: options.unique,
            },
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseData {
    version: u32,
    stores: BTreeMap<String, StoreData>,
}

struct ConnectionState {
    database: String,
    closed: Cell<bool>,
    on_version_change: RefCell<Option<VersionChangeHandler>>,
}

#[derive(Default)]
pub(crate) struct Registry {
    databases: BTreeMap<String, DatabaseData>,
    faults: Vec<Fault>,
    connections: Vec<Weak<ConnectionState>>,
}

impl Registry {
    fn take_open_fault(&mut self) -> Option<StorageError> {
        let position = self
            .faults
            .iter()
            .position(|fault| matches!(fault, Fault::FailOpen { .. }))?;
        match self.faults.remove(position) {
            Fault::FailOpen { error } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn take_write_fault(&mut self, target: &str) -> Option<StorageError> {
        let mut fired = None;
        for (position, fault) in self.faults.iter_mut().enumerate() {
            if let Fault::FailWrite { store, nth, .. } = fault {
                if store.as_str() != target {
                    continue;
                }
                if *nth <= 1 {
                    fired = Some(position);
                    break;
                }
                *nth -= 1;
            }
        }
        match self.faults.remove(fired?) {
            Fault::FailWrite { error, .. } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn take_commit_fault(&mut self, stores: &[String]) -> Option<StorageError> {
        let position = self.faults.iter().position(
            |fault| matches!(fault, Fault::AbortCommit { store, .. } if stores.contains(store)),
        )?;
        match self.faults.remove(position) {
            Fault::AbortCommit { error, .. } => Some(error),
            _ => None,
        }
    }

    fn open_connections(&mut self, database: &str) -> Vec<Rc<ConnectionState>> {
        self.connections.retain(|c| c.strong_count() > 0);
        self.connections
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|c| c.database == database && !c.closed.get())
            .collect()
    }
}

/// An in-process [`StorageBackend`].
///
/// Records are held as canonical CBOR, so every read decodes a fresh
/// snapshot. Cloning the backend shares the same databases, which is how
/// tests open a second "process" against the same data.
///
/// Requests settle synchronously; their events are retained until a
/// listener attaches. A transaction's writes become visible on
/// [`Transaction::commit`].
///
/// # Example
///
/// ```rust
/// use stowdb_storage::{Connection, MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::new();
/// let request = backend.open("todos", 1, Box::new(|_, _| Ok(())));
/// request.on_success(|connection| assert_eq!(connection.version(), 1));
/// assert_eq!(backend.version("todos"), Some(1));
/// ```
#[derive(Clone, Default)]
pub struct MemoryBackend {
    registry: Rc<RefCell<Registry>>,
}

impl MemoryBackend {
    /// Creates a backend with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a fault.
    pub fn inject(&self, fault: Fault) {
        self.registry.borrow_mut().faults.push(fault);
    }

    /// Number of queued faults that have not fired.
    #[must_use]
    pub fn pending_faults(&self) -> usize {
        self.registry.borrow().faults.len()
    }

    /// Names of all databases, sorted.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        self.registry.borrow().databases.keys().cloned().collect()
    }

    /// Stored version of `database`.
    #[must_use]
    pub fn version(&self, database: &str) -> Option<u32> {
        self.registry
            .borrow()
            .databases
            .get(database)
            .map(|db| db.version)
    }

    /// Committed store names of `database`, sorted.
    #[must_use]
    pub fn store_names(&self, database: &str) -> Vec<String> {
        self.registry
            .borrow()
            .databases
            .get(database)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Index names of a committed store, sorted.
    #[must_use]
    pub fn index_names(&self, database: &str, store: &str) -> Vec<String> {
        self.with_store(database, store, |s| s.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed records in a store.
    #[must_use]
    pub fn record_count(&self, database: &str, store: &str) -> usize {
        self.with_store(database, store, |s| s.records.len())
            .unwrap_or(0)
    }

    /// Committed records of a store in natural order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotFound`] or a decoding error.
    pub fn records(&self, database: &str, store: &str) -> StorageResult<Vec<Value>> {
        self.with_store(database, store, StoreData::all)
            .unwrap_or_else(|| Err(StorageError::StoreNotFound(store.to_string())))
    }

    /// Number of connections to `database` that are still open.
    #[must_use]
    pub fn open_connection_count(&self, database: &str) -> usize {
        self.registry.borrow_mut().open_connections(database).len()
    }

    fn with_store<T>(
        &self,
        database: &str,
        store: &str,
        f: impl FnOnce(&StoreData) -> T,
    ) -> Option<T> {
        self.registry
            .borrow()
            .databases
            .get(database)
            .and_then(|db| db.stores.get(store))
            .map(f)
    }

    /// Notifies open connections of `database`. Returns `true` if all of
    /// them closed in response.
    fn notify_connections(&self, database: &str, change: VersionChange) -> bool {
        let open = self.registry.borrow_mut().open_connections(database);
        for connection in &open {
            let handler = connection.on_version_change.borrow_mut().take();
            if let Some(mut handler) = handler {
                handler(&change);
                let mut slot = connection.on_version_change.borrow_mut();
                if slot.is_none() {
                    *slot = Some(handler);
                }
            }
        }
        open.iter().all(|c| c.closed.get())
    }

    fn upgrade(
        &self,
        name: &str,
        change: VersionChange,
        on_upgrade: UpgradeHandler,
    ) -> StorageResult<()> {
        let staged = self
            .registry
            .borrow()
            .databases
            .get(name)
            .map(|db| db.stores.clone())
            .unwrap_or_default();
        let scope = Scope::new(
            Rc::clone(&self.registry),
            name,
            TransactionMode::VersionChange,
            staged,
        );

        on_upgrade(
            &change,
            &MemoryUpgrade {
                scope: Rc::clone(&scope),
            },
        )?;
        if let Some(error) = scope.failure() {
            return Err(error);
        }

        let stores = scope.take_working();
        let version = change.new_version.unwrap_or(change.old_version);
        self.registry
            .borrow_mut()
            .databases
            .insert(name.to_string(), DatabaseData { version, stores });
        Ok(())
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("databases", &self.database_names())
            .field("pending_faults", &self.pending_faults())
            .finish()
    }
}

impl StorageBackend for MemoryBackend {
    fn open(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHandler,
    ) -> Request<Rc<dyn Connection>> {
        if let Some(error) = self.registry.borrow_mut().take_open_fault() {
            return Request::failed(error);
        }
        if version == 0 {
            return Request::failed(StorageError::InvalidState(
                "version must be at least 1".to_string(),
            ));
        }

        let stored = self.version(name).unwrap_or(0);
        if version < stored {
            return Request::failed(StorageError::Version {
                requested: version,
                stored,
            });
        }

        if version > stored {
            let change = VersionChange {
                old_version: stored,
                new_version: Some(version),
            };
            if !self.notify_connections(name, change) {
                return Request::failed(StorageError::Blocked(name.to_string()));
            }
            if let Err(error) = self.upgrade(name, change, on_upgrade) {
                return Request::failed(error);
            }
        }

        let state = Rc::new(ConnectionState {
            database: name.to_string(),
            closed: Cell::new(false),
            on_version_change: RefCell::new(None),
        });
        self.registry
            .borrow_mut()
            .connections
            .push(Rc::downgrade(&state));

        let connection: Rc<dyn Connection> = Rc::new(MemoryConnection {
            registry: Rc::clone(&self.registry),
            state,
            name: name.to_string(),
            version,
        });
        Request::resolved(connection)
    }

    fn delete_database(&self, name: &str) -> Request<()> {
        let Some(stored) = self.version(name) else {
            return Request::resolved(());
        };
        let change = VersionChange {
            old_version: stored,
            new_version: None,
        };
        if !self.notify_connections(name, change) {
            return Request::failed(StorageError::Blocked(name.to_string()));
        }
        self.registry.borrow_mut().databases.remove(name);
        Request::resolved(())
    }
}

/// A connection to one database of a [`MemoryBackend`].
struct MemoryConnection {
    registry: Rc<RefCell<Registry>>,
    state: Rc<ConnectionState>,
    name: String,
    version: u32,
}

impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn object_store_names(&self) -> Vec<String> {
        self.registry
            .borrow()
            .databases
            .get(&self.name)
            .map(|db| db.stores.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn transaction(
        &self,
        stores: &[&str],
        mode: TransactionMode,
    ) -> StorageResult<Rc<dyn Transaction>> {
        if self.state.closed.get() {
            return Err(StorageError::Closed);
        }
        if stores.is_empty() {
            return Err(StorageError::InvalidState(
                "a transaction needs at least one store".to_string(),
            ));
        }
        if mode == TransactionMode::VersionChange {
            return Err(StorageError::InvalidState(
                "version-change transactions are only created by open".to_string(),
            ));
        }

        let working = {
            let registry = self.registry.borrow();
            let database = registry
                .databases
                .get(&self.name)
                .ok_or_else(|| StorageError::InvalidState(format!("database '{}' was deleted", self.name)))?;
            let mut working = BTreeMap::new();
            for &store in stores {
                let data = database
                    .stores
                    .get(store)
                    .ok_or_else(|| StorageError::StoreNotFound(store.to_string()))?;
                working.insert(store.to_string(), data.clone());
            }
            working
        };

        Ok(Rc::new(MemoryTransaction {
            scope: Scope::new(Rc::clone(&self.registry), &self.name, mode, working),
        }))
    }

    fn close(&self) {
        self.state.closed.set(true);
    }

    fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    fn on_version_change(&self, handler: VersionChangeHandler) {
        *self.state.on_version_change.borrow_mut() = Some(handler);
    }
}
