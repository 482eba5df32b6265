//! Storage backend contract.

use crate::error::StorageResult;
use crate::event::{Request, TransactionEvents};
use std::rc::Rc;
use stowdb_codec::Value;

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
    /// Schema changes; only available inside an upgrade.
    VersionChange,
}

/// Notification that a database version is changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    /// The version currently stored (0 for a new database).
    pub old_version: u32,
    /// The version being opened, or `None` when the database is deleted.
    pub new_version: Option<u32>,
}

/// Options for [`UpgradeTransaction::create_object_store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Record field holding the key.
    pub key_path: String,
    /// Whether the backend generates integer keys for records without one.
    pub auto_increment: bool,
}

/// Options for [`ObjectStore::create_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Reject two records with equal non-null values for the field.
    pub unique: bool,
}

/// Callback run inside the version-change transaction of an upgrade.
///
/// Returning an error rolls back every change made in it and fails the open.
pub type UpgradeHandler =
    Box<dyn FnOnce(&VersionChange, &dyn UpgradeTransaction) -> StorageResult<()>>;

/// Callback run when another open requests a newer version or a delete.
pub type VersionChangeHandler = Box<dyn FnMut(&VersionChange)>;

/// A request/event based key-value storage backend.
///
/// Every operation returns immediately with a [`Request`] whose events fire
/// when the backend finishes. Implementations are single-threaded.
///
/// # Implementors
///
/// - [`crate::MemoryBackend`] - in-process, used by tests and the demo
pub trait StorageBackend {
    /// Opens `name` at `version`.
    ///
    /// When `version` exceeds the stored version, open connections are
    /// notified first, then `on_upgrade` runs. If the stored version is
    /// higher the request fails with [`crate::StorageError::Version`].
    fn open(&self, name: &str, version: u32, on_upgrade: UpgradeHandler)
        -> Request<Rc<dyn Connection>>;

    /// Deletes `name` and all of its stores.
    fn delete_database(&self, name: &str) -> Request<()>;
}

/// An open database connection.
pub trait Connection {
    /// Database name.
    fn name(&self) -> &str;

    /// Version the connection was opened at.
    fn version(&self) -> u32;

    /// Names of the object stores, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Starts a transaction over `stores`.
    ///
    /// # Errors
    ///
    /// Fails if the connection is closed, a store does not exist, `stores`
    /// is empty, or `mode` is [`TransactionMode::VersionChange`].
    fn transaction(
        &self,
        stores: &[&str],
        mode: TransactionMode,
    ) -> StorageResult<Rc<dyn Transaction>>;

    /// Closes the connection. Idempotent.
    fn close(&self);

    /// Returns `true` once [`Connection::close`] was called.
    fn is_closed(&self) -> bool;

    /// Installs the version-change handler, replacing any previous one.
    fn on_version_change(&self, handler: VersionChangeHandler);
}

/// A live transaction.
pub trait Transaction {
    /// Access mode.
    fn mode(&self) -> TransactionMode;

    /// Handle to a store in scope.
    ///
    /// # Errors
    ///
    /// Fails if `name` is not in the transaction's scope or the
    /// transaction has finished.
    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>>;

    /// Completion events.
    fn events(&self) -> &TransactionEvents;

    /// Publishes the transaction's writes and fires `complete`, or fires
    /// `abort` if the backend refuses. No-op once finished.
    fn commit(&self);

    /// Discards the transaction's writes and fires `abort`.
    fn abort(&self);
}

/// Handle to one object store inside a transaction.
pub trait ObjectStore {
    /// Store name.
    fn name(&self) -> &str;

    /// Record field holding the key.
    fn key_path(&self) -> String;

    /// Whether keys are generated.
    fn auto_increment(&self) -> bool;

    /// Names of the store's indexes, sorted.
    fn index_names(&self) -> Vec<String>;

    /// Creates an index over `field`. Version-change transactions only.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::IndexExists`] if the name is taken,
    /// or [`crate::StorageError::Constraint`] if existing records violate a
    /// unique index.
    fn create_index(&self, name: &str, field: &str, options: IndexOptions) -> StorageResult<()>;

    /// Inserts a new record. Fails if the key exists. Resolves to the key.
    fn add(&self, record: Value) -> Request<Value>;

    /// Inserts or replaces a record. Resolves to the key.
    fn put(&self, record: Value) -> Request<Value>;

    /// Every record in ascending key order.
    fn get_all(&self) -> Request<Vec<Value>>;

    /// Removes the record with `key`, if any.
    fn delete(&self, key: Value) -> Request<()>;
}

/// Schema access during an upgrade.
pub trait UpgradeTransaction {
    /// Names of the stores that currently exist, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::StoreExists`] if the name is taken.
    fn create_object_store(
        &self,
        name: &str,
        options: StoreOptions,
    ) -> StorageResult<Rc<dyn ObjectStore>>;

    /// Handle to an existing store.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::StoreNotFound`].
    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>>;
}
