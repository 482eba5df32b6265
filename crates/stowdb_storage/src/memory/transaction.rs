//! Transactions and object store handles of the in-memory backend.

use super::{Registry, StoreData};
use crate::backend::{
    IndexOptions, ObjectStore, StoreOptions, Transaction, TransactionMode, UpgradeTransaction,
};
use crate::error::{StorageError, StorageResult};
use crate::event::{Request, TransactionEvents};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use stowdb_codec::Value;

/// Working state shared by a transaction and the store handles it hands out.
///
/// Requests apply to `working`, a private copy of the stores in scope.
/// Nothing reaches the registry until commit.
pub(crate) struct Scope {
    registry: Rc<RefCell<Registry>>,
    database: String,
    mode: TransactionMode,
    working: RefCell<BTreeMap<String, StoreData>>,
    events: TransactionEvents,
    failure: RefCell<Option<StorageError>>,
}

impl Scope {
    pub(crate) fn new(
        registry: Rc<RefCell<Registry>>,
        database: &str,
        mode: TransactionMode,
        working: BTreeMap<String, StoreData>,
    ) -> Rc<Self> {
        Rc::new(Self {
            registry,
            database: database.to_string(),
            mode,
            working: RefCell::new(working),
            events: TransactionEvents::new(),
            failure: RefCell::new(None),
        })
    }

    /// The error that brought the scope down, if any.
    pub(crate) fn failure(&self) -> Option<StorageError> {
        self.failure.borrow().clone()
    }

    /// Takes the working stores out of the scope.
    pub(crate) fn take_working(&self) -> BTreeMap<String, StoreData> {
        self.working.take()
    }

    fn is_finished(&self) -> bool {
        self.events.is_finished() || self.failure.borrow().is_some()
    }

    fn fail(&self, error: StorageError) {
        {
            let mut failure = self.failure.borrow_mut();
            if failure.is_some() {
                return;
            }
            *failure = Some(error.clone());
        }
        self.working.borrow_mut().clear();
        self.events.fire_error(error);
    }

    fn reject<T>(&self, error: StorageError) -> Request<T> {
        let request = Request::failed(error.clone());
        self.fail(error);
        request
    }

    fn ensure_active(&self) -> StorageResult<()> {
        if self.is_finished() {
            return Err(StorageError::InvalidState(
                "transaction has finished".to_string(),
            ));
        }
        Ok(())
    }

    fn read<T>(&self, store: &str, op: impl FnOnce(&StoreData) -> StorageResult<T>) -> Request<T> {
        if let Err(error) = self.ensure_active() {
            return Request::failed(error);
        }
        let result = match self.working.borrow().get(store) {
            Some(data) => op(data),
            None => Err(StorageError::StoreNotFound(store.to_string())),
        };
        match result {
            Ok(value) => Request::resolved(value),
            Err(error) => self.reject(error),
        }
    }

    fn write<T>(
        &self,
        store: &str,
        op: impl FnOnce(&mut StoreData) -> StorageResult<T>,
    ) -> Request<T> {
        if let Err(error) = self.ensure_active() {
            return Request::failed(error);
        }
        if self.mode == TransactionMode::ReadOnly {
            return self.reject(StorageError::ReadOnly);
        }

        let injected = self.registry.borrow_mut().take_write_fault(store);
        let result = match injected {
            Some(error) => Err(error),
            None => match self.working.borrow_mut().get_mut(store) {
                Some(data) => op(data),
                None => Err(StorageError::StoreNotFound(store.to_string())),
            },
        };

        match result {
            Ok(value) => Request::resolved(value),
            Err(error) => self.reject(error),
        }
    }

    fn commit(&self) {
        if self.is_finished() || self.mode == TransactionMode::VersionChange {
            return;
        }

        let stores: Vec<String> = self.working.borrow().keys().cloned().collect();
        let refused = self.registry.borrow_mut().take_commit_fault(&stores);
        if let Some(error) = refused {
            self.working.borrow_mut().clear();
            self.events.fire_abort(error);
            return;
        }

        if self.mode == TransactionMode::ReadWrite {
            let working = self.working.take();
            let published = {
                let mut registry = self.registry.borrow_mut();
                match registry.databases.get_mut(&self.database) {
                    Some(database) => {
                        database.stores.extend(working);
                        true
                    }
                    None => false,
                }
            };
            if !published {
                self.events.fire_abort(StorageError::Aborted(format!(
                    "database '{}' was deleted",
                    self.database
                )));
                return;
            }
        }

        self.events.fire_complete();
    }

    fn abort(&self) {
        if self.is_finished() {
            return;
        }
        self.working.borrow_mut().clear();
        self.events
            .fire_abort(StorageError::Aborted("aborted by caller".to_string()));
    }
}

/// A transaction over a fixed set of stores.
pub(crate) struct MemoryTransaction {
    pub(crate) scope: Rc<Scope>,
}

impl Transaction for MemoryTransaction {
    fn mode(&self) -> TransactionMode {
        self.scope.mode
    }

    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>> {
        self.scope.ensure_active()?;
        if !self.scope.working.borrow().contains_key(name) {
            return Err(StorageError::StoreNotFound(name.to_string()));
        }
        Ok(Rc::new(MemoryObjectStore {
            scope: Rc::clone(&self.scope),
            name: name.to_string(),
        }))
    }

    fn events(&self) -> &TransactionEvents {
        &self.scope.events
    }

    fn commit(&self) {
        self.scope.commit();
    }

    fn abort(&self) {
        self.scope.abort();
    }
}

/// Schema access for an upgrade; stores are staged in the scope.
pub(crate) struct MemoryUpgrade {
    pub(crate) scope: Rc<Scope>,
}

impl UpgradeTransaction for MemoryUpgrade {
    fn object_store_names(&self) -> Vec<String> {
        self.scope.working.borrow().keys().cloned().collect()
    }

    fn create_object_store(
        &self,
        name: &str,
        options: StoreOptions,
    ) -> StorageResult<Rc<dyn ObjectStore>> {
        self.scope.ensure_active()?;
        {
            let mut working = self.scope.working.borrow_mut();
            if working.contains_key(name) {
                return Err(StorageError::StoreExists(name.to_string()));
            }
            working.insert(name.to_string(), StoreData::new(name, options));
        }
        self.object_store(name)
    }

    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>> {
        if !self.scope.working.borrow().contains_key(name) {
            return Err(StorageError::StoreNotFound(name.to_string()));
        }
        Ok(Rc::new(MemoryObjectStore {
            scope: Rc::clone(&self.scope),
            name: name.to_string(),
        }))
    }
}

/// Handle to one store within a scope.
struct MemoryObjectStore {
    scope: Rc<Scope>,
    name: String,
}

impl MemoryObjectStore {
    fn with_data<T>(&self, f: impl FnOnce(&StoreData) -> T) -> Option<T> {
        self.scope.working.borrow().get(&self.name).map(f)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_path(&self) -> String {
        self.with_data(|data| data.key_path.clone())
            .unwrap_or_default()
    }

    fn auto_increment(&self) -> bool {
        self.with_data(|data| data.auto_increment)
            .unwrap_or(false)
    }

    fn index_names(&self) -> Vec<String> {
        self.with_data(|data| data.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn create_index(&self, name: &str, field: &str, options: IndexOptions) -> StorageResult<()> {
        if self.scope.mode != TransactionMode::VersionChange {
            return Err(StorageError::InvalidState(
                "indexes can only be created during an upgrade".to_string(),
            ));
        }
        self.scope.ensure_active()?;
        match self.scope.working.borrow_mut().get_mut(&self.name) {
            Some(data) => data.create_index(name, field, options),
            None => Err(StorageError::StoreNotFound(self.name.clone())),
        }
    }

    fn add(&self, record: Value) -> Request<Value> {
        self.scope
            .write(&self.name, move |data| data.insert(record, false))
    }

    fn put(&self, record: Value) -> Request<Value> {
        self.scope
            .write(&self.name, move |data| data.insert(record, true))
    }

    fn get_all(&self) -> Request<Vec<Value>> {
        self.scope.read(&self.name, StoreData::all)
    }

    fn delete(&self, key: Value) -> Request<()> {
        self.scope.write(&self.name, move |data| data.remove(&key))
    }
}
