//! IndexedDB transactions, object stores and upgrades.

use super::listeners::{dom_error, request_error, thrown, Listeners};
use crate::convert::{from_js, to_js};
use js_sys::Array;
use std::rc::Rc;
use stowdb_codec::Value;
use stowdb_storage::{
    IndexOptions, ObjectStore, Request, StorageError, StorageResult, StoreOptions, Transaction,
    TransactionEvents, TransactionMode, UpgradeTransaction,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    DomStringList, IdbDatabase, IdbIndexParameters, IdbObjectStore, IdbObjectStoreParameters,
    IdbRequest, IdbTransaction, IdbTransactionMode,
};

/// Sorted names from a `DOMStringList`.
pub(crate) fn string_list(list: &DomStringList) -> Vec<String> {
    let mut names: Vec<String> = (0..list.length()).filter_map(|i| list.item(i)).collect();
    names.sort();
    names
}

pub(crate) fn idb_mode(mode: TransactionMode) -> IdbTransactionMode {
    match mode {
        TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
        TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        TransactionMode::VersionChange => IdbTransactionMode::Versionchange,
    }
}

/// A read-only or read-write IndexedDB transaction.
pub(crate) struct IdbTx {
    tx: IdbTransaction,
    mode: TransactionMode,
    scope: Vec<String>,
    events: TransactionEvents,
}

impl IdbTx {
    /// Wraps `tx` and routes its terminal events into [`TransactionEvents`].
    pub(crate) fn begin(tx: IdbTransaction, mode: TransactionMode, scope: Vec<String>) -> Self {
        let events = TransactionEvents::new();
        let listeners = Listeners::new();

        let on_complete = {
            let (events, listeners, tx) = (events.clone(), listeners.clone(), tx.clone());
            listeners.clone().handler(move |_| {
                events.fire_complete();
                detach(&tx);
                listeners.release();
            })
        };
        let on_abort = {
            let (events, listeners, tx) = (events.clone(), listeners.clone(), tx.clone());
            listeners.clone().handler(move |_| {
                // A request failure aborts with that failure as the error.
                match tx.error() {
                    Some(exception) => events.fire_error(dom_error(&exception)),
                    None => events.fire_abort(StorageError::Aborted(
                        "transaction aborted".to_string(),
                    )),
                };
                detach(&tx);
                listeners.release();
            })
        };
        tx.set_oncomplete(Some(&on_complete));
        tx.set_onabort(Some(&on_abort));

        Self {
            tx,
            mode,
            scope,
            events,
        }
    }
}

fn detach(tx: &IdbTransaction) {
    tx.set_oncomplete(None);
    tx.set_onabort(None);
}

impl Transaction for IdbTx {
    fn mode(&self) -> TransactionMode {
        self.mode
    }

    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>> {
        if !self.scope.iter().any(|s| s == name) {
            return Err(StorageError::StoreNotFound(name.to_string()));
        }
        if self.events.is_finished() {
            return Err(StorageError::InvalidState(
                "transaction has finished".to_string(),
            ));
        }
        let store = self.tx.object_store(name).map_err(thrown)?;
        Ok(Rc::new(IdbStore::new(store, self.tx.clone(), self.mode)))
    }

    fn events(&self) -> &TransactionEvents {
        &self.events
    }

    fn commit(&self) {
        if self.events.is_finished() {
            return;
        }
        // Browsers without `commit()` commit once the last request settles.
        if let Err(e) = self.tx.commit() {
            tracing::debug!(error = ?e, "explicit commit unavailable; relying on auto-commit");
        }
    }

    fn abort(&self) {
        if self.events.is_finished() {
            return;
        }
        if let Err(e) = self.tx.abort() {
            tracing::debug!(error = ?e, "abort after the transaction finished");
        }
    }
}

/// An object store inside an IndexedDB transaction.
pub(crate) struct IdbStore {
    store: IdbObjectStore,
    tx: IdbTransaction,
    mode: TransactionMode,
    name: String,
}

impl IdbStore {
    pub(crate) fn new(store: IdbObjectStore, tx: IdbTransaction, mode: TransactionMode) -> Self {
        let name = store.name();
        Self {
            store,
            tx,
            mode,
            name,
        }
    }

    /// Fails the request and takes the transaction down with it.
    fn refuse<T>(&self, error: StorageError) -> Request<T> {
        tracing::debug!(store = %self.name, %error, "request refused");
        if let Err(e) = self.tx.abort() {
            tracing::debug!(error = ?e, "abort after the transaction finished");
        }
        Request::failed(error)
    }

    /// Bridges an IndexedDB request onto a [`Request`].
    fn track<T: 'static>(
        &self,
        issued: Result<IdbRequest, JsValue>,
        convert: impl Fn(JsValue) -> StorageResult<T> + 'static,
    ) -> Request<T> {
        let idb = match issued {
            Ok(idb) => idb,
            Err(e) => return self.refuse(thrown(e)),
        };
        let request = Request::new();
        let listeners = Listeners::new();

        let on_success = {
            let (request, listeners, idb, tx) =
                (request.clone(), listeners.clone(), idb.clone(), self.tx.clone());
            listeners.clone().handler(move |_| {
                match idb.result().map_err(thrown).and_then(&convert) {
                    Ok(value) => request.succeed(value),
                    Err(error) => {
                        request.fail(error);
                        let _ = tx.abort();
                    }
                }
                detach_request(&idb);
                listeners.release();
            })
        };
        let on_error = {
            let (request, listeners, idb) = (request.clone(), listeners.clone(), idb.clone());
            listeners.clone().handler(move |_| {
                request.fail(request_error(&idb));
                detach_request(&idb);
                listeners.release();
            })
        };
        idb.set_onsuccess(Some(&on_success));
        idb.set_onerror(Some(&on_error));
        request
    }

    fn write(&self, record: &Value, put: bool) -> Request<Value> {
        let js = match to_js(record) {
            Ok(js) => js,
            Err(e) => return self.refuse(e),
        };
        let issued = if put {
            self.store.put(&js)
        } else {
            self.store.add(&js)
        };
        self.track(issued, |key| from_js(&key))
    }
}

fn detach_request(idb: &IdbRequest) {
    idb.set_onsuccess(None);
    idb.set_onerror(None);
}

impl ObjectStore for IdbStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn key_path(&self) -> String {
        self.store
            .key_path()
            .ok()
            .and_then(|path| path.as_string())
            .unwrap_or_default()
    }

    fn auto_increment(&self) -> bool {
        self.store.auto_increment()
    }

    fn index_names(&self) -> Vec<String> {
        string_list(&self.store.index_names())
    }

    fn create_index(&self, name: &str, field: &str, options: IndexOptions) -> StorageResult<()> {
        if self.mode != TransactionMode::VersionChange {
            return Err(StorageError::InvalidState(
                "indexes can only be created during an upgrade".to_string(),
            ));
        }
        if self.index_names().iter().any(|n| n == name) {
            return Err(StorageError::IndexExists(name.to_string()));
        }
        let params = IdbIndexParameters::new();
        params.set_unique(options.unique);
        self.store
            .create_index_with_str_and_optional_parameters(name, field, &params)
            .map(|_| ())
            .map_err(thrown)
    }

    fn add(&self, record: Value) -> Request<Value> {
        self.write(&record, false)
    }

    fn put(&self, record: Value) -> Request<Value> {
        self.write(&record, true)
    }

    fn get_all(&self) -> Request<Vec<Value>> {
        self.track(self.store.get_all(), |result| {
            result
                .dyn_into::<Array>()
                .map_err(|_| StorageError::Backend("getAll did not return an array".to_string()))?
                .iter()
                .map(|record| from_js(&record))
                .collect()
        })
    }

    fn delete(&self, key: Value) -> Request<()> {
        match to_js(&key) {
            Ok(js) => self.track(self.store.delete(&js), |_| Ok(())),
            Err(e) => self.refuse(e),
        }
    }
}

/// Schema access inside the `versionchange` transaction of an open.
pub(crate) struct IdbUpgrade {
    db: IdbDatabase,
    tx: IdbTransaction,
}

impl IdbUpgrade {
    pub(crate) fn new(db: IdbDatabase, tx: IdbTransaction) -> Self {
        Self { db, tx }
    }
}

impl UpgradeTransaction for IdbUpgrade {
    fn object_store_names(&self) -> Vec<String> {
        string_list(&self.db.object_store_names())
    }

    fn create_object_store(
        &self,
        name: &str,
        options: StoreOptions,
    ) -> StorageResult<Rc<dyn ObjectStore>> {
        if self.object_store_names().iter().any(|n| n == name) {
            return Err(StorageError::StoreExists(name.to_string()));
        }
        let params = IdbObjectStoreParameters::new();
        params.set_key_path(&JsValue::from_str(&options.key_path));
        params.set_auto_increment(options.auto_increment);
        let store = self
            .db
            .create_object_store_with_optional_parameters(name, &params)
            .map_err(thrown)?;
        Ok(Rc::new(IdbStore::new(
            store,
            self.tx.clone(),
            TransactionMode::VersionChange,
        )))
    }

    fn object_store(&self, name: &str) -> StorageResult<Rc<dyn ObjectStore>> {
        if !self.object_store_names().iter().any(|n| n == name) {
            return Err(StorageError::StoreNotFound(name.to_string()));
        }
        let store = self.tx.object_store(name).map_err(thrown)?;
        Ok(Rc::new(IdbStore::new(
            store,
            self.tx.clone(),
            TransactionMode::VersionChange,
        )))
    }
}
