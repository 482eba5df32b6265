//! IndexedDB storage backend.
//!
//! Implements the StowDB backend contract on top of the browser's
//! `indexedDB` factory. The contract was modelled on IndexedDB, so the
//! mapping is mostly one to one:
//!
//! | Contract | IndexedDB |
//! |----------|-----------|
//! | [`StorageBackend::open`] | `indexedDB.open(name, version)` |
//! | upgrade handler | `upgradeneeded` |
//! | [`Connection::on_version_change`] | `versionchange` on the database |
//! | [`Transaction::commit`] | `IDBTransaction.commit()` |
//! | request events | `success` / `error` on `IDBRequest` |
//!
//! Works on the main thread and in workers: the factory is looked up on
//! the global object rather than on `window`.

use super::listeners::{request_error, thrown, Listeners};
use super::transaction::{idb_mode, string_list, IdbTx, IdbUpgrade};
use crate::error::{WasmError, WasmResult};
use js_sys::{Array, Reflect};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use stowdb_storage::{
    Connection, Request, StorageBackend, StorageError, StorageResult, Transaction,
    TransactionMode, UpgradeHandler, VersionChange, VersionChangeHandler,
};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbVersionChangeEvent};

/// IndexedDB-based storage backend.
#[derive(Clone)]
pub struct IndexedDbBackend {
    factory: IdbFactory,
}

impl IndexedDbBackend {
    /// Looks up the IndexedDB factory of the current global scope.
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::NotSupported`] when the scope has no
    /// `indexedDB`, e.g. in some private browsing modes.
    pub fn new() -> WasmResult<Self> {
        Reflect::get(&js_sys::global(), &JsValue::from_str("indexedDB"))
            .ok()
            .filter(|factory| !factory.is_undefined() && !factory.is_null())
            .and_then(|factory| factory.dyn_into::<IdbFactory>().ok())
            .map(|factory| Self { factory })
            .ok_or_else(|| WasmError::NotSupported("IndexedDB not available".into()))
    }

    /// Checks if IndexedDB is available.
    pub fn is_available() -> bool {
        Self::new().is_ok()
    }
}

impl std::fmt::Debug for IndexedDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedDbBackend").finish_non_exhaustive()
    }
}

fn detach_open(open: &IdbOpenDbRequest) {
    open.set_onsuccess(None);
    open.set_onerror(None);
    open.set_onblocked(None);
    open.set_onupgradeneeded(None);
}

fn database_of(open: &IdbOpenDbRequest) -> StorageResult<IdbDatabase> {
    open.result()
        .map_err(thrown)?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| StorageError::Backend("open did not produce a database".to_string()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn version_change(event: &IdbVersionChangeEvent) -> VersionChange {
    VersionChange {
        old_version: event.old_version() as u32,
        new_version: event.new_version().map(|v| v as u32),
    }
}

impl IndexedDbBackend {
    /// Learns the stored version of `name` after a `VersionError` and fails
    /// `request` with it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn report_version(&self, name: &str, requested: u32, request: Request<Rc<dyn Connection>>) {
        let probe = match self.factory.open(name) {
            Ok(probe) => probe,
            Err(e) => return request.fail(thrown(e)),
        };
        let listeners = Listeners::new();
        let on_success = {
            let (request, listeners, probe) = (request.clone(), listeners.clone(), probe.clone());
            listeners.clone().handler(move |_| {
                match database_of(&probe) {
                    Ok(db) => {
                        let stored = db.version() as u32;
                        db.close();
                        request.fail(StorageError::Version { requested, stored });
                    }
                    Err(error) => request.fail(error),
                }
                detach_open(&probe);
                listeners.release();
            })
        };
        let on_error = {
            let (listeners, probe) = (listeners.clone(), probe.clone());
            listeners.clone().handler(move |_| {
                request.fail(request_error(&probe));
                detach_open(&probe);
                listeners.release();
            })
        };
        probe.set_onsuccess(Some(&on_success));
        probe.set_onerror(Some(&on_error));
    }
}

impl StorageBackend for IndexedDbBackend {
    fn open(
        &self,
        name: &str,
        version: u32,
        on_upgrade: UpgradeHandler,
    ) -> Request<Rc<dyn Connection>> {
        if version == 0 {
            return Request::failed(StorageError::InvalidState(
                "version must be at least 1".to_string(),
            ));
        }
        let open = match self.factory.open_with_u32(name, version) {
            Ok(open) => open,
            Err(e) => return Request::failed(thrown(e)),
        };
        tracing::debug!(database = name, version, "opening IndexedDB database");

        let request: Request<Rc<dyn Connection>> = Request::new();
        let listeners = Listeners::new();
        let upgrade_error: Rc<RefCell<Option<StorageError>>> = Rc::new(RefCell::new(None));

        let on_upgrade_needed = {
            let (open, upgrade_error) = (open.clone(), Rc::clone(&upgrade_error));
            let mut on_upgrade = Some(on_upgrade);
            listeners.handler(move |event| {
                let change = version_change(event.unchecked_ref::<IdbVersionChangeEvent>());
                let (Some(handler), Some(tx)) = (on_upgrade.take(), open.transaction()) else {
                    return;
                };
                let outcome = database_of(&open)
                    .and_then(|db| handler(&change, &IdbUpgrade::new(db, tx.clone())));
                if let Err(error) = outcome {
                    tracing::warn!(%error, "upgrade failed; rolling back");
                    *upgrade_error.borrow_mut() = Some(error);
                    let _ = tx.abort();
                }
            })
        };

        let on_success = {
            let (request, listeners, open) = (request.clone(), listeners.clone(), open.clone());
            listeners.clone().handler(move |_| {
                match database_of(&open) {
                    // Already failed as blocked; nobody will use this connection.
                    Ok(db) if request.is_settled() => db.close(),
                    Ok(db) => request.succeed(Rc::new(IdbConnection::new(db))),
                    Err(error) => request.fail(error),
                }
                detach_open(&open);
                listeners.release();
            })
        };

        let on_error = {
            let backend = self.clone();
            let name = name.to_string();
            let (request, listeners, open) = (request.clone(), listeners.clone(), open.clone());
            listeners.clone().handler(move |_| {
                let upgrade_failure = upgrade_error.borrow_mut().take();
                let version_error = open
                    .error()
                    .ok()
                    .flatten()
                    .is_some_and(|exception| exception.name() == "VersionError");
                match upgrade_failure {
                    Some(error) => request.fail(error),
                    None if version_error => backend.report_version(&name, version, request.clone()),
                    None => request.fail(request_error(&open)),
                }
                detach_open(&open);
                listeners.release();
            })
        };

        let on_blocked = {
            let (request, name) = (request.clone(), name.to_string());
            listeners.handler(move |_| {
                tracing::warn!(database = %name, "open blocked by another connection");
                request.fail(StorageError::Blocked(name.clone()));
            })
        };

        open.set_onupgradeneeded(Some(&on_upgrade_needed));
        open.set_onsuccess(Some(&on_success));
        open.set_onerror(Some(&on_error));
        open.set_onblocked(Some(&on_blocked));
        request
    }

    fn delete_database(&self, name: &str) -> Request<()> {
        let delete = match self.factory.delete_database(name) {
            Ok(delete) => delete,
            Err(e) => return Request::failed(thrown(e)),
        };
        let request = Request::new();
        let listeners = Listeners::new();

        let on_success = {
            let (request, listeners, delete) = (request.clone(), listeners.clone(), delete.clone());
            listeners.clone().handler(move |_| {
                request.succeed(());
                detach_open(&delete);
                listeners.release();
            })
        };
        let on_error = {
            let (request, listeners, delete) = (request.clone(), listeners.clone(), delete.clone());
            listeners.clone().handler(move |_| {
                request.fail(request_error(&delete));
                detach_open(&delete);
                listeners.release();
            })
        };
        let on_blocked = {
            let (request, name) = (request.clone(), name.to_string());
            listeners.handler(move |_| request.fail(StorageError::Blocked(name.clone())))
        };

        delete.set_onsuccess(Some(&on_success));
        delete.set_onerror(Some(&on_error));
        delete.set_onblocked(Some(&on_blocked));
        request
    }
}

/// An open IndexedDB database.
pub(crate) struct IdbConnection {
    db: IdbDatabase,
    name: String,
    version: u32,
    closed: Cell<bool>,
    version_listener: Listeners,
}

impl IdbConnection {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn new(db: IdbDatabase) -> Self {
        Self {
            name: db.name(),
            version: db.version() as u32,
            db,
            closed: Cell::new(false),
            version_listener: Listeners::new(),
        }
    }
}

impl Connection for IdbConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn object_store_names(&self) -> Vec<String> {
        string_list(&self.db.object_store_names())
    }

    fn transaction(
        &self,
        stores: &[&str],
        mode: TransactionMode,
    ) -> StorageResult<Rc<dyn Transaction>> {
        if self.closed.get() {
            return Err(StorageError::Closed);
        }
        if stores.is_empty() {
            return Err(StorageError::InvalidState(
                "a transaction needs at least one store".to_string(),
            ));
        }
        if mode == TransactionMode::VersionChange {
            return Err(StorageError::InvalidState(
                "version-change transactions only exist during an upgrade".to_string(),
            ));
        }
        let existing = self.object_store_names();
        if let Some(missing) = stores.iter().find(|s| !existing.iter().any(|e| e == *s)) {
            return Err(StorageError::StoreNotFound((*missing).to_string()));
        }

        let scope: Array = stores.iter().map(|s| JsValue::from_str(s)).collect();
        let tx = self
            .db
            .transaction_with_str_sequence_and_mode(&scope, idb_mode(mode))
            .map_err(thrown)?;
        let scope = stores.iter().map(|s| (*s).to_string()).collect();
        Ok(Rc::new(IdbTx::begin(tx, mode, scope)))
    }

    fn close(&self) {
        if !self.closed.replace(true) {
            tracing::debug!(database = %self.name, "closing IndexedDB connection");
            self.db.close();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn on_version_change(&self, mut handler: VersionChangeHandler) {
        self.version_listener.release();
        let listener = self.version_listener.handler(move |event| {
            handler(&version_change(event.unchecked_ref::<IdbVersionChangeEvent>()));
        });
        self.db.set_onversionchange(Some(&listener));
    }
}

impl Drop for IdbConnection {
    fn drop(&mut self) {
        self.db.set_onversionchange(None);
        self.close();
    }
}
