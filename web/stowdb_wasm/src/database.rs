//! Database WASM bindings.
//!
//! This module provides the main JavaScript-facing API for StowDB. Every
//! data method returns a `Promise`.

use crate::backend::IndexedDbBackend;
use crate::convert::{records_to_js, to_js};
use crate::descriptor::{predicate_from_js, query_from_js, schema_from_js, update_from_js};
use crate::error::{WasmError, WasmResult};
use js_sys::{Array, Promise};
use std::future::Future;
use std::rc::Rc;
use stowdb_core::{delete_database, Config, Database as CoreDatabase, DatabaseState, Table};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

/// A StowDB database backed by IndexedDB.
///
/// ## Example
///
/// ```javascript
/// const db = await Database.open("app", 1, {
///   todos: {
///     columns: {
///       id: { type: "number", primaryKey: true, autoIncrement: true },
///       title: { type: "string" },
///       completed: { type: "boolean" },
///     },
///   },
/// });
///
/// const id = await db.insert("todos", { title: "write docs", completed: false });
/// const open = await db.select("todos", { where: { completed: false }, limit: 10 });
/// await db.update("todos", { completed: true }, { id });
/// db.close();
/// ```
#[wasm_bindgen]
pub struct Database {
    inner: CoreDatabase,
}

fn promise<F>(future: F) -> Promise
where
    F: Future<Output = WasmResult<JsValue>> + 'static,
{
    future_to_promise(async move { future.await.map_err(JsValue::from) })
}

#[wasm_bindgen]
impl Database {
    /// Opens `name` at `version`, creating the stores `schema` declares.
    ///
    /// Resolves once the database is ready; rejects with the open failure.
    /// A version higher than the stored one upgrades the database: missing
    /// stores are created with their unique indexes, existing stores are
    /// kept as they are.
    #[wasm_bindgen]
    pub async fn open(name: String, version: u32, schema: JsValue) -> Result<Database, JsValue> {
        let schema = schema_from_js(schema)?;
        let backend = IndexedDbBackend::new()?;
        let config = Config::new(name).version(version);
        let inner = CoreDatabase::connect(Rc::new(backend), config, schema)
            .await
            .map_err(WasmError::from)?;
        Ok(Database { inner })
    }

    /// Deletes the database `name` and everything in it.
    #[wasm_bindgen(js_name = deleteDatabase)]
    pub async fn delete_database(name: String) -> Result<(), JsValue> {
        let backend = IndexedDbBackend::new()?;
        delete_database(&backend, &name)
            .await
            .map_err(|e| WasmError::from(e).into())
    }

    fn table(&self, store: &str) -> WasmResult<Table> {
        Ok(self.inner.store(store)?)
    }

    /// Inserts `record` into `store`. Resolves to the record's key.
    #[wasm_bindgen]
    pub fn insert(&self, store: &str, record: JsValue) -> Promise {
        let table = self.table(store);
        let record = crate::convert::record_from_js(&record).map_err(WasmError::from);
        promise(async move {
            let key = table?.insert(record?).await?;
            Ok(to_js(&key)?)
        })
    }

    /// Every record of `store` in key order.
    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self, store: &str) -> Promise {
        let table = self.table(store);
        promise(async move {
            let records = table?.get_all().await?;
            Ok(records_to_js(&records)?.into())
        })
    }

    /// Records of `store` matching `query` (`{ where, orderBy, limit }`).
    #[wasm_bindgen]
    pub fn select(&self, store: &str, query: JsValue) -> Promise {
        let table = self.table(store);
        let query = query_from_js(&query);
        promise(async move {
            let records = table?.select(&query?).await?;
            Ok(records_to_js(&records)?.into())
        })
    }

    /// Merges `patch` into every record matching `where`. Resolves to the
    /// number of records rewritten.
    #[wasm_bindgen]
    pub fn update(&self, store: &str, patch: JsValue, where_clause: JsValue) -> Promise {
        let table = self.table(store);
        let update = update_from_js(&patch, &where_clause);
        promise(async move {
            let changed = table?.update(&update?).await?;
            Ok(JsValue::from(changed as u32))
        })
    }

    /// Deletes every record matching `where`. Resolves to the number of
    /// records removed.
    #[wasm_bindgen]
    pub fn delete(&self, store: &str, where_clause: JsValue) -> Promise {
        let table = self.table(store);
        let predicate = predicate_from_js(&where_clause);
        promise(async move {
            let removed = table?.delete(&predicate?).await?;
            Ok(JsValue::from(removed as u32))
        })
    }

    /// Number of records in `store`.
    #[wasm_bindgen]
    pub fn count(&self, store: &str) -> Promise {
        let table = self.table(store);
        promise(async move {
            let count = table?.count().await?;
            Ok(JsValue::from(count as u32))
        })
    }

    /// Names of the declared stores.
    #[wasm_bindgen(getter, js_name = storeNames)]
    pub fn store_names(&self) -> Array {
        self.inner
            .store_names()
            .into_iter()
            .map(JsValue::from)
            .collect()
    }

    /// Lifecycle state: `"ready"`, `"reloadRequired"`, `"closed"`, ...
    ///
    /// Once another tab opens a newer version this becomes
    /// `"reloadRequired"` and every call rejects with `NotOpenError`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.inner.state() {
            DatabaseState::Unopened => "unopened",
            DatabaseState::Opening => "opening",
            DatabaseState::Ready => "ready",
            DatabaseState::Errored => "errored",
            DatabaseState::ReloadRequired => "reloadRequired",
            DatabaseState::Closed => "closed",
        }
        .to_string()
    }

    /// The database version.
    #[wasm_bindgen(getter)]
    pub fn version(&self) -> u32 {
        self.inner.version()
    }

    /// Closes the database. Pending calls settle; later calls reject.
    #[wasm_bindgen]
    pub fn close(&self) {
        self.inner.close();
    }
}
