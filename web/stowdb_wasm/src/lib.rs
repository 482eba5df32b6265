//! # StowDB WASM
//!
//! WebAssembly bindings for StowDB over the browser's IndexedDB.
//!
//! This crate provides:
//! - [`IndexedDbBackend`], the StowDB backend contract implemented with
//!   `web-sys` IndexedDB handles, usable from Rust on `wasm32`
//! - [`Database`], a JavaScript-friendly API via wasm-bindgen that takes
//!   schemas and queries as plain objects
//!
//! ## Usage
//!
//! ```javascript
//! import init, { Database } from 'stowdb_wasm';
//!
//! async function main() {
//!     await init();
//!
//!     const db = await Database.open("notes", 1, {
//!         notes: {
//!             columns: {
//!                 id: { type: "number", primaryKey: true, autoIncrement: true },
//!                 text: { type: "string" },
//!                 createdAt: { type: "date" },
//!             },
//!         },
//!     });
//!
//!     await db.insert("notes", { text: "hello", createdAt: new Date() });
//!     const latest = await db.select("notes", { orderBy: [["createdAt", "desc"]], limit: 5 });
//!     console.log(latest);
//!
//!     db.close();
//! }
//! ```
//!
//! ## Version changes
//!
//! When another tab opens the same database at a newer version, this
//! handle closes its connection so the upgrade can proceed, and its
//! `state` becomes `"reloadRequired"`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod convert;
mod database;
mod descriptor;
mod error;

pub use backend::{is_indexeddb_available, IndexedDbBackend};
pub use convert::{from_js, record_from_js, records_to_js, to_js};
pub use database::Database;
pub use descriptor::{predicate_from_js, query_from_js, schema_from_js, update_from_js};
pub use error::{WasmError, WasmResult};

use wasm_bindgen::prelude::*;

/// Initialize the WASM module.
///
/// This sets up panic hooks for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Whether IndexedDB is usable in the current context.
#[wasm_bindgen(js_name = isSupported)]
pub fn is_supported() -> bool {
    is_indexeddb_available()
}
