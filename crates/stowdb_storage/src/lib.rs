//! # StowDB Storage
//!
//! The storage backend contract StowDB is written against, and an
//! in-memory implementation of it.
//!
//! The contract follows the shape of browser IndexedDB: every operation
//! returns a [`Request`] whose success or error event fires later, and
//! transactions report `complete`, `abort` and `error` through
//! [`TransactionEvents`]. Backends own all record storage; StowDB never
//! sees bytes, only [`stowdb_codec::Value`] records.
//!
//! ## Design Principles
//!
//! - Single-threaded: handles are `Rc`, callbacks are not `Send`
//! - Events fire at most once and retain their payload until observed
//! - A failed request takes its transaction down with it
//! - Schema changes happen only inside an upgrade
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For tests, demos and ephemeral databases
//!
//! ## Example
//!
//! ```rust
//! use stowdb_codec::{record, Value};
//! use stowdb_storage::{
//!     Connection, MemoryBackend, ObjectStore, StorageBackend, StoreOptions, Transaction,
//!     TransactionMode, UpgradeTransaction,
//! };
//!
//! let backend = MemoryBackend::new();
//! backend.open("notes", 1, Box::new(|_, upgrade| {
//!     upgrade.create_object_store("notes", StoreOptions {
//!         key_path: "id".to_string(),
//!         auto_increment: true,
//!     })?;
//!     Ok(())
//! }))
//! .on_success(|connection| {
//!     let tx = connection.transaction(&["notes"], TransactionMode::ReadWrite).unwrap();
//!     let store = tx.object_store("notes").unwrap();
//!     store.add(Value::Map(record! { "text" => "hello" }));
//!     tx.commit();
//! });
//!
//! assert_eq!(backend.record_count("notes", "notes"), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod event;
mod key;
mod memory;

pub use backend::{
    Connection, IndexOptions, ObjectStore, StorageBackend, StoreOptions, Transaction,
    TransactionMode, UpgradeHandler, UpgradeTransaction, VersionChange, VersionChangeHandler,
};
pub use error::{StorageError, StorageResult};
pub use event::{Event, Request, TransactionEvents};
pub use key::Key;
pub use memory::{Fault, MemoryBackend};
