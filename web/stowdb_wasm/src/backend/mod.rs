//! Web storage backend.
//!
//! [`IndexedDbBackend`] implements the StowDB backend contract over the
//! browser's IndexedDB, the storage the contract was modelled on.

mod indexeddb;
mod listeners;
mod transaction;

pub use indexeddb::IndexedDbBackend;

/// Check if IndexedDB is available.
pub fn is_indexeddb_available() -> bool {
    IndexedDbBackend::is_available()
}
