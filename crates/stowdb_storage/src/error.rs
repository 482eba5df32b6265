//! Error types for storage operations.

use stowdb_codec::CodecError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a storage backend reports.
///
/// Backends map their native failures onto these variants; the engine
/// wraps them unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A uniqueness or key constraint was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The named object store does not exist or is not in scope.
    #[error("object store not found: {0}")]
    StoreNotFound(String),

    /// An object store with that name already exists.
    #[error("object store already exists: {0}")]
    StoreExists(String),

    /// An index with that name already exists on the store.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// A record key is missing or not a valid key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The operation is not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A write was attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// The requested version is lower than the stored version.
    #[error("requested version {requested} is lower than stored version {stored}")]
    Version {
        /// The version passed to open.
        requested: u32,
        /// The version already stored.
        stored: u32,
    },

    /// Other connections kept the database open during a version change.
    #[error("version change on '{0}' blocked by open connections")]
    Blocked(String),

    /// The transaction was aborted.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    /// The connection is closed.
    #[error("connection is closed")]
    Closed,

    /// A stored record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Any other backend-native failure.
    #[error("backend error: {0}")]
    Backend(String),
}
