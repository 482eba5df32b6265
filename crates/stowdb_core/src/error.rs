//! Error types for the StowDB engine.

use stowdb_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors the engine reports.
///
/// `Clone` so one readiness outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The schema is malformed: a store without exactly one primary key,
    /// auto-increment misuse, or a reference to an unknown column.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// What is wrong.
        message: String,
    },

    /// The database is not ready: still opening, failed to open, closed,
    /// or invalidated by a version change.
    #[error("database is not open")]
    NotOpen,

    /// The backend aborted the transaction.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason reported by the backend.
        reason: String,
    },

    /// The backend reported a failure; passed through unchanged.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The store is not part of the schema.
    #[error("unknown store: {name}")]
    UnknownStore {
        /// Name of the store.
        name: String,
    },

    /// A record does not fit its store's columns.
    #[error("invalid record for '{store}': {message}")]
    InvalidRecord {
        /// Target store.
        store: String,
        /// What is wrong.
        message: String,
    },
}

impl EngineError {
    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an unknown store error.
    pub fn unknown_store(name: impl Into<String>) -> Self {
        Self::UnknownStore { name: name.into() }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            store: store.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_pass_through() {
        let error: EngineError = StorageError::Constraint("dup".to_string()).into();
        assert_eq!(
            error,
            EngineError::Storage(StorageError::Constraint("dup".to_string()))
        );
        assert_eq!(error.to_string(), "storage error: constraint violated: dup");
    }

    #[test]
    fn constructors() {
        assert_eq!(
            EngineError::invalid_schema("no key").to_string(),
            "invalid schema: no key"
        );
        assert!(matches!(
            EngineError::transaction_aborted("quota"),
            EngineError::TransactionAborted { reason } if reason == "quota"
        ));
    }
}
