//! One backend request, one transaction, one awaitable result.
//!
//! The backend reports completion through two layers of events: the
//! request's success/error and the transaction's complete/abort/error. The
//! gateway folds them into a single [`EngineFuture`]:
//!
//! - request error settles first with [`EngineError::Storage`];
//! - a request success is only held, and delivered on `complete`;
//! - transaction `abort` or `error` settles with
//!   [`EngineError::TransactionAborted`], overriding a held success.

use crate::error::{EngineError, EngineResult};
use crate::future::EngineFuture;
use std::cell::RefCell;
use std::rc::Rc;
use stowdb_storage::{Connection, ObjectStore, Request, StorageError, Transaction, TransactionMode};

/// Owns the connection and runs single-request transactions against it.
#[derive(Default)]
pub(crate) struct TransactionGateway {
    connection: RefCell<Option<Rc<dyn Connection>>>,
}

impl TransactionGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs the connection operations run against.
    pub(crate) fn attach(&self, connection: Rc<dyn Connection>) {
        *self.connection.borrow_mut() = Some(connection);
    }

    /// Closes and forgets the connection. Idempotent.
    pub(crate) fn close(&self) {
        let connection = self.connection.borrow_mut().take();
        if let Some(connection) = connection {
            connection.close();
        }
    }

    pub(crate) fn connection(&self) -> EngineResult<Rc<dyn Connection>> {
        match self.connection.borrow().as_ref() {
            Some(connection) if !connection.is_closed() => Ok(Rc::clone(connection)),
            _ => Err(EngineError::NotOpen),
        }
    }

    /// Runs `op` against `store` inside a fresh transaction.
    ///
    /// `op` issues exactly one request; its result is delivered once the
    /// transaction completes.
    pub(crate) fn run<T, F>(&self, store: &str, mode: TransactionMode, op: F) -> EngineFuture<T>
    where
        T: 'static,
        F: FnOnce(&dyn ObjectStore) -> Request<T>,
    {
        match self.begin(store, mode) {
            Ok((transaction, object_store)) => {
                let request = op(object_store.as_ref());
                settle_on_completion(transaction, request)
            }
            Err(error) => EngineFuture::ready(Err(error)),
        }
    }

    fn begin(
        &self,
        store: &str,
        mode: TransactionMode,
    ) -> EngineResult<(Rc<dyn Transaction>, Rc<dyn ObjectStore>)> {
        let connection = self.connection()?;
        let transaction = connection
            .transaction(&[store], mode)
            .map_err(request_error)?;
        let object_store = transaction.object_store(store).map_err(request_error)?;
        Ok((transaction, object_store))
    }
}

fn settle_on_completion<T: 'static>(
    transaction: Rc<dyn Transaction>,
    request: Request<T>,
) -> EngineFuture<T> {
    let (settle, future) =
        EngineFuture::channel(|| EngineError::transaction_aborted("transaction dropped"));
    let held: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

    // Request listeners go first so a retained request error wins over the
    // transaction abort it caused.
    let slot = Rc::clone(&held);
    request.on_success(move |value| *slot.borrow_mut() = Some(value));
    let on_request_error = settle.clone();
    request.on_error(move |error| {
        on_request_error.settle(Err(request_error(error)));
    });

    let events = transaction.events();
    let on_complete = settle.clone();
    events.on_complete(move |()| {
        let result = held.borrow_mut().take().ok_or_else(|| {
            EngineError::transaction_aborted("transaction completed without a result")
        });
        on_complete.settle(result);
    });
    let on_error = settle.clone();
    events.on_error(move |error| {
        on_error.settle(Err(aborted(error)));
    });
    events.on_abort(move |error| {
        settle.settle(Err(aborted(error)));
    });

    transaction.commit();
    future
}

fn request_error(error: StorageError) -> EngineError {
    match error {
        StorageError::Closed => EngineError::NotOpen,
        other => EngineError::Storage(other),
    }
}

fn aborted(error: StorageError) -> EngineError {
    match error {
        StorageError::Aborted(reason) => EngineError::transaction_aborted(reason),
        other => EngineError::transaction_aborted(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowdb_codec::{record, Value};
    use stowdb_storage::{Fault, MemoryBackend, StorageBackend, StoreOptions};

    fn open(backend: &MemoryBackend) -> TransactionGateway {
        let request = backend.open(
            "gw",
            1,
            Box::new(|_, upgrade| {
                upgrade.create_object_store(
                    "items",
                    StoreOptions {
                        key_path: "id".to_string(),
                        auto_increment: true,
                    },
                )?;
                Ok(())
            }),
        );
        let gateway = TransactionGateway::new();
        let slot = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        request.on_success(move |connection| *s.borrow_mut() = Some(connection));
        let connection = slot.borrow_mut().take().unwrap();
        gateway.attach(connection);
        gateway
    }

    fn item(title: &str) -> Value {
        Value::Map(record! { "title" => title })
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolves_with_request_result_on_complete() {
        let backend = MemoryBackend::new();
        let gateway = open(&backend);

        let key = gateway
            .run("items", TransactionMode::ReadWrite, |store| store.add(item("a")))
            .await;
        assert_eq!(key, Ok(Value::Integer(1)));
        assert_eq!(backend.record_count("gw", "items"), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn request_error_is_passed_through() {
        let backend = MemoryBackend::new();
        let gateway = open(&backend);
        backend.inject(Fault::FailWrite {
            store: "items".to_string(),
            nth: 1,
            error: StorageError::Backend("disk full".to_string()),
        });

        let result = gateway
            .run("items", TransactionMode::ReadWrite, |store| store.add(item("a")))
            .await;
        assert_eq!(
            result,
            Err(EngineError::Storage(StorageError::Backend("disk full".to_string())))
        );
        assert_eq!(backend.record_count("gw", "items"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn abort_overrides_request_success() {
        let backend = MemoryBackend::new();
        let gateway = open(&backend);
        backend.inject(Fault::AbortCommit {
            store: "items".to_string(),
            error: StorageError::Aborted("quota exceeded".to_string()),
        });

        let result = gateway
            .run("items", TransactionMode::ReadWrite, |store| store.add(item("a")))
            .await;
        assert_eq!(result, Err(EngineError::transaction_aborted("quota exceeded")));
        assert_eq!(backend.record_count("gw", "items"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn no_connection_is_not_open() {
        let gateway = TransactionGateway::new();
        let result = gateway
            .run("items", TransactionMode::ReadOnly, |store| store.get_all())
            .await;
        assert_eq!(result, Err(EngineError::NotOpen));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn closed_connection_is_not_open() {
        let backend = MemoryBackend::new();
        let gateway = open(&backend);
        gateway.close();

        let result = gateway
            .run("items", TransactionMode::ReadOnly, |store| store.get_all())
            .await;
        assert_eq!(result, Err(EngineError::NotOpen));
        assert_eq!(backend.open_connection_count("gw"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_store_is_a_storage_error() {
        let backend = MemoryBackend::new();
        let gateway = open(&backend);
        let result = gateway
            .run("missing", TransactionMode::ReadOnly, |store| store.get_all())
            .await;
        assert_eq!(
            result,
            Err(EngineError::Storage(StorageError::StoreNotFound(
                "missing".to_string()
            )))
        );
    }
}
