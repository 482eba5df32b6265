//! Event handler plumbing shared by the IndexedDB wrappers.

use std::cell::RefCell;
use std::rc::Rc;
use stowdb_storage::StorageError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::DomException;

type Handler = Closure<dyn FnMut(web_sys::Event)>;

/// Handlers for one IndexedDB request or transaction.
///
/// Every handler holds a clone of its `Listeners`, so the set keeps itself
/// alive until one of them calls [`Listeners::release`]. IndexedDB fires
/// exactly one terminal event per request and per transaction, which is
/// where `release` is called.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    handlers: Rc<RefCell<Vec<Handler>>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wraps `handler` and returns the function to install on the target.
    pub(crate) fn handler(&self, handler: impl FnMut(web_sys::Event) + 'static) -> js_sys::Function {
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
        let function = closure.as_ref().unchecked_ref::<js_sys::Function>().clone();
        self.handlers.borrow_mut().push(closure);
        function
    }

    /// Drops every handler.
    ///
    /// Safe to call from inside one of them: wasm-bindgen defers freeing a
    /// closure that is still running.
    pub(crate) fn release(&self) {
        let handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        drop(handlers);
    }
}

/// Maps a DOM exception raised by IndexedDB onto a storage error.
pub(crate) fn dom_error(exception: &DomException) -> StorageError {
    let message = exception.message();
    match exception.name().as_str() {
        "ConstraintError" => StorageError::Constraint(message),
        "DataError" => StorageError::InvalidKey(message),
        "ReadOnlyError" => StorageError::ReadOnly,
        "NotFoundError" => StorageError::StoreNotFound(message),
        "InvalidStateError" | "TransactionInactiveError" => StorageError::InvalidState(message),
        "AbortError" => StorageError::Aborted(message),
        other => StorageError::Backend(format!("{other}: {message}")),
    }
}

/// Maps a thrown JavaScript value onto a storage error.
pub(crate) fn thrown(error: JsValue) -> StorageError {
    match error.dyn_into::<DomException>() {
        Ok(exception) => dom_error(&exception),
        Err(other) => crate::convert::js_failure("IndexedDB call threw", &other),
    }
}

/// The error held by a failed request, or a generic one if it has none.
pub(crate) fn request_error(request: &web_sys::IdbRequest) -> StorageError {
    match request.error() {
        Ok(Some(exception)) => dom_error(&exception),
        Ok(None) => StorageError::Backend("request failed without an error".to_string()),
        Err(e) => thrown(e),
    }
}
