//! Single-fire completion events.
//!
//! Backends signal completion through callbacks rather than return values.
//! [`Event`] is the one primitive both sides share: the backend fires it at
//! most once and the consumer attaches one listener. A payload fired before
//! a listener is attached is retained and delivered on attach, so the order
//! in which the two sides reach the event does not matter.

use crate::error::StorageError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type Listener<T> = Box<dyn FnOnce(T)>;

struct Slot<T> {
    fired: bool,
    pending: Option<T>,
    listener: Option<Listener<T>>,
}

/// A single-fire event with one listener slot.
pub struct Event<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Event<T> {
    /// Creates an event that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot {
                fired: false,
                pending: None,
                listener: None,
            })),
        }
    }

    /// Fires the event.
    ///
    /// Returns `false` if the event had already fired, in which case the
    /// payload is dropped.
    pub fn fire(&self, payload: T) -> bool {
        let listener = {
            let mut slot = self.slot.borrow_mut();
            if slot.fired {
                return false;
            }
            slot.fired = true;
            match slot.listener.take() {
                Some(listener) => listener,
                None => {
                    slot.pending = Some(payload);
                    return true;
                }
            }
        };
        listener(payload);
        true
    }

    /// Attaches the listener, replacing any previous one.
    ///
    /// If the event already fired and its payload has not been delivered,
    /// the listener runs immediately.
    pub fn listen(&self, listener: impl FnOnce(T) + 'static) {
        let pending = {
            let mut slot = self.slot.borrow_mut();
            match slot.pending.take() {
                Some(payload) => payload,
                None => {
                    if !slot.fired {
                        slot.listener = Some(Box::new(listener));
                    }
                    return;
                }
            }
        };
        listener(pending);
    }

    /// Returns `true` once the event has fired.
    pub fn has_fired(&self) -> bool {
        self.slot.borrow().fired
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("fired", &self.has_fired())
            .finish()
    }
}

/// An outstanding backend request.
///
/// Exactly one of the success or error events fires, at most once.
pub struct Request<T> {
    success: Event<T>,
    error: Event<StorageError>,
    settled: Rc<Cell<bool>>,
}

impl<T> Request<T> {
    /// Creates a pending request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            success: Event::new(),
            error: Event::new(),
            settled: Rc::new(Cell::new(false)),
        }
    }

    /// Creates a request that has already succeeded.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        let request = Self::new();
        request.succeed(value);
        request
    }

    /// Creates a request that has already failed.
    #[must_use]
    pub fn failed(error: StorageError) -> Self {
        let request = Self::new();
        request.fail(error);
        request
    }

    /// Settles the request successfully. Ignored if already settled.
    pub fn succeed(&self, value: T) {
        if !self.settled.replace(true) {
            self.success.fire(value);
        }
    }

    /// Settles the request with an error. Ignored if already settled.
    pub fn fail(&self, error: StorageError) {
        if !self.settled.replace(true) {
            self.error.fire(error);
        }
    }

    /// Attaches the success listener.
    pub fn on_success(&self, listener: impl FnOnce(T) + 'static) {
        self.success.listen(listener);
    }

    /// Attaches the error listener.
    pub fn on_error(&self, listener: impl FnOnce(StorageError) + 'static) {
        self.error.listen(listener);
    }

    /// Returns `true` once the request has settled either way.
    pub fn is_settled(&self) -> bool {
        self.settled.get()
    }
}

impl<T> Default for Request<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            success: self.success.clone(),
            error: self.error.clone(),
            settled: Rc::clone(&self.settled),
        }
    }
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Completion events of one transaction.
///
/// At most one of `complete` and `abort` fires. `error` fires before
/// `abort` when a request failure brought the transaction down.
#[derive(Debug, Clone, Default)]
pub struct TransactionEvents {
    complete: Event<()>,
    abort: Event<StorageError>,
    error: Event<StorageError>,
    finished: Rc<Cell<bool>>,
}

impl TransactionEvents {
    /// Creates events for a live transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the complete listener.
    pub fn on_complete(&self, listener: impl FnOnce(()) + 'static) {
        self.complete.listen(listener);
    }

    /// Attaches the abort listener.
    pub fn on_abort(&self, listener: impl FnOnce(StorageError) + 'static) {
        self.abort.listen(listener);
    }

    /// Attaches the error listener.
    pub fn on_error(&self, listener: impl FnOnce(StorageError) + 'static) {
        self.error.listen(listener);
    }

    /// Returns `true` once the transaction completed or aborted.
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Fires `complete`. Returns `false` if the transaction already finished.
    pub fn fire_complete(&self) -> bool {
        if self.finished.replace(true) {
            return false;
        }
        self.complete.fire(())
    }

    /// Fires `abort`. Returns `false` if the transaction already finished.
    pub fn fire_abort(&self, reason: StorageError) -> bool {
        if self.finished.replace(true) {
            return false;
        }
        self.abort.fire(reason)
    }

    /// Fires `error` then `abort`.
    pub fn fire_error(&self, error: StorageError) -> bool {
        if self.finished.get() {
            return false;
        }
        self.error.fire(error.clone());
        self.fire_abort(error)
    }
}
