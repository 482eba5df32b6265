//! Database lifecycle and the single-assignment readiness signal.

use crate::error::{EngineError, EngineResult};
use crate::future::{EngineFuture, Settle};
use std::cell::RefCell;
use std::rc::Rc;

/// Lifecycle of a database handle.
///
/// `Unopened -> Opening -> Ready | Errored`. A ready handle moves to
/// `ReloadRequired` when another open requests a newer version, or to
/// `Closed` when closed explicitly. `Errored`, `ReloadRequired` and
/// `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseState {
    /// `open` has not been called.
    Unopened,
    /// Waiting for the backend.
    Opening,
    /// Stores exist and operations are accepted.
    Ready,
    /// Opening failed; the handle is unusable.
    Errored,
    /// A newer version was requested elsewhere; discard and recreate.
    ReloadRequired,
    /// Closed by the owner.
    Closed,
}

impl DatabaseState {
    /// Whether the readiness outcome is decided.
    pub fn is_settled(self) -> bool {
        !matches!(self, DatabaseState::Unopened | DatabaseState::Opening)
    }
}

struct Inner {
    state: DatabaseState,
    outcome: Option<EngineResult<()>>,
    waiters: Vec<Settle<()>>,
}

/// Readiness of one database handle.
///
/// The outcome is assigned once; every waiter, early or late, sees the
/// same result.
#[derive(Clone)]
pub(crate) struct Readiness {
    inner: Rc<RefCell<Inner>>,
}

impl Readiness {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: DatabaseState::Unopened,
                outcome: None,
                waiters: Vec::new(),
            })),
        }
    }

    pub(crate) fn state(&self) -> DatabaseState {
        self.inner.borrow().state
    }

    /// Moves `Unopened` to `Opening`. Returns `false` from any other state.
    pub(crate) fn begin(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.state != DatabaseState::Unopened {
            return false;
        }
        inner.state = DatabaseState::Opening;
        true
    }

    pub(crate) fn resolve(&self) -> bool {
        self.settle(Ok(()))
    }

    pub(crate) fn reject(&self, error: EngineError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: EngineResult<()>) -> bool {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return false;
            }
            inner.state = if outcome.is_ok() {
                DatabaseState::Ready
            } else {
                DatabaseState::Errored
            };
            inner.outcome = Some(outcome.clone());
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            waiter.settle(outcome.clone());
        }
        true
    }

    /// Leaves `Ready` for a terminal state. Returns `false` if not ready.
    pub(crate) fn invalidate(&self, state: DatabaseState) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.state != DatabaseState::Ready {
            return false;
        }
        inner.state = state;
        true
    }

    /// Waits for the outcome.
    pub(crate) fn wait(&self) -> EngineFuture<()> {
        let mut inner = self.inner.borrow_mut();
        if let Some(outcome) = &inner.outcome {
            return EngineFuture::ready(outcome.clone());
        }
        let (settle, future) = EngineFuture::channel(|| EngineError::NotOpen);
        inner.waiters.push(settle);
        future
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn waiters_before_and_after_see_same_outcome() {
        let readiness = Readiness::new();
        assert!(readiness.begin());
        let early = readiness.wait();

        assert!(readiness.resolve());
        assert_eq!(early.await, Ok(()));
        assert_eq!(readiness.wait().await, Ok(()));
        assert_eq!(readiness.state(), DatabaseState::Ready);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn outcome_is_assigned_once() {
        let readiness = Readiness::new();
        readiness.begin();
        assert!(readiness.reject(EngineError::invalid_schema("bad")));
        assert!(!readiness.resolve());

        assert_eq!(readiness.state(), DatabaseState::Errored);
        assert!(matches!(
            readiness.wait().await,
            Err(EngineError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn begin_only_from_unopened() {
        let readiness = Readiness::new();
        assert!(readiness.begin());
        assert!(!readiness.begin());
    }

    #[test]
    fn invalidate_only_from_ready() {
        let readiness = Readiness::new();
        readiness.begin();
        assert!(!readiness.invalidate(DatabaseState::Closed));
        readiness.resolve();
        assert!(readiness.invalidate(DatabaseState::ReloadRequired));
        assert_eq!(readiness.state(), DatabaseState::ReloadRequired);
        assert!(!readiness.invalidate(DatabaseState::Closed));
    }
}
