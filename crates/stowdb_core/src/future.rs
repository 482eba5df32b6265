//! Single-resolution futures fed by backend callbacks.

use crate::error::{EngineError, EngineResult};
use futures_channel::oneshot;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// The settling side of an [`EngineFuture`].
///
/// Clones share one sender; the first [`Settle::settle`] wins and every
/// later call is ignored.
pub(crate) struct Settle<T> {
    sender: Rc<RefCell<Option<oneshot::Sender<EngineResult<T>>>>>,
}

impl<T> Settle<T> {
    /// Delivers `result`. Returns `false` if already settled.
    pub(crate) fn settle(&self, result: EngineResult<T>) -> bool {
        match self.sender.borrow_mut().take() {
            Some(sender) => {
                // The receiver may be gone; the outcome is then unobserved.
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }
}

impl<T> Clone for Settle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Rc::clone(&self.sender),
        }
    }
}

enum State<T> {
    Done(Option<EngineResult<T>>),
    Waiting {
        receiver: oneshot::Receiver<EngineResult<T>>,
        dropped: fn() -> EngineError,
    },
}

/// A result the backend delivers later through callbacks.
///
/// Resolves exactly once. If every settling side is dropped without
/// settling, the future resolves with the `dropped` error it was created
/// with.
#[must_use = "futures do nothing unless awaited"]
pub struct EngineFuture<T> {
    state: State<T>,
}

impl<T> EngineFuture<T> {
    /// A future that is already resolved.
    pub(crate) fn ready(result: EngineResult<T>) -> Self {
        Self {
            state: State::Done(Some(result)),
        }
    }

    /// A pending future and its settling side.
    pub(crate) fn channel(dropped: fn() -> EngineError) -> (Settle<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        let settle = Settle {
            sender: Rc::new(RefCell::new(Some(sender))),
        };
        let future = Self {
            state: State::Waiting { receiver, dropped },
        };
        (settle, future)
    }
}

// No field is structurally pinned.
impl<T> Unpin for EngineFuture<T> {}

impl<T> Future for EngineFuture<T> {
    type Output = EngineResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let result = match &mut this.state {
            State::Done(result) => {
                return Poll::Ready(
                    result
                        .take()
                        .unwrap_or_else(|| Err(EngineError::transaction_aborted("future polled after completion"))),
                )
            }
            State::Waiting { receiver, dropped } => match Pin::new(receiver).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(result)) => result,
                Poll::Ready(Err(oneshot::Canceled)) => Err(dropped()),
            },
        };
        this.state = State::Done(None);
        Poll::Ready(result)
    }
}

impl<T> fmt::Debug for EngineFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Done(Some(_)) => "ready",
            State::Done(None) => "consumed",
            State::Waiting { .. } => "waiting",
        };
        f.debug_struct("EngineFuture").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn first_settle_wins() {
        let (settle, future) = EngineFuture::channel(|| EngineError::NotOpen);
        let other = settle.clone();

        assert!(settle.settle(Ok(1)));
        assert!(!other.settle(Err(EngineError::NotOpen)));
        assert_eq!(future.await, Ok(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropped_settle_resolves_with_fallback() {
        let (settle, future) = EngineFuture::<()>::channel(|| EngineError::NotOpen);
        drop(settle);
        assert_eq!(future.await, Err(EngineError::NotOpen));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn ready_future_resolves_immediately() {
        let future = EngineFuture::ready(Ok("done"));
        assert_eq!(future.await, Ok("done"));
    }
}
