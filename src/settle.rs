//! One-shot settlement: the promise half of every bridge call.
//!
//! [`Settlement`] is the writable side, cloned into whatever needs to settle
//! the call (the executor, a callback adapter). The first `resolve`/`reject`
//! wins; later ones are no-ops. [`Pending`] is the future the caller awaits.

use crate::error::{BridgeError, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Creates a connected settlement/pending pair.
pub fn channel<T>() -> (Settlement<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Settlement {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        Pending { rx },
    )
}

/// Write side of a one-shot result.
pub struct Settlement<T> {
    slot: Arc<Mutex<Option<oneshot::Sender<Result<T>>>>>,
}

impl<T> Clone for Settlement<T> {
    fn clone(&self) -> Self {
        Settlement {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Settlement<T> {
    /// Settles with `outcome`. Returns `false` if already settled.
    pub fn settle(&self, outcome: Result<T>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            // A dropped receiver still counts as settled: nobody can observe
            // a second outcome either way.
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, err: BridgeError) -> bool {
        self.settle(Err(err))
    }

    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Future of a bridge call's single outcome.
///
/// Resolves to `Unexpected` if every [`Settlement`] clone is dropped without
/// settling, so a lost callback cannot leave the caller waiting forever.
#[must_use = "a Pending does nothing unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// An already-settled pending.
    pub fn ready(outcome: Result<T>) -> Self {
        let (settlement, pending) = channel();
        settlement.settle(outcome);
        pending
    }

    /// Non-blocking check, mostly useful in tests.
    pub fn try_outcome(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(dropped())),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn dropped() -> BridgeError {
    BridgeError::unexpected("operation was dropped before it settled")
}
