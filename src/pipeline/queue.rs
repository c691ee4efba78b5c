//! Bounded handoff queues between pipeline stages.
//!
//! A queue is a `crossbeam` bounded channel of pooled buffers with one
//! producing stage ([`Outlet`]) and one consuming stage ([`Inlet`]). Dropping
//! the outlet closes the queue; the consumer drains what is left and then
//! observes the end of the stream. A [`CancelToken`] shared by all stages
//! tells a consumer whether that end is a clean close or a shutdown caused by
//! a failing sibling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::{self, Receiver, Sender};

use super::pool::PooledBuf;
use crate::error::{Error, Result};

/// Pipeline-wide cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Creates a queue holding at most `depth` blocks in transit.
pub fn bounded<T>(depth: usize, cancel: &CancelToken) -> (Outlet<T>, Inlet<T>) {
    let (tx, rx) = channel::bounded(depth);
    (
        Outlet {
            tx,
            cancel: cancel.clone(),
        },
        Inlet {
            rx,
            cancel: cancel.clone(),
        },
    )
}

/// Producing end of a queue.
pub struct Outlet<T> {
    tx: Sender<PooledBuf<T>>,
    cancel: CancelToken,
}

impl<T> Outlet<T> {
    /// Hands a buffer to the consumer, blocking while the queue is full.
    ///
    /// Fails with [`Error::Cancelled`] once the pipeline is cancelled or the
    /// consumer has gone away. The buffer then goes straight back to its pool.
    pub fn push(&self, stage: &'static str, buf: PooledBuf<T>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { stage });
        }
        self.tx.send(buf).map_err(|_| {
            self.cancel.cancel();
            Error::Cancelled { stage }
        })
    }

    /// Blocks currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Consuming end of a queue.
pub struct Inlet<T> {
    rx: Receiver<PooledBuf<T>>,
    cancel: CancelToken,
}

impl<T> Inlet<T> {
    /// Takes the next buffer, blocking while the queue is empty.
    ///
    /// Returns `Ok(None)` once the producer closed the queue cleanly and
    /// every block has been consumed, or [`Error::Cancelled`] once the
    /// pipeline is shutting down.
    pub fn pop(&self, stage: &'static str) -> Result<Option<PooledBuf<T>>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { stage });
        }
        match self.rx.recv() {
            Ok(buf) => Ok(Some(buf)),
            Err(_) if self.cancel.is_cancelled() => Err(Error::Cancelled { stage }),
            Err(_) => Ok(None),
        }
    }

    /// Blocks currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
