//! Buffer reuse pool.
//!
//! A [`BufferPool`] is a bounded free list of sample vectors. [`BufferPool::get`]
//! hands out a [`PooledBuf`] guard which owns its vector exclusively; when the
//! guard is dropped, on every exit path including errors and unwinding, the
//! vector is cleared and goes back to the pool it came from. If the free list
//! is already full the vector is simply freed.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::ArrayQueue;

struct Shared<T> {
    free: ArrayQueue<Vec<T>>,
    block_capacity: usize,
    allocated: AtomicUsize,
}

/// Bounded pool of reusable sample buffers of one type and size.
pub struct BufferPool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BufferPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BufferPool<T> {
    /// Creates an empty pool keeping at most `max_free` idle buffers, each
    /// allocated with room for `block_capacity` samples.
    pub fn new(block_capacity: usize, max_free: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                free: ArrayQueue::new(max_free.max(1)),
                block_capacity,
                allocated: AtomicUsize::new(0),
            }),
        }
    }

    /// Takes an idle buffer, or allocates one if none is available.
    /// The returned buffer is empty.
    pub fn get(&self) -> PooledBuf<T> {
        let buf = self.shared.free.pop().unwrap_or_else(|| {
            self.shared.allocated.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(self.shared.block_capacity)
        });
        PooledBuf {
            buf,
            pool: Arc::clone(&self.shared),
        }
    }

    /// Total number of buffers this pool ever allocated.
    pub fn allocated(&self) -> usize {
        self.shared.allocated.load(Ordering::Relaxed)
    }

    /// Number of idle buffers currently in the free list.
    pub fn idle(&self) -> usize {
        self.shared.free.len()
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Dereferences to `Vec<T>`. Moving the guard moves ownership of the buffer;
/// dropping it returns the buffer to its pool.
pub struct PooledBuf<T> {
    buf: Vec<T>,
    pool: Arc<Shared<T>>,
}

impl<T> Deref for PooledBuf<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.buf
    }
}

impl<T> DerefMut for PooledBuf<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.buf
    }
}

impl<T> Drop for PooledBuf<T> {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        // A full free list means the buffer is surplus: let it go.
        let _ = self.pool.free.push(buf);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for PooledBuf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.buf.fmt(f)
    }
}
