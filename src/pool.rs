//! Reusable byte-buffer pool for command serialization.
//!
//! Commands are short-lived byte sequences built once per call. The pool
//! keeps a bounded free list of pre-sized buffers so serialization does not
//! reallocate on the hot path; on a miss a fresh buffer is allocated.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Bounded free-list of reusable `Vec<u8>` buffers.
///
/// Checkout never blocks: an empty free list allocates a new buffer with the
/// configured capacity. Returned buffers above the idle bound are discarded.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool keeping at most `max_idle` buffers, each seeded with
    /// `buffer_capacity` bytes of capacity.
    #[must_use]
    pub fn new(max_idle: usize, buffer_capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_idle)),
                buffer_capacity,
                max_idle,
            }),
        }
    }

    /// Check out a buffer, reusing an idle one when available.
    #[must_use]
    pub fn get(&self) -> PooledBuffer {
        let reused = self
            .inner
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop());

        let buf = reused.unwrap_or_else(|| Vec::with_capacity(self.inner.buffer_capacity));

        PooledBuffer {
            buf,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of buffers currently sitting idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.inner.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}

/// Checkout guard for a pooled buffer.
///
/// Dereferences to `Vec<u8>`. The buffer goes back to the pool when the
/// guard drops, on every exit path, so a serialized command can travel over
/// the request queue and still be recycled after the transport writes it.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();

        if let Ok(mut free) = self.pool.free.lock() {
            if free.len() < self.pool.max_idle {
                free.push(buf);
            }
        }
    }
}
