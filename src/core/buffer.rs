//! Bounded pool of reusable read buffers
//! Keeps per-receive allocations off the hot path while capping retained memory

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// A bounded pool of byte buffers sized for the configured maximum message size.
///
/// Buffers are handed out for the duration of one receive and returned
/// (cleared) when the [`PooledBuffer`] is dropped, on every exit path
/// including timeouts and errors.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_pooled: usize,
}

impl BufferPool {
    /// Create a pool of buffers with `buffer_size` reserved capacity each,
    /// retaining at most `max_pooled` idle buffers.
    pub fn new(buffer_size: usize, max_pooled: usize) -> Arc<Self> {
        Arc::new(Self {
            buffers: Mutex::new(Vec::new()),
            buffer_size,
            max_pooled,
        })
    }

    /// Take a cleared buffer from the pool, allocating a fresh one if empty
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let storage = self
            .buffers
            .lock()
            .map(|mut pool| pool.pop())
            .unwrap_or(None)
            .unwrap_or_else(|| Vec::with_capacity(self.buffer_size));
        PooledBuffer {
            storage,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers currently retained
    pub fn idle_count(&self) -> usize {
        self.buffers.lock().map(|pool| pool.len()).unwrap_or(0)
    }

    fn release(&self, mut storage: Vec<u8>) {
        storage.clear();
        if let Ok(mut pool) = self.buffers.lock() {
            if pool.len() < self.max_pooled {
                pool.push(storage);
            }
        }
    }
}

/// A buffer borrowed from a [`BufferPool`]; cleared and returned on drop
pub struct PooledBuffer {
    storage: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Copy the accumulated bytes out, leaving the buffer to return to the pool
    pub fn to_vec(&self) -> Vec<u8> {
        self.storage.clone()
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.storage
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.storage
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let storage = std::mem::take(&mut self.storage);
        self.pool.release(storage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_to_pool_on_drop() {
        let pool = BufferPool::new(128, 4);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"payload");
            assert_eq!(buf.len(), 7);
        }
        assert_eq!(pool.idle_count(), 1);

        // Reacquired buffer must come back cleared
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(16, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        drop(a);
        drop(b);
        drop(c);
        assert_eq!(pool.idle_count(), 2);
    }
}
