// crates/scrollback-core/src/frame_pool.rs
//
// Fixed-size pool of raw-frame byte buffers. Rent/return under a mutex;
// allocation always happens after the lock is released so producers
// never block each other on malloc.

use std::sync::Mutex;

/// One frame-sized byte buffer. A thin newtype so `return_buf` can
/// enforce the exact-length contract without the caller juggling
/// `Vec<u8>` directly.
pub type Buffer = Vec<u8>;

pub struct FramePool {
    frame_size: usize,
    max_pool_size: usize,
    free: Mutex<Vec<Buffer>>,
}

impl FramePool {
    pub fn new(frame_size: usize, max_pool_size: usize) -> Self {
        Self {
            frame_size,
            max_pool_size,
            free: Mutex::new(Vec::with_capacity(max_pool_size.min(64))),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Preallocate up to `min(n, max_pool_size)` buffers.
    pub fn prewarm(&self, n: usize) {
        let target = n.min(self.max_pool_size);
        let mut free = self.free.lock().unwrap();
        while free.len() < target {
            free.push(vec![0u8; self.frame_size]);
        }
    }

    /// Returns a buffer of exactly `frame_size` bytes, from the pool if
    /// one is available, freshly allocated otherwise. The lock is
    /// released before any allocation happens.
    pub fn rent(&self) -> Buffer {
        let existing = {
            let mut free = self.free.lock().unwrap();
            free.pop()
        };
        existing.unwrap_or_else(|| vec![0u8; self.frame_size])
    }

    /// Returns `buf` to the pool if it is the right size and the pool
    /// has room; otherwise the buffer is dropped.
    pub fn return_buf(&self, buf: Buffer) {
        if buf.len() != self.frame_size {
            return;
        }
        let mut free = self.free.lock().unwrap();
        if free.len() < self.max_pool_size {
            free.push(buf);
        }
        // else: dropped on scope exit, releasing its allocation.
    }

    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rent_returns_exact_size() {
        let pool = FramePool::new(1024, 4);
        let buf = pool.rent();
        assert_eq!(buf.len(), 1024);
    }

    #[test]
    fn returned_buffer_is_reused() {
        let pool = FramePool::new(64, 4);
        let buf = pool.rent();
        pool.return_buf(buf);
        assert_eq!(pool.available(), 1);
        let _buf2 = pool.rent();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn wrong_size_buffer_is_dropped_not_pooled() {
        let pool = FramePool::new(64, 4);
        pool.return_buf(vec![0u8; 32]);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn pool_caps_at_max_size() {
        let pool = FramePool::new(16, 2);
        pool.return_buf(vec![0u8; 16]);
        pool.return_buf(vec![0u8; 16]);
        pool.return_buf(vec![0u8; 16]);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn prewarm_respects_cap() {
        let pool = FramePool::new(8, 3);
        pool.prewarm(10);
        assert_eq!(pool.available(), 3);
    }
}
