use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::render::pixel_buffer::{PixelBuffer, PixelFormat, byte_len};

/// Pool configuration for recycled pixel buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBufferPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained buffers per (w,h,format) bucket.
    pub max_buffers_per_bucket: usize,
}

impl Default for PixelBufferPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 128 * 1024 * 1024,
            max_buffers_per_bucket: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    w: u32,
    h: u32,
    format: PixelFormat,
}

impl BufferKey {
    fn of(buf: &PixelBuffer) -> Self {
        Self {
            w: buf.width,
            h: buf.height,
            format: buf.format,
        }
    }

    fn byte_len(self) -> usize {
        byte_len(self.w, self.h, self.format)
    }
}

/// Allocation and retention counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PixelBufferPoolStats {
    /// Buffers currently retained for reuse.
    pub retained_buffers: usize,
    /// Bytes currently retained for reuse.
    pub retained_bytes: usize,
    /// Fresh allocations performed by `borrow`.
    pub alloc_buffers: u64,
    /// Bytes of fresh allocations.
    pub alloc_bytes: u64,
    /// Buffers reused from the pool.
    pub reused_buffers: u64,
    /// Released buffers dropped because a cap was reached.
    pub dropped_on_release: u64,
}

/// Bounded pool of pixel buffers keyed by `(width, height, format)`.
///
/// Borrowed buffers keep their previous contents; callers clear them before drawing.
#[derive(Debug)]
pub struct PixelBufferPool {
    opts: PixelBufferPoolOpts,
    stats: PixelBufferPoolStats,
    buckets: HashMap<BufferKey, Vec<PixelBuffer>>,
}

impl PixelBufferPool {
    /// Create an empty pool.
    pub fn new(opts: PixelBufferPoolOpts) -> Self {
        Self {
            opts,
            stats: PixelBufferPoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PixelBufferPoolStats {
        self.stats.clone()
    }

    /// Take a buffer of the given shape, reusing a retained one when possible.
    pub fn borrow(&mut self, width: u32, height: u32, format: PixelFormat) -> PixelBuffer {
        let key = BufferKey {
            w: width,
            h: height,
            format,
        };
        if let Some(buf) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            self.stats.reused_buffers = self.stats.reused_buffers.saturating_add(1);
            return buf;
        }

        self.stats.alloc_buffers = self.stats.alloc_buffers.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(key.byte_len() as u64);
        PixelBuffer::new(width, height, format)
    }

    /// Return a buffer for reuse. Dropped when a cap would be exceeded.
    pub fn release(&mut self, buf: PixelBuffer) {
        if self.opts.max_pool_bytes == 0 || self.opts.max_buffers_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let key = BufferKey::of(&buf);
        let bytes = key.byte_len();
        if buf.data.len() != bytes
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(key).or_default();
        if bucket.len() >= self.opts.max_buffers_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(buf);
        self.stats.retained_buffers = self.stats.retained_buffers.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}

/// A pool shared between the frame producer and a writer's output thread.
#[derive(Debug, Clone)]
pub struct SharedPixelBufferPool(Arc<Mutex<PixelBufferPool>>);

impl SharedPixelBufferPool {
    /// Wrap a new pool.
    pub fn new(opts: PixelBufferPoolOpts) -> Self {
        Self(Arc::new(Mutex::new(PixelBufferPool::new(opts))))
    }

    /// See [`PixelBufferPool::borrow`]. Falls back to a fresh allocation if the lock is poisoned.
    pub fn borrow(&self, width: u32, height: u32, format: PixelFormat) -> PixelBuffer {
        match self.0.lock() {
            Ok(mut pool) => pool.borrow(width, height, format),
            Err(_) => PixelBuffer::new(width, height, format),
        }
    }

    /// See [`PixelBufferPool::release`].
    pub fn release(&self, buf: PixelBuffer) {
        if let Ok(mut pool) = self.0.lock() {
            pool.release(buf);
        }
    }

    /// See [`PixelBufferPool::stats`].
    pub fn stats(&self) -> PixelBufferPoolStats {
        self.0
            .lock()
            .map(|pool| pool.stats())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/pool.rs"]
mod tests;
