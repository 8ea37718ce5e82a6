//! Image buffers and their hardware-side accounting.
//!
//! Hardware keeps only a few still buffers in flight. Each buffer delivered
//! to the engine holds a [`BufferLease`] on the session's [`BufferPool`];
//! dropping or releasing the buffer returns the slot. A leaked buffer
//! eventually starves the camera, so every path that discards a buffer goes
//! through `release` or drop.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashcam_camera_core::PixelFormat;
use tokio::sync::mpsc;

/// Counts the buffers a session has handed out and not yet had back.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    capacity: usize,
    outstanding: AtomicUsize,
    released: AtomicU64,
}

impl BufferPool {
    /// Create a pool allowing `capacity` buffers in flight.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                outstanding: AtomicUsize::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Take a slot, or `None` if all slots are in flight.
    pub fn try_lease(&self) -> Option<BufferLease> {
        self.inner
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.inner.capacity).then_some(n + 1)
            })
            .ok()
            .map(|_| BufferLease {
                pool: self.inner.clone(),
            })
    }

    /// Buffers currently held outside the pool.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Total buffers returned to the pool.
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

/// One slot of a [`BufferPool`], returned on drop.
#[derive(Debug)]
pub struct BufferLease {
    pool: Arc<PoolInner>,
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.pool.released.fetch_add(1, Ordering::AcqRel);
    }
}

/// An image buffer delivered by the camera, exclusively owned by its holder.
pub struct QueuedBuffer {
    timestamp_ns: i64,
    format: PixelFormat,
    data: Vec<u8>,
    lease: Option<BufferLease>,
}

impl QueuedBuffer {
    pub fn new(
        timestamp_ns: i64,
        format: PixelFormat,
        data: Vec<u8>,
        lease: Option<BufferLease>,
    ) -> Self {
        Self {
            timestamp_ns,
            format,
            data,
            lease,
        }
    }

    /// Sensor timestamp of the frame in nanoseconds.
    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return the buffer to the camera.
    pub fn release(self) {
        drop(self);
    }

    /// Take the pixel data, returning the hardware slot immediately.
    pub fn into_data(mut self) -> Vec<u8> {
        self.lease.take();
        std::mem::take(&mut self.data)
    }
}

impl std::fmt::Debug for QueuedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedBuffer")
            .field("timestamp_ns", &self.timestamp_ns)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .field("leased", &self.lease.is_some())
            .finish()
    }
}

/// Receiving end registered with a session for buffer-available
/// notifications. Delivery never blocks the camera's callback context.
#[derive(Debug, Clone)]
pub struct BufferListener {
    tx: mpsc::Sender<QueuedBuffer>,
}

impl BufferListener {
    pub fn new(tx: mpsc::Sender<QueuedBuffer>) -> Self {
        Self { tx }
    }

    /// Hand a buffer to the listener. On failure the buffer comes back to
    /// the caller: `Full` means the queue is at capacity, `Closed` means
    /// the consumer is gone.
    pub fn deliver(
        &self,
        buffer: QueuedBuffer,
    ) -> Result<(), mpsc::error::TrySendError<QueuedBuffer>> {
        self.tx.try_send(buffer)
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
