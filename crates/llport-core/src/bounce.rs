//! Bounce buffers for ciphertext.
//!
//! Writers encrypt into a bounce buffer so the plaintext page is never modified
//! in place. Allocation never blocks: when the pool's capacity is used up,
//! [`BouncePool::alloc`] fails immediately and the caller aborts.
//!
//! Each [`BounceBuffer`] is a scope guard. Its slot goes back to the pool when
//! it is dropped, so every exit path of a caller releases it exactly once.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use thiserror::Error;
use tracing::trace;

/// Default number of bounce buffers that may be outstanding at once.
pub const DEFAULT_BOUNCE_CAPACITY: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BounceError {
    /// Every slot is in use.
    #[error("Bounce pool exhausted ({capacity} buffers outstanding)")]
    Exhausted { capacity: usize },
}

#[derive(Debug)]
struct PoolState {
    capacity: usize,
    outstanding: AtomicUsize,
    allocated: AtomicU64,
    released: AtomicU64,
}

/// Pool handing out fixed-size scratch buffers.
///
/// Buffers are freshly allocated for each caller and never shared; the pool
/// only bounds how many exist at once.
#[derive(Debug, Clone)]
pub struct BouncePool {
    buffer_size: usize,
    state: Arc<PoolState>,
}

impl BouncePool {
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            buffer_size,
            state: Arc::new(PoolState {
                capacity,
                outstanding: AtomicUsize::new(0),
                allocated: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Take a zeroed buffer without blocking.
    pub fn alloc(&self) -> Result<BounceBuffer, BounceError> {
        let capacity = self.state.capacity;
        self.state
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < capacity).then_some(current + 1)
            })
            .map_err(|_| BounceError::Exhausted { capacity })?;

        self.state.allocated.fetch_add(1, Ordering::Relaxed);
        trace!(size = self.buffer_size, "bounce buffer allocated");

        Ok(BounceBuffer {
            data: vec![0u8; self.buffer_size],
            state: Arc::clone(&self.state),
        })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Buffers currently handed out.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::Acquire)
    }

    /// Total buffers ever handed out.
    pub fn allocated(&self) -> u64 {
        self.state.allocated.load(Ordering::Relaxed)
    }

    /// Total buffers ever returned.
    pub fn released(&self) -> u64 {
        self.state.released.load(Ordering::Relaxed)
    }
}

/// A scratch buffer borrowed from a [`BouncePool`].
#[derive(Debug)]
pub struct BounceBuffer {
    data: Vec<u8>,
    state: Arc<PoolState>,
}

impl Deref for BounceBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for BounceBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for BounceBuffer {
    fn drop(&mut self) {
        self.state.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.state.released.fetch_add(1, Ordering::Relaxed);
    }
}
