//! Completed read I/O handed to the decrypt pipeline.
//!
//! A [`ReadIo`] owns its segments, the cipher of the file being read and an
//! optional release hook standing in for the storage layer's reference on the
//! request. The hook runs when the `ReadIo` is dropped, so whoever consumes the
//! I/O last releases it, exactly once.

use std::fmt;
use std::sync::Arc;

use crate::crypto::BlockCipher;
use crate::device::IoStatus;
use crate::page::Page;

/// One contiguous region of a page covered by the I/O.
#[derive(Debug, Clone)]
pub struct IoSegment {
    pub page: Arc<Page>,
    /// Byte offset of the region within the page.
    pub offset: usize,
    /// Length of the region in bytes.
    pub len: usize,
}

impl IoSegment {
    pub fn new(page: Arc<Page>, offset: usize, len: usize) -> Self {
        Self { page, offset, len }
    }

    /// A segment covering the whole page.
    pub fn whole_page(page: Arc<Page>) -> Self {
        Self::new(page, 0, crate::crypto::PAGE_SIZE)
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A completed read request.
pub struct ReadIo {
    cipher: Arc<dyn BlockCipher>,
    segments: Vec<IoSegment>,
    status: IoStatus,
    on_release: Option<ReleaseHook>,
}

impl ReadIo {
    pub fn new(cipher: Arc<dyn BlockCipher>, segments: Vec<IoSegment>) -> Self {
        Self {
            cipher,
            segments,
            status: IoStatus::Ok,
            on_release: None,
        }
    }

    /// Record the completion status reported by the device.
    #[must_use]
    pub fn with_status(mut self, status: IoStatus) -> Self {
        self.status = status;
        self
    }

    /// Run `hook` when this I/O is released.
    #[must_use]
    pub fn with_release(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    pub fn cipher(&self) -> &dyn BlockCipher {
        self.cipher.as_ref()
    }

    pub fn segments(&self) -> &[IoSegment] {
        &self.segments
    }

    pub fn status(&self) -> IoStatus {
        self.status
    }
}

impl fmt::Debug for ReadIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadIo")
            .field("segments", &self.segments.len())
            .field("status", &self.status)
            .field("block_bits", &self.cipher.block_bits())
            .finish_non_exhaustive()
    }
}

impl Drop for ReadIo {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook();
        }
    }
}
