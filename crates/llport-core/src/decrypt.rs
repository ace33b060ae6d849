//! Decrypt completion pipeline for read I/O.
//!
//! Once a read completes, every segment of the request is decrypted in place
//! and its page is finalized. There are two ways in:
//!
//! - **Inline**: [`decrypt_bio`] runs on the caller's thread. Failed pages are
//!   marked errored, but marking pages up to date and unlocking them is left to
//!   the caller.
//! - **Deferred**: [`DecryptQueue::enqueue`] moves the request onto a bounded
//!   worker pool for completion contexts that must not block. A worker runs the
//!   final pass ([`finish_bio`]): it decrypts, marks each page up to date or
//!   errored, unlocks it, and then releases the request.
//!
//! Decryption failures are isolated per segment. A failed segment errors only
//! its own page; the remaining segments are still processed, in order.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::bio::ReadIo;
use crate::config::CryptConfig;
use crate::crypto::decrypt_pagecache_blocks;

/// Outcome of one pass over a read request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecryptSummary {
    /// Segments decrypted successfully.
    pub decrypted: usize,
    /// Segments whose page was marked errored.
    pub failed: usize,
}

fn decrypt_segments(io: &ReadIo, done: bool) -> DecryptSummary {
    let mut summary = DecryptSummary::default();
    let io_ok = io.status().is_ok();

    for segment in io.segments() {
        let page = &segment.page;
        let result = if io_ok {
            decrypt_pagecache_blocks(io.cipher(), page, segment.len, segment.offset)
                .map_err(|e| e.to_string())
        } else {
            Err(format!("read completed with {:?}", io.status()))
        };

        match result {
            Ok(()) => {
                summary.decrypted += 1;
                if done {
                    page.set_uptodate();
                }
            }
            Err(reason) => {
                debug!(
                    index = page.index(),
                    offset = segment.offset,
                    len = segment.len,
                    %reason,
                    "segment decryption failed"
                );
                summary.failed += 1;
                page.set_error();
            }
        }

        if done {
            page.unlock();
        }
    }

    summary
}

/// Decrypt a completed read on the calling thread.
///
/// Pages whose segment fails are marked errored. Nothing is marked up to date
/// and no page is unlocked.
#[instrument(level = "debug", skip(io), fields(segments = io.segments().len()))]
pub fn decrypt_bio(io: &ReadIo) -> DecryptSummary {
    decrypt_segments(io, false)
}

/// Final completion: decrypt, finalize and unlock every page, then release
/// the request.
#[instrument(level = "debug", skip(io), fields(segments = io.segments().len()))]
pub fn finish_bio(io: ReadIo) -> DecryptSummary {
    let summary = decrypt_segments(&io, true);
    drop(io);
    summary
}

/// Why a request could not be queued. The request is handed back.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("decrypt queue is full")]
    Full(ReadIo),

    #[error("decrypt queue has been shut down")]
    ShutDown(ReadIo),
}

impl QueueError {
    /// Take back the request that could not be queued.
    pub fn into_io(self) -> ReadIo {
        match self {
            QueueError::Full(io) | QueueError::ShutDown(io) => io,
        }
    }
}

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed_segments: AtomicU64,
}

/// Point-in-time counters of a [`DecryptQueue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed_segments: u64,
}

/// Bounded pool of decrypt workers.
///
/// Jobs are picked up in no particular order relative to each other; within
/// a job, segments are processed in their original order. Dropping the queue
/// drains everything already queued before the workers exit.
#[derive(Debug)]
pub struct DecryptQueue {
    sender: Mutex<Option<Sender<ReadIo>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<QueueCounters>,
}

impl DecryptQueue {
    /// Start `workers` threads fed by a queue holding at most `depth` jobs.
    ///
    /// Both counts are raised to at least one.
    pub fn new(workers: usize, depth: usize) -> io::Result<Self> {
        let depth = depth.max(1);
        let (sender, receiver) = bounded::<ReadIo>(depth);
        let counters = Arc::new(QueueCounters::default());

        let mut handles = Vec::with_capacity(workers.max(1));
        for id in 0..workers.max(1) {
            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);
            let handle = thread::Builder::new()
                .name(format!("llport-decrypt-{id}"))
                .spawn(move || worker_loop(id, &receiver, &counters))?;
            handles.push(handle);
        }

        debug!(workers = handles.len(), depth, "decrypt queue started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            counters,
        })
    }

    /// Start a queue sized by `config`.
    pub fn from_config(config: &CryptConfig) -> io::Result<Self> {
        Self::new(config.decrypt_workers, config.decrypt_queue_depth)
    }

    /// Hand a completed read to the workers without blocking.
    pub fn enqueue(&self, io: ReadIo) -> Result<(), QueueError> {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(QueueError::ShutDown(io));
        };

        match sender.try_send(io) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                trace!("read queued for deferred decryption");
                Ok(())
            }
            Err(TrySendError::Full(io)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("decrypt queue full, handing request back");
                Err(QueueError::Full(io))
            }
            Err(TrySendError::Disconnected(io)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(QueueError::ShutDown(io))
            }
        }
    }

    /// Stop accepting work, drain the queue and join the workers.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("decrypt worker panicked");
            }
        }
        debug!(stats = ?self.stats(), "decrypt queue shut down");
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed_segments: self.counters.failed_segments.load(Ordering::Relaxed),
        }
    }
}

impl Drop for DecryptQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: &Receiver<ReadIo>, counters: &QueueCounters) {
    // Ends once every sender is gone and the queue is empty.
    for io in receiver {
        let summary = finish_bio(io);
        counters.completed.fetch_add(1, Ordering::Relaxed);
        counters
            .failed_segments
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
    }
    trace!(worker = id, "decrypt worker exiting");
}
