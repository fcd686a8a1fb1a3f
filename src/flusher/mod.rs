//! Flusher Module
//!
//! A background worker pool that drains frozen memtables to disk. Rotation
//! hands a frozen memtable to the flusher; a worker serializes it into an
//! SSTable, makes the table visible to readers, and only then retires the
//! in-memory copy.
//!
//! ## Design Overview
//!
//! Frozen memtables travel through a bounded `crossbeam` channel to `W`
//! worker threads. Until a worker finishes, the memtable stays in the
//! **read-only list** so lookups can still see its data; the list is the
//! sole owner of a memtable after rotation.
//!
//! Per dequeued memtable, a worker:
//!
//! 1. allocates the next sequence number,
//! 2. writes and fsyncs `sstables/<seq>.sst`,
//! 3. registers the table with the searcher (readers switch over),
//! 4. removes the memtable from the read-only list (pointer identity),
//! 5. appends a `FLUSH` checkpoint marker to the WAL.
//!
//! A failed flush logs the error and leaves the memtable in the read-only
//! list: its records are still in the WAL and its data still serves reads.
//!
//! ## Sequence numbers
//!
//! The counter is seeded from the directory listing (`max + 1`) at
//! [`Flusher::start`], so table names stay monotonic across restarts.
//!
//! ## Lifecycle
//!
//! [`Flusher::stop`] closes the channel and **joins** the workers; queued
//! memtables are drained to disk before the call returns, so a graceful
//! shutdown loses nothing.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------


// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread::JoinHandle,
};

use crossbeam::channel::{Receiver, Sender, bounded};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::memtable::MemTable;
use crate::sstable::{
    SSTABLE_DIR, SstSearcher, SstableError, build_from_memtable, parse_sequence,
    sstable_file_name,
};
use crate::wal::{Wal, WalError};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Capacity of the flush queue; enqueue blocks once this many frozen
/// memtables are waiting.
const FLUSH_QUEUE_CAPACITY: usize = 8;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`Flusher`] lifecycle and queue operations.
#[derive(Debug, Error)]
pub enum FlusherError {
    /// `start` called while the worker pool is already running.
    #[error("flusher is already active")]
    AlreadyActive,

    /// `stop` or `enqueue` called while the worker pool is not running.
    #[error("flusher is not active")]
    NotActive,

    /// Underlying I/O error (sequence-number recovery scan, thread spawn).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error while building or registering an SSTable.
    #[error("SSTable error: {0}")]
    Sstable(#[from] SstableError),

    /// Error while writing the WAL checkpoint marker.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Internal invariant violation or poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Flusher Core
// ------------------------------------------------------------------------------------------------

/// State shared between the flusher handle and its worker threads.
struct FlusherShared {
    /// The `<db>/sstables` directory.
    sstable_dir: PathBuf,

    /// Data-block soft cap handed to the SSTable writer.
    block_size: usize,

    /// WAL for the post-flush checkpoint marker.
    wal: Arc<Wal>,

    /// Searcher that newly written tables are registered with.
    searcher: Arc<SstSearcher>,

    /// Frozen memtables still serving reads, oldest first.
    readonly: Mutex<Vec<Arc<MemTable>>>,

    /// Monotonic sequence counter for table file names.
    next_seq: AtomicU64,
}

/// Live worker-pool state, present only between `start` and `stop`.
struct Runtime {
    sender: Sender<Arc<MemTable>>,
    handles: Vec<JoinHandle<()>>,
}

/// Background worker pool flushing frozen memtables to SSTables.
///
/// See the [module-level documentation](self) for the worker algorithm and
/// lifecycle guarantees.
pub struct Flusher {
    shared: Arc<FlusherShared>,
    workers: usize,
    runtime: Mutex<Option<Runtime>>,
}

impl Flusher {
    /// Creates a stopped flusher for the given database directory.
    pub fn new<P: AsRef<Path>>(
        db_dir: P,
        wal: Arc<Wal>,
        searcher: Arc<SstSearcher>,
        workers: usize,
        block_size: usize,
    ) -> Self {
        Self {
            shared: Arc::new(FlusherShared {
                sstable_dir: db_dir.as_ref().join(SSTABLE_DIR),
                block_size,
                wal,
                searcher,
                readonly: Mutex::new(Vec::new()),
                next_seq: AtomicU64::new(0),
            }),
            workers,
            runtime: Mutex::new(None),
        }
    }

    /// Spawns the worker pool.
    ///
    /// Seeds the sequence counter from the existing `*.sst` files so table
    /// names keep ascending across restarts. Fails with
    /// [`FlusherError::AlreadyActive`] when called twice.
    pub fn start(&self) -> Result<(), FlusherError> {
        let mut runtime = self
            .runtime
            .lock()
            .map_err(|_| FlusherError::Internal("flusher lock poisoned".into()))?;
        if runtime.is_some() {
            return Err(FlusherError::AlreadyActive);
        }

        self.shared
            .next_seq
            .store(next_sequence(&self.shared.sstable_dir)?, Ordering::SeqCst);

        let (sender, receiver) = bounded::<Arc<MemTable>>(FLUSH_QUEUE_CAPACITY);
        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let shared = Arc::clone(&self.shared);
            let receiver: Receiver<Arc<MemTable>> = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("tidepool-flush-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &shared, &receiver))?;
            handles.push(handle);
        }

        info!(
            workers = self.workers,
            next_seq = self.shared.next_seq.load(Ordering::SeqCst),
            "flusher started"
        );
        *runtime = Some(Runtime { sender, handles });
        Ok(())
    }

    /// Closes the queue and joins the workers.
    ///
    /// Memtables already enqueued are flushed before the workers exit, so
    /// nothing handed to the flusher is lost by a graceful shutdown. Fails
    /// with [`FlusherError::NotActive`] when the pool is not running.
    pub fn stop(&self) -> Result<(), FlusherError> {
        let runtime = {
            let mut guard = self
                .runtime
                .lock()
                .map_err(|_| FlusherError::Internal("flusher lock poisoned".into()))?;
            guard.take().ok_or(FlusherError::NotActive)?
        };

        // Dropping the sender closes the channel; workers drain and exit.
        drop(runtime.sender);
        for handle in runtime.handles {
            handle
                .join()
                .map_err(|_| FlusherError::Internal("flush worker panicked".into()))?;
        }

        info!("flusher stopped");
        Ok(())
    }

    /// Hands a frozen memtable to the worker pool.
    ///
    /// Blocks only while the queue is full.
    pub fn enqueue(&self, memtable: Arc<MemTable>) -> Result<(), FlusherError> {
        let sender = {
            let guard = self
                .runtime
                .lock()
                .map_err(|_| FlusherError::Internal("flusher lock poisoned".into()))?;
            guard
                .as_ref()
                .ok_or(FlusherError::NotActive)?
                .sender
                .clone()
        };

        sender
            .send(memtable)
            .map_err(|_| FlusherError::Internal("flush queue disconnected".into()))
    }

    /// Publishes a rotated memtable to the read-only list, keeping it
    /// visible to readers until its flush completes.
    pub fn append_readonly(&self, memtable: Arc<MemTable>) {
        if let Ok(mut list) = self.shared.readonly.lock() {
            list.push(memtable);
        }
    }

    /// Snapshot of the read-only memtables, oldest first. Callers probe it
    /// back-to-front for newest-first semantics.
    pub fn readonly_memtables(&self) -> Vec<Arc<MemTable>> {
        self.shared
            .readonly
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }
}

// ------------------------------------------------------------------------------------------------
// Worker
// ------------------------------------------------------------------------------------------------

/// Worker main loop: drain the channel until it is closed and empty.
fn worker_loop(worker_id: usize, shared: &FlusherShared, receiver: &Receiver<Arc<MemTable>>) {
    debug!(worker = worker_id, "flush worker running");

    for memtable in receiver.iter() {
        if let Err(e) = flush_memtable(shared, &memtable) {
            // The memtable stays in the read-only list; its records are
            // still durable in the WAL and its data still serves reads.
            error!(worker = worker_id, error = %e, "memtable flush failed");
        }
    }

    debug!(worker = worker_id, "flush worker exiting");
}

/// Flushes one memtable: write table, publish to readers, retire the
/// in-memory copy, checkpoint the WAL.
fn flush_memtable(shared: &FlusherShared, memtable: &Arc<MemTable>) -> Result<(), FlusherError> {
    let seq = shared.next_seq.fetch_add(1, Ordering::SeqCst);
    let path = shared.sstable_dir.join(sstable_file_name(seq));

    info!(seq, entries = memtable.len(), "flushing memtable");
    build_from_memtable(&path, memtable, shared.block_size)?;
    shared.searcher.register(seq)?;

    {
        let mut list = shared
            .readonly
            .lock()
            .map_err(|_| FlusherError::Internal("read-only list lock poisoned".into()))?;
        list.retain(|candidate| !Arc::ptr_eq(candidate, memtable));
    }

    shared.wal.append_flush()?;
    info!(seq, "memtable flushed");
    Ok(())
}

/// Recovers the next sequence number from the directory listing: one past
/// the highest existing table.
fn next_sequence(sstable_dir: &Path) -> Result<u64, FlusherError> {
    let mut max_seq = None;
    for dir_entry in fs::read_dir(sstable_dir)? {
        let dir_entry = dir_entry?;
        if let Some(seq) = dir_entry
            .file_name()
            .to_str()
            .and_then(parse_sequence)
        {
            max_seq = Some(max_seq.map_or(seq, |m: u64| m.max(seq)));
        }
    }
    Ok(max_seq.map_or(0, |m| m + 1))
}
