//! # Engine Facade
//!
//! The public surface of the storage engine: open a database directory,
//! put/get/delete string-keyed byte values, close. Everything else —
//! rotation, flushing, table visibility — happens behind this module.
//!
//! ## Design Overview
//!
//! Data lives in three tiers, queried newest-first:
//!
//! 1. **Active memtable** — the mutable write buffer.
//! 2. **Read-only memtables** — frozen buffers awaiting flush.
//! 3. **SSTables** — immutable on-disk tables, probed via the searcher.
//!
//! Every write is appended (and fsynced) to the WAL before it touches the
//! memtable, so an acknowledged write survives a crash. When the active
//! memtable's insert count exceeds [`DbConfig::max_entries`], it is
//! rotated: published to the read-only list, handed to the flusher, frozen,
//! and replaced by a fresh table — in that order, under the rotation lock,
//! so readers never observe a gap.
//!
//! ## Concurrency Model
//!
//! A single logical writer is assumed; `put`/`delete` must not race each
//! other. Readers run concurrently with the writer and with flush workers:
//! they clone the active-table handle under a read lock, then probe
//! lock-free snapshots of the other tiers.
//!
//! ## Durability
//!
//! A successful `put` or `delete` is durable before it returns. Reopening
//! a database replays the WAL into a fresh memtable; tables already
//! flushed are found by the directory scan, and WAL records preceding a
//! `FLUSH` checkpoint are skipped as already persisted.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::flusher::{Flusher, FlusherError};
use crate::memtable::{MemTable, MemTableError, SearchResult};
use crate::sstable::{SSTABLE_DIR, SstSearcher, SstableError};
use crate::wal::{Wal, WalError, WalOp};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by the public [`Db`] API.
#[derive(Debug, Error)]
pub enum DbError {
    /// Error in the write-ahead log.
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    /// Error in the in-memory write buffer.
    #[error("memtable error: {0}")]
    MemTable(#[from] MemTableError),

    /// Error reading or loading SSTables.
    #[error("SSTable error: {0}")]
    Sstable(#[from] SstableError),

    /// Error in the background flusher.
    #[error("flusher error: {0}")]
    Flusher(#[from] FlusherError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Configuration for a [`Db`] instance, passed to [`Db::open`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Maximum skip-list tower height of each memtable.
    pub max_level: usize,

    /// Skip-list level continuation probability in percent (`0..=100`).
    pub probability: u8,

    /// Rotation threshold: the active memtable is frozen once its insert
    /// count exceeds this. Counts insertions, not distinct keys.
    pub max_entries: usize,

    /// Number of background flush workers.
    pub flush_workers: usize,

    /// Soft cap on SSTable data-block size in bytes.
    pub block_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_level: 4,
            probability: 50,
            max_entries: 4096,
            flush_workers: 2,
            block_size: 4096,
        }
    }
}

impl DbConfig {
    /// Validates all fields, returning [`DbError::InvalidConfig`] on the
    /// first violation.
    fn validate(&self) -> Result<(), DbError> {
        if self.max_level == 0 {
            return Err(DbError::InvalidConfig("max_level must be at least 1".into()));
        }
        if self.probability > 100 {
            return Err(DbError::InvalidConfig(format!(
                "probability must be within 0..=100, got {}",
                self.probability
            )));
        }
        if self.max_entries == 0 {
            return Err(DbError::InvalidConfig("max_entries must be at least 1".into()));
        }
        if self.flush_workers == 0 {
            return Err(DbError::InvalidConfig(
                "flush_workers must be at least 1".into(),
            ));
        }
        if self.block_size == 0 {
            return Err(DbError::InvalidConfig("block_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// Snapshot of engine statistics returned by [`Db::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbStats {
    /// Frozen memtables awaiting (or failing) flush.
    pub readonly_memtables: usize,

    /// SSTables currently visible to readers.
    pub sstables: usize,
}

// ------------------------------------------------------------------------------------------------
// Db Core
// ------------------------------------------------------------------------------------------------

struct DbInner {
    /// Database root directory.
    path: PathBuf,

    /// Engine configuration.
    config: DbConfig,

    /// Write-ahead log; shared with the flusher for checkpoint markers.
    wal: Arc<Wal>,

    /// Active memtable. The write lock doubles as the rotation lock.
    active: RwLock<Arc<MemTable>>,

    /// Read side of the on-disk tier.
    searcher: Arc<SstSearcher>,

    /// Background flush worker pool; owns the read-only memtable list.
    flusher: Flusher,
}

/// The main storage-engine handle.
///
/// Cheap to clone; all clones share the same underlying state.
pub struct Db {
    inner: Arc<DbInner>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl Clone for Db {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Db {
    /// Opens (or creates) a database rooted at the given directory.
    ///
    /// On an existing directory the WAL is replayed into a fresh memtable
    /// and complete SSTables are loaded; crash leftovers (partial tables)
    /// are skipped, their records recovered from the WAL.
    pub fn open<P: AsRef<Path>>(path: P, config: DbConfig) -> Result<Self, DbError> {
        config.validate()?;

        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        fs::create_dir_all(path.join(SSTABLE_DIR))?;

        // 1. WAL and a fresh active memtable.
        let wal = Arc::new(Wal::open(&path)?);
        let active = Arc::new(MemTable::new(config.max_level, config.probability)?);

        // 2. Replay the log into the memtable. The table is fresh, so no
        //    mutation can hit the frozen guard.
        let records = wal.load()?;
        let replayed = records.len();
        for record in records {
            match record.op {
                WalOp::Put => active.insert(&record.key, &record.value)?,
                WalOp::Delete => active.delete(&record.key)?,
                WalOp::Flush => {
                    // load() consumes flush markers; nothing reaches here.
                }
            }
        }

        // 3. Load the on-disk tier.
        let searcher = Arc::new(SstSearcher::new(&path));
        searcher.start()?;

        // 4. Start the background flusher.
        let flusher = Flusher::new(
            &path,
            Arc::clone(&wal),
            Arc::clone(&searcher),
            config.flush_workers,
            config.block_size,
        );
        flusher.start()?;

        info!(
            path = %path.display(),
            replayed,
            sstables = searcher.table_count(),
            "database opened"
        );

        Ok(Self {
            inner: Arc::new(DbInner {
                path,
                config,
                wal,
                active: RwLock::new(active),
                searcher,
                flusher,
            }),
        })
    }

    /// Inserts or updates a key.
    ///
    /// The record is durable in the WAL before the memtable is touched; a
    /// WAL failure leaves in-memory state unchanged.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), DbError> {
        if key.is_empty() {
            return Err(DbError::EmptyKey);
        }

        self.inner.wal.append(WalOp::Put, key.as_bytes(), value)?;

        let active = self.active_handle()?;
        active.insert(key, value)?;

        if active.len() > self.inner.config.max_entries {
            self.rotate()?;
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// Deleting a key that was never written is valid; the tombstone
    /// shadows any older version living in a lower tier.
    pub fn delete(&self, key: &str) -> Result<(), DbError> {
        if key.is_empty() {
            return Err(DbError::EmptyKey);
        }

        self.inner.wal.append(WalOp::Delete, key.as_bytes(), b"")?;
        self.active_handle()?.delete(key)?;
        Ok(())
    }

    /// Looks up a key across all three tiers, newest first.
    ///
    /// Returns `Ok(None)` for a key that is absent or deleted — a miss is
    /// never an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        // 1. Active memtable.
        match self.active_handle()?.search(key)? {
            SearchResult::Value(value) => return Ok(Some(value)),
            SearchResult::Tombstone => return Ok(None),
            SearchResult::NotFound => {}
        }

        // 2. Read-only memtables, newest first.
        for memtable in self.inner.flusher.readonly_memtables().iter().rev() {
            match memtable.search(key)? {
                SearchResult::Value(value) => return Ok(Some(value)),
                SearchResult::Tombstone => return Ok(None),
                SearchResult::NotFound => {}
            }
        }

        // 3. SSTables.
        Ok(self.inner.searcher.search(key)?)
    }

    /// Gracefully shuts down the engine.
    ///
    /// Hands the active memtable to the flusher, stops the pool — draining
    /// every queued memtable to disk — and syncs the WAL. The active table
    /// must reach disk here: the drain appends `FLUSH` markers, and replay
    /// discards everything before a marker.
    pub fn close(&self) -> Result<(), DbError> {
        {
            let active = self.active_handle()?;
            if !active.is_empty() && !active.is_frozen() {
                self.inner.flusher.append_readonly(Arc::clone(&active));
                self.inner.flusher.enqueue(Arc::clone(&active))?;
                active.freeze()?;
            }
        }

        self.inner.flusher.stop()?;
        self.inner.wal.sync()?;
        info!(path = %self.inner.path.display(), "database closed");
        Ok(())
    }

    /// Returns a snapshot of engine statistics.
    pub fn stats(&self) -> DbStats {
        DbStats {
            readonly_memtables: self.inner.flusher.readonly_memtables().len(),
            sstables: self.inner.searcher.table_count(),
        }
    }

    /// Clones the active-memtable handle under the read lock.
    fn active_handle(&self) -> Result<Arc<MemTable>, DbError> {
        Ok(Arc::clone(
            &*self
                .inner
                .active
                .read()
                .map_err(|_| MemTableError::Internal("active memtable lock poisoned".into()))?,
        ))
    }

    /// Rotates the active memtable under the write lock, double-checking
    /// the threshold so concurrent triggers rotate once.
    ///
    /// Ordering is load-bearing: the old table is published to the
    /// read-only list and enqueued *before* it is frozen, and the fresh
    /// table is installed last. Readers always find every record in some
    /// tier, and the write lock keeps writers out of the frozen table.
    fn rotate(&self) -> Result<(), DbError> {
        let mut active = self
            .inner
            .active
            .write()
            .map_err(|_| MemTableError::Internal("active memtable lock poisoned".into()))?;

        if active.len() <= self.inner.config.max_entries {
            return Ok(());
        }

        let fresh = Arc::new(MemTable::new(
            self.inner.config.max_level,
            self.inner.config.probability,
        )?);

        let old = Arc::clone(&active);
        self.inner.flusher.append_readonly(Arc::clone(&old));
        self.inner.flusher.enqueue(Arc::clone(&old))?;
        old.freeze()?;
        *active = fresh;

        debug!(entries = old.len(), "memtable rotated");
        Ok(())
    }
}
