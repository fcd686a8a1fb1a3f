//! MemTable Module
//!
//! The in-memory write buffer of the storage engine: a thin wrapper around
//! the [skip list](crate::skiplist) that adds tombstone encoding and a
//! freeze flag.
//!
//! ## Design Overview
//!
//! Deletions are stored in-line as the reserved sentinel value
//! [`TOMBSTONE`]; a lookup distinguishes a real hit, a tombstone (which
//! must terminate the engine's multi-tier search), and a miss.
//!
//! A memtable is mutable while active. When the engine rotates it out, it
//! is **frozen**: all further mutations fail with
//! [`MemTableError::Frozen`], and the flusher may safely serialize its
//! contents to an SSTable. Freezing is idempotent and one-way.
//!
//! ## Size Accounting
//!
//! [`MemTable::len`] reports the number of insertions, not the number of
//! distinct keys — overwrites are not subtracted. As a rotation trigger
//! this is an upper bound on buffered work, which is the only property the
//! engine relies on.
//!
//! # Concurrency
//!
//! The skip list and the freeze flag live behind a single `RwLock`: the
//! writer takes an exclusive lock, concurrent readers share. The flusher
//! reads only after freeze, so its snapshot is stable by construction.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::sync::RwLock;

use crate::skiplist::{SkipList, SkipListError};
use thiserror::Error;
use tracing::trace;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Reserved sentinel value marking a deleted key.
///
/// Stored in-line in both the memtable and SSTable data blocks, so the
/// deletion shadows older versions across every storage tier.
pub const TOMBSTONE: &[u8] = b"__TOMBSTONE__";

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by [`MemTable`] operations.
#[derive(Debug, Error)]
pub enum MemTableError {
    /// Mutation attempted on a frozen memtable.
    #[error("memtable is frozen")]
    Frozen,

    /// Invalid skip-list parameters.
    #[error("invalid memtable config: {0}")]
    InvalidConfig(#[from] SkipListError),

    /// Internal invariant violation or poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Search result and flush entries
// ------------------------------------------------------------------------------------------------

/// Result of a memtable lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum SearchResult {
    /// A live value for the key.
    Value(Vec<u8>),

    /// The key was deleted here; the engine must stop searching older tiers.
    Tombstone,

    /// This memtable knows nothing about the key.
    NotFound,
}

/// One entry of a flush snapshot, in ascending key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemTableEntry {
    /// The key.
    pub key: String,

    /// The stored value; empty when `tombstone` is set.
    pub value: Vec<u8>,

    /// Whether this entry is a deletion marker.
    pub tombstone: bool,
}

// ------------------------------------------------------------------------------------------------
// MemTable Core
// ------------------------------------------------------------------------------------------------

struct MemTableInner {
    list: SkipList<Vec<u8>>,
    frozen: bool,
}

/// The in-memory ordered write buffer.
///
/// See the [module-level documentation](self) for semantics.
pub struct MemTable {
    inner: RwLock<MemTableInner>,
}

impl MemTable {
    /// Creates an empty memtable with the given skip-list parameters.
    pub fn new(max_level: usize, probability: u8) -> Result<Self, MemTableError> {
        let list = SkipList::new(max_level, probability)?;
        Ok(Self {
            inner: RwLock::new(MemTableInner {
                list,
                frozen: false,
            }),
        })
    }

    /// Inserts or updates a key.
    ///
    /// Fails with [`MemTableError::Frozen`] after the table was rotated out.
    pub fn insert(&self, key: &str, value: &[u8]) -> Result<(), MemTableError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| MemTableError::Internal("memtable lock poisoned".into()))?;

        if guard.frozen {
            return Err(MemTableError::Frozen);
        }

        guard.list.insert(key, value.to_vec());
        trace!(key, val_len = value.len(), "memtable insert");
        Ok(())
    }

    /// Deletes a key by inserting the tombstone sentinel.
    pub fn delete(&self, key: &str) -> Result<(), MemTableError> {
        self.insert(key, TOMBSTONE)
    }

    /// Looks up a key, distinguishing hit, tombstone, and miss.
    pub fn search(&self, key: &str) -> Result<SearchResult, MemTableError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| MemTableError::Internal("memtable lock poisoned".into()))?;

        Ok(match guard.list.search(key) {
            None => SearchResult::NotFound,
            Some(value) if value.as_slice() == TOMBSTONE => SearchResult::Tombstone,
            Some(value) => SearchResult::Value(value.clone()),
        })
    }

    /// Marks the table read-only. Idempotent.
    pub fn freeze(&self) -> Result<(), MemTableError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| MemTableError::Internal("memtable lock poisoned".into()))?;
        guard.frozen = true;
        Ok(())
    }

    /// Returns whether the table has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.read().map(|guard| guard.frozen).unwrap_or(true)
    }

    /// Snapshot of all entries in ascending key order, with tombstones
    /// flagged. Consumed by the SSTable writer.
    pub fn entries(&self) -> Result<Vec<MemTableEntry>, MemTableError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| MemTableError::Internal("memtable lock poisoned".into()))?;

        Ok(guard
            .list
            .iter()
            .map(|(key, value)| {
                let tombstone = value.as_slice() == TOMBSTONE;
                MemTableEntry {
                    key: key.to_string(),
                    value: if tombstone { Vec::new() } else { value.clone() },
                    tombstone,
                }
            })
            .collect())
    }

    /// Number of insertions since creation (not distinct keys).
    pub fn len(&self) -> usize {
        self.inner.read().map(|guard| guard.list.len()).unwrap_or(0)
    }

    /// Returns `true` if nothing was ever inserted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
