//! Sorted String Table (SSTable) Module
//!
//! Immutable, sorted, on-disk tables produced by flushing frozen memtables.
//! Once written, a table is never modified; newer tables shadow older ones
//! during lookups.
//!
//! ## Design Overview
//!
//! Entries are grouped into **data blocks** with restart-point prefix
//! compression: within a restart group each entry stores only the suffix
//! that differs from its predecessor, and every fourth entry resets the
//! predecessor so the block stays binary-searchable. A sparse **index**
//! (one entry per block, carrying the block's full first key) narrows a
//! point lookup to a single block; a **bloom filter** over all keys lets
//! the reader skip tables that cannot contain the key at all.
//!
//! # On-disk layout
//!
//! All integers are **little-endian** (unlike the WAL, which is
//! big-endian).
//!
//! ```text
//! [data block]…[data block][index][bloom filter][footer (20 B)]
//! ```
//!
//! - Data block entry: `[shared:u32][unshared:u32][value_len:u32]
//!   [key_suffix][value]`; a restart-group head has `shared = 0` and
//!   stores the full key.
//! - Data block trailer: `[restart_offsets:u32…][restart_count:u32]`,
//!   offsets relative to the block's first entry.
//! - Index entry: `[key_len:u32][full first key][block_offset:u32]`,
//!   offsets from the start of the file (the first block sits at 0).
//! - Bloom filter region: `[bit_array][num_bits:u32][num_hash_funcs:u32]`.
//! - Footer: `[index_offset:u32][index_size:u32][bloom_offset:u32]
//!   [bloom_size:u32][magic:u32 = 1337]`.
//!
//! # Sub-modules
//!
//! - [`builder`] — serializes a frozen memtable into this format.
//! - [`searcher`] — loads table metadata and performs point lookups.
//!
//! # Guarantees
//!
//! - **Immutability:** tables are written once and only ever read.
//! - **Ascending order:** blocks, and entries within them, are sorted.
//! - **No false negatives:** every key in a table passes its bloom filter.
//! - **Identifiable:** the footer magic distinguishes complete tables from
//!   crash leftovers, which readers skip.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod builder;
pub mod searcher;

#[cfg(test)]
mod tests;

pub use builder::build_from_memtable;
pub use searcher::SstSearcher;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::io;

use crate::memtable::MemTableError;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Directory (under the database root) holding `<seq>.sst` files.
pub const SSTABLE_DIR: &str = "sstables";

/// File extension of SSTable files.
pub const SSTABLE_EXT: &str = "sst";

/// Footer magic number identifying a completely written table.
pub const MAGIC_NUMBER: u32 = 1337;

/// Fixed footer size in bytes: five little-endian `u32` fields.
pub const FOOTER_SIZE: usize = 5 * U32_SIZE;

/// A restart point is placed every this many entries within a block.
pub(crate) const RESTART_INTERVAL: usize = 4;

/// Bloom filter sizing: bits per key.
pub(crate) const BLOOM_BITS_PER_KEY: u32 = 10;

/// Bloom filter sizing: hash functions per key.
pub(crate) const BLOOM_HASH_FUNCS: u32 = 7;

pub(crate) const U32_SIZE: usize = size_of::<u32>();

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by SSTable operations (build, load, search).
#[derive(Debug, Error)]
pub enum SstableError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or incomplete table data. During the startup scan this is
    /// a skip, not a failure: crash leftovers are expected.
    #[error("corrupt SSTable: {0}")]
    Corruption(String),

    /// A memtable with no entries cannot produce a table.
    #[error("cannot build an SSTable from an empty memtable")]
    EmptyMemTable,

    /// Error reading the source memtable.
    #[error("memtable error: {0}")]
    MemTable(#[from] MemTableError),
}

// ------------------------------------------------------------------------------------------------
// File naming
// ------------------------------------------------------------------------------------------------

/// File name for a table with the given sequence number.
pub(crate) fn sstable_file_name(seq: u64) -> String {
    format!("{seq}.{SSTABLE_EXT}")
}

/// Parses `<seq>.sst` back into a sequence number; `None` for anything
/// else in the directory.
pub(crate) fn parse_sequence(file_name: &str) -> Option<u64> {
    file_name
        .strip_suffix(&format!(".{SSTABLE_EXT}"))?
        .parse()
        .ok()
}

// ------------------------------------------------------------------------------------------------
// Format structures
// ------------------------------------------------------------------------------------------------

/// One sparse-index entry: the full first key of a data block and the
/// block's byte offset from the start of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    /// Full first key of the block.
    pub(crate) key: String,

    /// Byte offset of the block within the file.
    pub(crate) offset: u32,
}

/// The fixed-size table footer, written last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Footer {
    /// Offset of the index region (equals the size of the data region).
    pub(crate) index_offset: u32,

    /// Size of the index region in bytes.
    pub(crate) index_size: u32,

    /// Offset of the bloom filter region.
    pub(crate) bloom_offset: u32,

    /// Size of the bloom filter region in bytes.
    pub(crate) bloom_size: u32,
}

impl Footer {
    /// Encodes the footer, magic included.
    pub(crate) fn encode(&self) -> [u8; FOOTER_SIZE] {
        let mut buf = [0u8; FOOTER_SIZE];
        buf[0..4].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[4..8].copy_from_slice(&self.index_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.bloom_offset.to_le_bytes());
        buf[12..16].copy_from_slice(&self.bloom_size.to_le_bytes());
        buf[16..20].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
        buf
    }

    /// Decodes and validates a footer; a wrong magic number means the file
    /// is not a completely written table.
    pub(crate) fn decode(buf: &[u8]) -> Result<Self, SstableError> {
        if buf.len() != FOOTER_SIZE {
            return Err(SstableError::Corruption(format!(
                "footer must be {FOOTER_SIZE} bytes, got {}",
                buf.len()
            )));
        }

        let read_u32 =
            |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        let magic = read_u32(16);
        if magic != MAGIC_NUMBER {
            return Err(SstableError::Corruption(format!(
                "bad magic number: {magic}"
            )));
        }

        Ok(Self {
            index_offset: read_u32(0),
            index_size: read_u32(4),
            bloom_offset: read_u32(8),
            bloom_size: read_u32(12),
        })
    }
}
