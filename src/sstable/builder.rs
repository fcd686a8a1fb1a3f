//! SSTable writer — serializes a frozen memtable into the on-disk format.
//!
//! The builder walks the memtable's ascending entry snapshot exactly once,
//! packing entries into prefix-compressed data blocks, collecting one index
//! entry per block, and feeding every key into the bloom filter.
//!
//! # Input Requirements
//!
//! - The memtable must be frozen and non-empty; entries arrive in ascending
//!   key order with at most one entry per key.
//!
//! # Output Guarantees
//!
//! - Data blocks are written in ascending key order, each opening with a
//!   restart point (full key, `shared = 0`).
//! - The index stores every block's **full** first key, so it can be
//!   binary-searched without touching the data region.
//! - The bloom filter covers every key, tombstoned ones included, sized at
//!   10 bits per key with 7 hash functions.
//! - The file is fsynced before the builder returns; a crash mid-write
//!   leaves a file whose footer never validates, which readers skip.

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};

use crate::bloom::BloomFilter;
use crate::memtable::{MemTable, TOMBSTONE};
use tracing::debug;

use super::{
    BLOOM_BITS_PER_KEY, BLOOM_HASH_FUNCS, Footer, IndexEntry, RESTART_INTERVAL, SstableError,
    U32_SIZE,
};

// ------------------------------------------------------------------------------------------------
// Block assembly
// ------------------------------------------------------------------------------------------------

/// An in-progress data block: entry bytes plus the restart table being
/// accumulated alongside them.
struct BlockBuilder {
    /// Serialized entries.
    entries: Vec<u8>,

    /// Offsets (into `entries`) at which restart-point entries begin.
    restarts: Vec<u32>,

    /// Number of entries appended so far.
    entry_count: usize,

    /// Full first key of the block, recorded for the index.
    first_key: String,

    /// Prefix-compression predecessor; cleared at every restart point.
    prev_key: String,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            restarts: Vec::new(),
            entry_count: 0,
            first_key: String::new(),
            prev_key: String::new(),
        }
    }

    /// Bytes the trailer will occupy: the restart offsets plus the count.
    fn trailer_size(&self) -> usize {
        (self.restarts.len() + 1) * U32_SIZE
    }

    /// Total encoded size of the block as it stands.
    fn encoded_size(&self) -> usize {
        self.entries.len() + self.trailer_size()
    }

    /// Appends one entry, placing a restart point every
    /// [`RESTART_INTERVAL`] entries.
    fn add(&mut self, key: &str, value: &[u8]) {
        if self.entry_count == 0 {
            self.first_key = key.to_string();
        }

        if self.entry_count % RESTART_INTERVAL == 0 {
            self.restarts.push(self.entries.len() as u32);
            self.prev_key.clear();
        }

        let shared = shared_prefix_len(self.prev_key.as_bytes(), key.as_bytes());
        let suffix = &key.as_bytes()[shared..];

        self.entries
            .extend_from_slice(&(shared as u32).to_le_bytes());
        self.entries
            .extend_from_slice(&(suffix.len() as u32).to_le_bytes());
        self.entries
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.entries.extend_from_slice(suffix);
        self.entries.extend_from_slice(value);

        self.prev_key = key.to_string();
        self.entry_count += 1;
    }

    /// Writes the finished block (entries, restart offsets, restart count)
    /// and records its index entry. Returns the file offset following the
    /// block.
    fn finish(
        self,
        writer: &mut impl Write,
        index: &mut Vec<IndexEntry>,
        offset: u32,
    ) -> Result<u32, SstableError> {
        let total = self.encoded_size() as u32;

        writer.write_all(&self.entries)?;
        for restart in &self.restarts {
            writer.write_all(&restart.to_le_bytes())?;
        }
        writer.write_all(&(self.restarts.len() as u32).to_le_bytes())?;

        index.push(IndexEntry {
            key: self.first_key,
            offset,
        });

        Ok(offset + total)
    }
}

/// Length of the common prefix of two byte strings.
fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

// ------------------------------------------------------------------------------------------------
// Public entry point
// ------------------------------------------------------------------------------------------------

/// Serializes a frozen memtable into a complete SSTable at `path`.
///
/// `block_size` is a soft cap: a block is closed before appending an entry
/// once its encoded size (entries plus restart trailer) has reached the
/// cap, so a single oversized entry still fits in a block of its own.
///
/// # Errors
///
/// - [`SstableError::EmptyMemTable`] when the memtable holds no entries.
/// - I/O errors from writing or syncing the file.
pub fn build_from_memtable(
    path: &Path,
    memtable: &MemTable,
    block_size: usize,
) -> Result<(), SstableError> {
    let entries = memtable.entries()?;
    if entries.is_empty() {
        return Err(SstableError::EmptyMemTable);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);

    let mut bloom = BloomFilter::new(entries.len() as u32 * BLOOM_BITS_PER_KEY, BLOOM_HASH_FUNCS);
    let mut index: Vec<IndexEntry> = Vec::new();

    // 1. Data blocks.
    let mut offset: u32 = 0;
    let mut block = BlockBuilder::new();
    for entry in &entries {
        if block.entry_count > 0 && block.encoded_size() >= block_size {
            offset = block.finish(&mut writer, &mut index, offset)?;
            block = BlockBuilder::new();
        }

        let value = if entry.tombstone {
            TOMBSTONE
        } else {
            entry.value.as_slice()
        };
        bloom.add(entry.key.as_bytes());
        block.add(&entry.key, value);
    }
    offset = block.finish(&mut writer, &mut index, offset)?;

    // 2. Index: one entry per block, full first key.
    let index_offset = offset;
    let mut index_bytes = Vec::new();
    for entry in &index {
        index_bytes.extend_from_slice(&(entry.key.len() as u32).to_le_bytes());
        index_bytes.extend_from_slice(entry.key.as_bytes());
        index_bytes.extend_from_slice(&entry.offset.to_le_bytes());
    }
    writer.write_all(&index_bytes)?;

    // 3. Bloom filter region.
    let mut bloom_bytes = Vec::new();
    bloom.encode_to(&mut bloom_bytes);
    writer.write_all(&bloom_bytes)?;

    // 4. Footer.
    let footer = Footer {
        index_offset,
        index_size: index_bytes.len() as u32,
        bloom_offset: index_offset + index_bytes.len() as u32,
        bloom_size: bloom_bytes.len() as u32,
    };
    writer.write_all(&footer.encode())?;

    // 5. Durability: the table is committed only once it reaches disk.
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| SstableError::Io(e.into_error()))?;
    file.sync_all()?;

    debug!(
        path = %path.display(),
        entries = entries.len(),
        blocks = index.len(),
        "SSTable written"
    );

    Ok(())
}
