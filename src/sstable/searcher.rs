//! SSTable searcher — loads table metadata and serves point lookups.
//!
//! On startup the searcher scans the `sstables/` directory, memory-maps
//! every complete table, and caches its parsed index and bloom filter.
//! Files whose footer fails to validate — crash leftovers from an
//! interrupted flush — are skipped with a warning; their records are still
//! recoverable from the WAL.
//!
//! ## Lookup pipeline
//!
//! Tables are probed newest-first (sequence number descending). For each:
//!
//! 1. **Bloom filter** — a definite "absent" skips the table entirely.
//! 2. **Index binary search** — the greatest first-key ≤ query names the
//!    one candidate block.
//! 3. **Restart binary search** — within the block, the greatest restart
//!    entry ≤ query bounds the scan to a single restart group's reach.
//! 4. **Linear scan** — entries are walked forward, each key rebuilt from
//!    the previous key's shared prefix plus the stored suffix, until the
//!    query matches or the scan reaches the restart table.
//!
//! A tombstone hit terminates the whole lookup as "absent"; a miss falls
//! through to the next-older table.
//!
//! # Concurrency model
//!
//! The table cache sits behind an `RwLock`: lookups share a read lock,
//! while [`SstSearcher::register`] (called by flusher workers as new
//! tables appear) takes the write lock briefly to splice in a handle.
//! Tables themselves are immutable and memory-mapped, so block reads need
//! no further coordination.

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::bloom::BloomFilter;
use crate::memtable::TOMBSTONE;
use memmap2::Mmap;
use tracing::{debug, info, trace, warn};

use super::{
    FOOTER_SIZE, Footer, IndexEntry, SSTABLE_DIR, SstableError, U32_SIZE, parse_sequence,
    sstable_file_name,
};

// ------------------------------------------------------------------------------------------------
// Table handle
// ------------------------------------------------------------------------------------------------

/// A loaded table: parsed metadata plus the mapped file bytes.
struct TableHandle {
    /// File name within the sstables directory.
    file_name: String,

    /// Numeric sequence parsed from the file name; probe order key.
    seq: u64,

    /// Memory-mapped table file.
    mmap: Mmap,

    /// Sparse index, ascending by key.
    index: Vec<IndexEntry>,

    /// Bloom filter over every key in the table.
    bloom: BloomFilter,

    /// Size of the data-block region (the index offset).
    data_region_size: usize,
}

/// Outcome of probing a single table.
enum TableHit {
    /// A live value.
    Value(Vec<u8>),

    /// The key was deleted in this table.
    Tombstone,
}

// ------------------------------------------------------------------------------------------------
// SstSearcher
// ------------------------------------------------------------------------------------------------

/// Read-side access to all SSTables of a database.
pub struct SstSearcher {
    /// The `<db>/sstables` directory.
    dir: PathBuf,

    /// Loaded tables, sequence descending (newest first).
    tables: RwLock<Vec<TableHandle>>,
}

impl SstSearcher {
    /// Creates a searcher rooted at the database directory.
    pub fn new<P: AsRef<Path>>(db_dir: P) -> Self {
        Self {
            dir: db_dir.as_ref().join(SSTABLE_DIR),
            tables: RwLock::new(Vec::new()),
        }
    }

    /// Scans the table directory and loads every complete table.
    ///
    /// Files without a valid footer (crash leftovers, foreign files) are
    /// skipped; directory-level I/O errors surface to the caller.
    pub fn start(&self) -> Result<(), SstableError> {
        let mut loaded = Vec::new();

        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(seq) = parse_sequence(file_name) else {
                continue;
            };

            match open_table(&path, file_name, seq) {
                Ok(table) => loaded.push(table),
                Err(SstableError::Corruption(reason)) => {
                    warn!(file = file_name, %reason, "skipping incomplete SSTable");
                }
                Err(e) => return Err(e),
            }
        }

        loaded.sort_by(|a, b| b.seq.cmp(&a.seq));
        info!(tables = loaded.len(), dir = %self.dir.display(), "SSTable scan complete");

        let mut tables = self
            .tables
            .write()
            .map_err(|_| SstableError::Corruption("searcher lock poisoned".into()))?;
        *tables = loaded;
        Ok(())
    }

    /// Makes a freshly flushed table visible to readers.
    ///
    /// The handle is spliced in at its sequence-ordered position, so probe
    /// order stays newest-first even if flush workers complete out of
    /// order.
    pub fn register(&self, seq: u64) -> Result<(), SstableError> {
        let file_name = sstable_file_name(seq);
        let table = open_table(&self.dir.join(&file_name), &file_name, seq)?;

        let mut tables = self
            .tables
            .write()
            .map_err(|_| SstableError::Corruption("searcher lock poisoned".into()))?;
        let at = tables.partition_point(|t| t.seq > seq);
        tables.insert(at, table);

        debug!(file = %file_name, "SSTable registered");
        Ok(())
    }

    /// Point lookup across all tables, newest first.
    ///
    /// Returns `Ok(None)` both for a key absent everywhere and for a key
    /// whose newest on-disk version is a tombstone.
    pub fn search(&self, key: &str) -> Result<Option<Vec<u8>>, SstableError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| SstableError::Corruption("searcher lock poisoned".into()))?;

        for table in tables.iter() {
            if !table.bloom.contains(key.as_bytes()) {
                trace!(file = %table.file_name, key, "bloom filter miss");
                continue;
            }

            match search_table(table, key)? {
                Some(TableHit::Value(value)) => return Ok(Some(value)),
                Some(TableHit::Tombstone) => return Ok(None),
                None => {}
            }
        }

        Ok(None)
    }

    /// Number of tables currently loaded.
    pub fn table_count(&self) -> usize {
        self.tables.read().map(|tables| tables.len()).unwrap_or(0)
    }
}

// ------------------------------------------------------------------------------------------------
// Table loading
// ------------------------------------------------------------------------------------------------

/// Opens and validates one table file: footer, index, and bloom filter.
///
/// Returns [`SstableError::Corruption`] for anything that is not a
/// completely written table; the caller decides whether that is fatal.
fn open_table(path: &Path, file_name: &str, seq: u64) -> Result<TableHandle, SstableError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len() as usize;
    if file_len < FOOTER_SIZE {
        return Err(SstableError::Corruption(format!(
            "file is {file_len} bytes, smaller than the footer"
        )));
    }

    // Safety: the mapping is read-only and tables are never modified after
    // the final fsync; all region bounds are validated before slicing.
    let mmap = unsafe { Mmap::map(&file)? };

    let footer = Footer::decode(&mmap[file_len - FOOTER_SIZE..])?;

    let index_start = footer.index_offset as usize;
    let index_end = index_start + footer.index_size as usize;
    let bloom_start = footer.bloom_offset as usize;
    let bloom_end = bloom_start + footer.bloom_size as usize;
    if index_end > file_len || bloom_end > file_len {
        return Err(SstableError::Corruption(
            "index or bloom region exceeds the file".into(),
        ));
    }

    let index = parse_index(&mmap[index_start..index_end])?;
    let bloom = BloomFilter::decode(&mmap[bloom_start..bloom_end])
        .ok_or_else(|| SstableError::Corruption("malformed bloom filter region".into()))?;

    Ok(TableHandle {
        file_name: file_name.to_string(),
        seq,
        mmap,
        index,
        bloom,
        data_region_size: index_start,
    })
}

/// Parses the index region: `[key_len][key][offset]` repeated.
fn parse_index(region: &[u8]) -> Result<Vec<IndexEntry>, SstableError> {
    let mut index = Vec::new();
    let mut at = 0;

    while at < region.len() {
        let key_len = read_u32(region, at)? as usize;
        at += U32_SIZE;

        let key_bytes = region
            .get(at..at + key_len)
            .ok_or_else(|| SstableError::Corruption("index key exceeds region".into()))?;
        let key = String::from_utf8(key_bytes.to_vec())
            .map_err(|_| SstableError::Corruption("index key is not UTF-8".into()))?;
        at += key_len;

        let offset = read_u32(region, at)?;
        at += U32_SIZE;

        index.push(IndexEntry { key, offset });
    }

    Ok(index)
}

// ------------------------------------------------------------------------------------------------
// Block search
// ------------------------------------------------------------------------------------------------

/// Probes one table for a key: index → block → restart group → linear scan.
fn search_table(table: &TableHandle, key: &str) -> Result<Option<TableHit>, SstableError> {
    if table.index.is_empty() {
        return Ok(None);
    }

    // Greatest index entry whose first key ≤ query; the query may precede
    // the whole table, in which case block 0 is scanned and misses.
    let pos = table.index.partition_point(|e| e.key.as_str() <= key);
    let block_idx = pos.saturating_sub(1);

    let block_start = table.index[block_idx].offset as usize;
    let block_end = if block_idx + 1 == table.index.len() {
        table.data_region_size
    } else {
        table.index[block_idx + 1].offset as usize
    };
    let block = table
        .mmap
        .get(block_start..block_end)
        .ok_or_else(|| SstableError::Corruption("data block exceeds the file".into()))?;

    search_block(block, key.as_bytes())
}

/// Searches a single data block: restart binary search, then a forward
/// scan reconstructing prefix-compressed keys.
fn search_block(block: &[u8], key: &[u8]) -> Result<Option<TableHit>, SstableError> {
    // The trailer is parsed from the tail: count last, offsets before it.
    if block.len() < U32_SIZE {
        return Err(SstableError::Corruption("block smaller than trailer".into()));
    }
    let restart_count = read_u32(block, block.len() - U32_SIZE)? as usize;
    let trailer_size = (restart_count + 1) * U32_SIZE;
    if trailer_size > block.len() {
        return Err(SstableError::Corruption("restart table exceeds block".into()));
    }
    let entries_end = block.len() - trailer_size;

    let mut restarts = Vec::with_capacity(restart_count);
    for i in 0..restart_count {
        restarts.push(read_u32(block, entries_end + i * U32_SIZE)? as usize);
    }

    if restarts.is_empty() {
        return Ok(None);
    }

    // Greatest restart entry whose (full) key ≤ query.
    let mut low = 0usize;
    let mut high = restarts.len() - 1;
    let mut group = 0usize;
    while low <= high {
        let mid = low + (high - low) / 2;
        if restart_key(block, entries_end, restarts[mid])? <= key {
            group = mid;
            low = mid + 1;
        } else if mid == 0 {
            break;
        } else {
            high = mid - 1;
        }
    }

    // Linear scan forward from the restart point.
    let mut at = restarts[group];
    let mut prev_key: Vec<u8> = Vec::new();
    while at < entries_end {
        let shared = read_u32(block, at)? as usize;
        let unshared = read_u32(block, at + U32_SIZE)? as usize;
        let value_len = read_u32(block, at + 2 * U32_SIZE)? as usize;
        at += 3 * U32_SIZE;

        let suffix = block
            .get(at..at + unshared)
            .ok_or_else(|| SstableError::Corruption("entry key exceeds block".into()))?;
        at += unshared;

        if shared > prev_key.len() {
            return Err(SstableError::Corruption(
                "shared prefix exceeds previous key".into(),
            ));
        }
        let mut current = Vec::with_capacity(shared + unshared);
        current.extend_from_slice(&prev_key[..shared]);
        current.extend_from_slice(suffix);

        let value = block
            .get(at..at + value_len)
            .ok_or_else(|| SstableError::Corruption("entry value exceeds block".into()))?;
        at += value_len;

        if current == key {
            return Ok(Some(if value == TOMBSTONE {
                TableHit::Tombstone
            } else {
                TableHit::Value(value.to_vec())
            }));
        }

        prev_key = current;
    }

    Ok(None)
}

/// Full key stored at a restart point (`shared = 0`, suffix is the key).
fn restart_key(block: &[u8], entries_end: usize, restart: usize) -> Result<&[u8], SstableError> {
    if restart + 3 * U32_SIZE > entries_end {
        return Err(SstableError::Corruption("restart offset exceeds block".into()));
    }
    let unshared = read_u32(block, restart + U32_SIZE)? as usize;
    let key_at = restart + 3 * U32_SIZE;
    block
        .get(key_at..key_at + unshared)
        .ok_or_else(|| SstableError::Corruption("restart key exceeds block".into()))
}

/// Little-endian `u32` at `at`, bounds-checked.
fn read_u32(buf: &[u8], at: usize) -> Result<u32, SstableError> {
    buf.get(at..at + U32_SIZE)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| SstableError::Corruption("unexpected end of region".into()))
}
