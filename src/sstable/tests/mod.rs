mod tests_corruption;

use std::path::Path;

use crate::memtable::MemTable;
use crate::sstable::{SSTABLE_DIR, build_from_memtable, sstable_file_name};

/// Builds a memtable from `(key, value)` pairs; a `None` value is a delete.
pub(crate) fn memtable_from(pairs: &[(&str, Option<&[u8]>)]) -> MemTable {
    let memtable = MemTable::new(4, 50).unwrap();
    for (key, value) in pairs {
        match value {
            Some(value) => memtable.insert(key, value).unwrap(),
            None => memtable.delete(key).unwrap(),
        }
    }
    memtable.freeze().unwrap();
    memtable
}

/// Creates `<db>/sstables/` and writes the memtable as table `seq`.
pub(crate) fn write_table(db_dir: &Path, seq: u64, memtable: &MemTable, block_size: usize) {
    let dir = db_dir.join(SSTABLE_DIR);
    std::fs::create_dir_all(&dir).unwrap();
    build_from_memtable(&dir.join(sstable_file_name(seq)), memtable, block_size).unwrap();
}
