use super::{memtable_from, write_table};
use crate::sstable::{SSTABLE_DIR, SstSearcher, sstable_file_name};
use std::fs::OpenOptions;
use tempfile::TempDir;

fn table_path(db_dir: &std::path::Path, seq: u64) -> std::path::PathBuf {
    db_dir.join(SSTABLE_DIR).join(sstable_file_name(seq))
}

#[test]
fn test_truncated_table_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let memtable = memtable_from(&[("key", Some(b"value"))]);
    write_table(tmp.path(), 0, &memtable, 4096);

    // Chop the last byte: the footer no longer validates.
    let path = table_path(tmp.path(), 0);
    let len = std::fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len - 1).unwrap();
    file.sync_all().unwrap();

    let searcher = SstSearcher::new(tmp.path());
    searcher.start().unwrap();

    assert_eq!(searcher.table_count(), 0);
    assert_eq!(searcher.search("key").unwrap(), None);
}

#[test]
fn test_partial_table_does_not_hide_complete_ones() {
    let tmp = TempDir::new().unwrap();
    let good = memtable_from(&[("key", Some(b"durable"))]);
    write_table(tmp.path(), 0, &good, 4096);

    // A crash leftover: some bytes, no valid footer.
    std::fs::write(table_path(tmp.path(), 1), b"partial flush wreckage").unwrap();

    let searcher = SstSearcher::new(tmp.path());
    searcher.start().unwrap();

    assert_eq!(searcher.table_count(), 1);
    assert_eq!(searcher.search("key").unwrap(), Some(b"durable".to_vec()));
}

#[test]
fn test_tiny_file_is_skipped() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join(SSTABLE_DIR)).unwrap();
    std::fs::write(table_path(tmp.path(), 5), b"abc").unwrap();

    let searcher = SstSearcher::new(tmp.path());
    searcher.start().unwrap();
    assert_eq!(searcher.table_count(), 0);
}

#[test]
fn test_foreign_files_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let memtable = memtable_from(&[("key", Some(b"value"))]);
    write_table(tmp.path(), 0, &memtable, 4096);

    std::fs::write(tmp.path().join(SSTABLE_DIR).join("notes.txt"), b"hello").unwrap();
    std::fs::write(tmp.path().join(SSTABLE_DIR).join("backup.sst.bak"), b"x").unwrap();

    let searcher = SstSearcher::new(tmp.path());
    searcher.start().unwrap();

    assert_eq!(searcher.table_count(), 1);
    assert_eq!(searcher.search("key").unwrap(), Some(b"value".to_vec()));
}

#[test]
fn test_wrong_magic_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let memtable = memtable_from(&[("key", Some(b"value"))]);
    write_table(tmp.path(), 0, &memtable, 4096);

    // Overwrite the magic number in place.
    let path = table_path(tmp.path(), 0);
    let mut bytes = std::fs::read(&path).unwrap();
    let at = bytes.len() - 4;
    bytes[at..].copy_from_slice(&0xDEAD_u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let searcher = SstSearcher::new(tmp.path());
    searcher.start().unwrap();
    assert_eq!(searcher.table_count(), 0);
}
