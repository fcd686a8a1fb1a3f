use crate::memtable::{MemTable, MemTableError, SearchResult};

#[test]
fn test_frozen_rejects_insert() {
    let memtable = MemTable::new(4, 50).unwrap();
    memtable.insert("key", b"value").unwrap();
    memtable.freeze().unwrap();

    assert!(matches!(
        memtable.insert("key2", b"value2"),
        Err(MemTableError::Frozen)
    ));
}

#[test]
fn test_frozen_rejects_delete() {
    let memtable = MemTable::new(4, 50).unwrap();
    memtable.insert("key", b"value").unwrap();
    memtable.freeze().unwrap();

    assert!(matches!(
        memtable.delete("key"),
        Err(MemTableError::Frozen)
    ));
}

#[test]
fn test_frozen_still_serves_reads() {
    let memtable = MemTable::new(4, 50).unwrap();
    memtable.insert("key", b"value").unwrap();
    memtable.delete("other").unwrap();
    memtable.freeze().unwrap();

    assert_eq!(
        memtable.search("key").unwrap(),
        SearchResult::Value(b"value".to_vec())
    );
    assert_eq!(memtable.search("other").unwrap(), SearchResult::Tombstone);
    assert_eq!(memtable.entries().unwrap().len(), 2);
}

#[test]
fn test_freeze_is_idempotent() {
    let memtable = MemTable::new(4, 50).unwrap();
    memtable.freeze().unwrap();
    memtable.freeze().unwrap();
    assert!(memtable.is_frozen());
}

#[test]
fn test_failed_insert_leaves_state_unchanged() {
    let memtable = MemTable::new(4, 50).unwrap();
    memtable.insert("key", b"value").unwrap();
    memtable.freeze().unwrap();

    let _ = memtable.insert("key", b"mutated");
    assert_eq!(
        memtable.search("key").unwrap(),
        SearchResult::Value(b"value".to_vec())
    );
    assert_eq!(memtable.len(), 1);
}
