use crate::memtable::{MemTable, MemTableEntry, SearchResult, TOMBSTONE};

#[test]
fn test_insert_and_search() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.insert("key1", b"value1").unwrap();
    assert_eq!(
        memtable.search("key1").unwrap(),
        SearchResult::Value(b"value1".to_vec())
    );
}

#[test]
fn test_search_missing_key() {
    let memtable = MemTable::new(4, 50).unwrap();
    assert_eq!(memtable.search("ghost").unwrap(), SearchResult::NotFound);
}

#[test]
fn test_delete_yields_tombstone() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.insert("key1", b"value1").unwrap();
    memtable.delete("key1").unwrap();

    assert_eq!(memtable.search("key1").unwrap(), SearchResult::Tombstone);
}

#[test]
fn test_delete_of_absent_key_still_tombstones() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.delete("never-written").unwrap();
    assert_eq!(
        memtable.search("never-written").unwrap(),
        SearchResult::Tombstone
    );
}

#[test]
fn test_overwrite_replaces_value() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.insert("key", b"old").unwrap();
    memtable.insert("key", b"new").unwrap();

    assert_eq!(
        memtable.search("key").unwrap(),
        SearchResult::Value(b"new".to_vec())
    );
}

#[test]
fn test_insert_after_delete_revives_key() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.insert("key", b"v1").unwrap();
    memtable.delete("key").unwrap();
    memtable.insert("key", b"v2").unwrap();

    assert_eq!(
        memtable.search("key").unwrap(),
        SearchResult::Value(b"v2".to_vec())
    );
}

#[test]
fn test_len_counts_insertions() {
    let memtable = MemTable::new(4, 50).unwrap();
    assert!(memtable.is_empty());

    memtable.insert("a", b"1").unwrap();
    memtable.insert("a", b"2").unwrap();
    memtable.delete("a").unwrap();

    // Three mutations on one key: len counts the work, not the keys.
    assert_eq!(memtable.len(), 3);
}

#[test]
fn test_entries_sorted_with_tombstone_flags() {
    let memtable = MemTable::new(4, 50).unwrap();

    memtable.insert("banana", b"yellow").unwrap();
    memtable.insert("apple", b"red").unwrap();
    memtable.delete("cherry").unwrap();

    let entries = memtable.entries().unwrap();
    assert_eq!(
        entries,
        vec![
            MemTableEntry {
                key: "apple".to_string(),
                value: b"red".to_vec(),
                tombstone: false,
            },
            MemTableEntry {
                key: "banana".to_string(),
                value: b"yellow".to_vec(),
                tombstone: false,
            },
            MemTableEntry {
                key: "cherry".to_string(),
                value: Vec::new(),
                tombstone: true,
            },
        ]
    );
}

#[test]
fn test_literal_tombstone_value_reads_as_deleted() {
    let memtable = MemTable::new(4, 50).unwrap();

    // Storing the sentinel bytes directly is indistinguishable from a
    // delete; the in-line encoding makes that explicit.
    memtable.insert("key", TOMBSTONE).unwrap();
    assert_eq!(memtable.search("key").unwrap(), SearchResult::Tombstone);
}
