use super::{SkipList, SkipListError};

#[test]
fn test_rejects_zero_max_level() {
    let result = SkipList::<Vec<u8>>::new(0, 50);
    assert_eq!(result.err(), Some(SkipListError::InvalidMaxLevel(0)));
}

#[test]
fn test_rejects_probability_above_100() {
    let result = SkipList::<Vec<u8>>::new(4, 101);
    assert_eq!(result.err(), Some(SkipListError::InvalidProbability(101)));
}

#[test]
fn test_boundary_probabilities_accepted() {
    assert!(SkipList::<u32>::new(4, 0).is_ok());
    assert!(SkipList::<u32>::new(4, 100).is_ok());
    assert!(SkipList::<u32>::new(1, 50).is_ok());
}

#[test]
fn test_insert_and_search() {
    let mut list = SkipList::new(4, 50).unwrap();
    list.insert("b", 2u32);
    list.insert("a", 1u32);
    list.insert("c", 3u32);

    assert_eq!(list.search("a"), Some(&1));
    assert_eq!(list.search("b"), Some(&2));
    assert_eq!(list.search("c"), Some(&3));
    assert_eq!(list.search("d"), None);
}

#[test]
fn test_search_empty_list() {
    let list = SkipList::<u32>::new(4, 50).unwrap();
    assert_eq!(list.search("anything"), None);
    assert!(list.is_empty());
}

#[test]
fn test_upsert_overwrites_value() {
    let mut list = SkipList::new(4, 50).unwrap();
    list.insert("key", b"old".to_vec());
    list.insert("key", b"new".to_vec());

    assert_eq!(list.search("key"), Some(&b"new".to_vec()));
    // A single node, yet two counted insertions.
    assert_eq!(list.iter().count(), 1);
    assert_eq!(list.len(), 2);
}

#[test]
fn test_iter_yields_ascending_key_order() {
    let mut list = SkipList::new(8, 50).unwrap();
    for key in ["pear", "apple", "fig", "banana", "cherry"] {
        list.insert(key, ());
    }

    let keys: Vec<&str> = list.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["apple", "banana", "cherry", "fig", "pear"]);
}

#[test]
fn test_len_counts_inserts_not_keys() {
    let mut list = SkipList::new(4, 50).unwrap();
    for _ in 0..5 {
        list.insert("same", 0u8);
    }
    list.insert("other", 1u8);

    assert_eq!(list.len(), 6);
    assert_eq!(list.iter().count(), 2);
}

#[test]
fn test_many_keys_stay_sorted() {
    let mut list = SkipList::new(12, 50).unwrap();
    // Insert in a scattered order: evens descending, then odds ascending.
    for i in (0..500).step_by(2).rev() {
        list.insert(&format!("key-{i:04}"), i);
    }
    for i in (1..500).step_by(2) {
        list.insert(&format!("key-{i:04}"), i);
    }

    let keys: Vec<String> = list.iter().map(|(k, _)| k.to_string()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(keys.len(), 500);

    for i in 0..500 {
        assert_eq!(list.search(&format!("key-{i:04}")), Some(&i));
    }
}

#[test]
fn test_single_level_degrades_to_linked_list() {
    let mut list = SkipList::new(1, 50).unwrap();
    for i in 0..50 {
        list.insert(&format!("{i:02}"), i);
    }
    assert_eq!(list.search("25"), Some(&25));
    assert_eq!(list.iter().count(), 50);
}
