use super::init_tracing;
use crate::db::{Db, DbConfig, DbError};
use tempfile::TempDir;

fn assert_rejected(config: DbConfig) {
    let tmp = TempDir::new().unwrap();
    match Db::open(tmp.path(), config) {
        Err(DbError::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_default_config_is_valid() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let db = Db::open(tmp.path(), DbConfig::default()).unwrap();
    db.close().unwrap();
}

#[test]
fn test_zero_max_level_rejected() {
    init_tracing();
    assert_rejected(DbConfig {
        max_level: 0,
        ..DbConfig::default()
    });
}

#[test]
fn test_probability_above_100_rejected() {
    init_tracing();
    assert_rejected(DbConfig {
        probability: 101,
        ..DbConfig::default()
    });
}

#[test]
fn test_zero_max_entries_rejected() {
    init_tracing();
    assert_rejected(DbConfig {
        max_entries: 0,
        ..DbConfig::default()
    });
}

#[test]
fn test_zero_flush_workers_rejected() {
    init_tracing();
    assert_rejected(DbConfig {
        flush_workers: 0,
        ..DbConfig::default()
    });
}

#[test]
fn test_zero_block_size_rejected() {
    init_tracing();
    assert_rejected(DbConfig {
        block_size: 0,
        ..DbConfig::default()
    });
}

#[test]
fn test_boundary_probabilities_accepted() {
    init_tracing();
    for probability in [0, 100] {
        let tmp = TempDir::new().unwrap();
        let db = Db::open(
            tmp.path(),
            DbConfig {
                probability,
                ..DbConfig::default()
            },
        )
        .unwrap();
        db.put("key", b"value").unwrap();
        assert_eq!(db.get("key").unwrap(), Some(b"value".to_vec()));
        db.close().unwrap();
    }
}
