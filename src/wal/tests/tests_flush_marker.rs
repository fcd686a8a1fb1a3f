use super::init_tracing;
use crate::wal::{Wal, WalOp};
use tempfile::TempDir;

#[test]
fn test_flush_marker_discards_preceding_records() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let wal = Wal::open(tmp.path()).unwrap();

    wal.append(WalOp::Put, b"a", b"1").unwrap();
    wal.append(WalOp::Put, b"b", b"2").unwrap();
    wal.append_flush().unwrap();
    wal.append(WalOp::Put, b"c", b"3").unwrap();

    let replayed = wal.load().unwrap();
    let keys: Vec<&str> = replayed.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, vec!["c"]);
}

#[test]
fn test_flush_marker_at_tail_drops_everything() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let wal = Wal::open(tmp.path()).unwrap();

    wal.append(WalOp::Put, b"a", b"1").unwrap();
    wal.append(WalOp::Delete, b"a", b"").unwrap();
    wal.append_flush().unwrap();

    assert_eq!(wal.load().unwrap(), Vec::new());
}

#[test]
fn test_multiple_flush_markers_keep_only_the_tail() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let wal = Wal::open(tmp.path()).unwrap();

    wal.append(WalOp::Put, b"a", b"1").unwrap();
    wal.append_flush().unwrap();
    wal.append(WalOp::Put, b"b", b"2").unwrap();
    wal.append(WalOp::Put, b"c", b"3").unwrap();
    wal.append_flush().unwrap();
    wal.append(WalOp::Put, b"d", b"4").unwrap();
    wal.append(WalOp::Delete, b"d", b"").unwrap();

    let replayed = wal.load().unwrap();
    let keys: Vec<(&str, WalOp)> = replayed.iter().map(|r| (r.key.as_str(), r.op)).collect();
    assert_eq!(keys, vec![("d", WalOp::Put), ("d", WalOp::Delete)]);
}

#[test]
fn test_flush_marker_survives_reopen() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    {
        let wal = Wal::open(tmp.path()).unwrap();
        wal.append(WalOp::Put, b"gone", b"1").unwrap();
        wal.append_flush().unwrap();
        wal.append(WalOp::Put, b"kept", b"2").unwrap();
    }

    let wal = Wal::open(tmp.path()).unwrap();
    let replayed = wal.load().unwrap();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].key, "kept");
}
