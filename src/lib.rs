//! # Tidepool
//!
//! An embeddable, persistent key-value storage engine built on a
//! **Log-Structured Merge Tree (LSM-tree)** architecture. Designed for a
//! single logical writer, concurrent readers, and crash-safe operation.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                        Db                              │
//! │  ┌────────────┐  ┌──────────────┐  ┌───────────────┐   │
//! │  │  Active    │  │  Read-only   │  │   SSTables    │   │
//! │  │  MemTable  │  │  MemTables   │  │  (on disk)    │   │
//! │  └─────┬──────┘  └──────┬───────┘  └──────┬────────┘   │
//! │        │   rotate       │   flush         │            │
//! │        └─────────►      └────────►        │            │
//! │                                           │            │
//! │  ┌──────────────┐           ┌─────────────┴──────────┐ │
//! │  │   WAL.log    │           │  Flusher (worker pool) │ │
//! │  └──────────────┘           └────────────────────────┘ │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`db`] | Engine facade — open, put, get, delete, close |
//! | [`skiplist`] | Probabilistic ordered map backing the memtable |
//! | [`bloom`] | Bloom filter for per-SSTable key membership |
//! | [`wal`] | CRC-protected write-ahead log for crash recovery |
//! | [`memtable`] | In-memory write buffer with tombstones and freezing |
//! | [`sstable`] | Immutable on-disk tables with block prefix compression |
//! | [`flusher`] | Background worker pool flushing frozen memtables |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is fsynced to a WAL before
//!   being acknowledged, guaranteeing durability and crash recovery.
//! - **Tombstone deletes** — a delete shadows all older versions of a key
//!   across every storage tier.
//! - **Bloom filter lookups** — each SSTable carries a bloom filter for
//!   fast negative point-lookup responses.
//! - **Restart-point prefix compression** — data blocks share key prefixes
//!   between entries while remaining binary-searchable.
//! - **Background flushing** — frozen memtables drain to disk on a worker
//!   pool without blocking the write path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidepool::{Db, DbConfig};
//!
//! let db = Db::open("/tmp/my_db", DbConfig::default()).unwrap();
//!
//! // Write
//! db.put("hello", b"world").unwrap();
//!
//! // Read
//! assert_eq!(db.get("hello").unwrap(), Some(b"world".to_vec()));
//!
//! // Delete
//! db.delete("hello").unwrap();
//! assert_eq!(db.get("hello").unwrap(), None);
//!
//! // Graceful shutdown
//! db.close().unwrap();
//! ```

pub mod bloom;
pub mod db;
pub mod flusher;
pub mod memtable;
pub mod skiplist;
pub mod sstable;
pub mod wal;

pub use db::{Db, DbConfig, DbError};
