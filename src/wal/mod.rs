//! Write-Ahead Logging (WAL) Module
//!
//! A durable, append-only log of logical operations. Every mutation accepted
//! by the engine is appended (and fsynced) here before it touches the
//! memtable, so a crash at any point can be recovered by replaying the log.
//!
//! ## Design Overview
//!
//! The WAL records three operation kinds: `PUT`, `DEL`, and `FLUSH`. The
//! first two carry a key and value; `FLUSH` is a checkpoint marker appended
//! after a memtable has been durably flushed to an SSTable. On replay, a
//! `FLUSH` marker discards everything accumulated before it — those records
//! already live in a table on disk.
//!
//! # On-disk layout
//!
//! All integers are **big-endian** (the one format in this crate that is —
//! SSTables are little-endian throughout).
//!
//! ```text
//! [length:u32][payload][crc32:u32]
//! [length:u32][payload][crc32:u32]
//! ...
//! ```
//!
//! - `payload = [op:u8][key_len:u32][val_len:u32][key][value]`
//! - `length` counts `payload + crc32` bytes; a zero length is corruption.
//! - `crc32` is the IEEE CRC32 of the payload.
//!
//! # Concurrency model
//!
//! The file handle is guarded by a `Mutex`, shared between the single
//! writer (appends) and the flusher workers (checkpoint markers). Replay
//! seeks to the start under the same lock; `O_APPEND` keeps writes at the
//! tail regardless of the read cursor.
//!
//! # Guarantees
//!
//! - **Durability:** every [`Wal::append`] ends with an `fsync` via
//!   [`File::sync_all`] before returning success.
//! - **Integrity:** record checksums are verified during replay.
//! - **Corruption detection:** replay halts at the first unreadable record
//!   and surfaces the error; earlier records are preserved.

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use crc32fast::Hasher as Crc32;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// File name of the write-ahead log inside the database directory.
pub const WAL_FILE_NAME: &str = "WAL.log";

const U32_SIZE: usize = size_of::<u32>();
const OP_SIZE: usize = size_of::<u8>();

/// Fixed payload overhead: op byte plus the two length fields.
const PAYLOAD_HEADER_SIZE: usize = OP_SIZE + 2 * U32_SIZE;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by WAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WalError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record framed with `length == 0`.
    #[error("zero-length WAL record")]
    ZeroLengthRecord,

    /// Data integrity failure — checksum did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The file ended inside a record frame.
    #[error("truncated WAL record")]
    TruncatedRecord,

    /// The declared key/value lengths disagree with the record length.
    #[error("record length mismatch")]
    LengthMismatch,

    /// An unrecognised operation byte.
    #[error("unknown WAL op code: {0}")]
    UnknownOp(u8),

    /// A key that is not valid UTF-8.
    #[error("invalid UTF-8 key: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Internal consistency or locking error.
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Operations and records
// ------------------------------------------------------------------------------------------------

/// Logical operation kinds recorded in the WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalOp {
    /// Key deletion; carries an empty value.
    Delete = 0,

    /// Key insertion or update.
    Put = 1,

    /// Checkpoint marker: everything before it has reached an SSTable.
    Flush = 2,
}

impl WalOp {
    fn from_u8(byte: u8) -> Result<Self, WalError> {
        match byte {
            0 => Ok(Self::Delete),
            1 => Ok(Self::Put),
            2 => Ok(Self::Flush),
            other => Err(WalError::UnknownOp(other)),
        }
    }
}

/// A replayed logical operation. [`Wal::load`] only ever yields `Put` and
/// `Delete` records; `Flush` markers are consumed during replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Operation kind.
    pub op: WalOp,

    /// The key the operation applies to.
    pub key: String,

    /// The value; empty for deletes.
    pub value: Vec<u8>,
}

// ------------------------------------------------------------------------------------------------
// WAL Core
// ------------------------------------------------------------------------------------------------

/// A durable append-only log of engine mutations.
///
/// See the [module-level documentation](self) for format, concurrency, and
/// guarantees.
#[derive(Debug)]
pub struct Wal {
    /// Shared file handle; appends and replays serialize on this lock.
    file: Mutex<File>,

    /// Path to the WAL file on disk.
    path: PathBuf,
}

impl Wal {
    /// Opens (or creates) the WAL inside the given database directory.
    ///
    /// The file is opened read-write in append mode; writes always land at
    /// the tail even after a replay has moved the read cursor.
    pub fn open<P: AsRef<Path>>(db_dir: P) -> Result<Self, WalError> {
        let path = db_dir.as_ref().join(WAL_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        info!(path = %path.display(), size = file.metadata()?.len(), "WAL opened");

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    /// Appends one record and fsyncs before returning.
    ///
    /// On error nothing is considered durable; the caller must not apply
    /// the operation to in-memory state.
    pub fn append(&self, op: WalOp, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        let entry = encode_record(op, key, value);

        let mut guard = self
            .file
            .lock()
            .map_err(|_| WalError::Internal("WAL mutex poisoned".into()))?;

        guard.write_all(&entry)?;
        guard.sync_all()?;

        trace!(op = ?op, key_len = key.len(), val_len = value.len(), "WAL record appended");
        Ok(())
    }

    /// Appends a `FLUSH` checkpoint marker.
    ///
    /// Called by the flusher after an SSTable has been written and fsynced;
    /// subsequent replays drop every record preceding the marker.
    pub fn append_flush(&self) -> Result<(), WalError> {
        self.append(WalOp::Flush, b"", b"")
    }

    /// Replays the full log from the start.
    ///
    /// Returns the accumulated `Put`/`Delete` records in append order,
    /// minus anything preceding a `FLUSH` marker. The first unreadable
    /// record aborts the replay with its error.
    pub fn load(&self) -> Result<Vec<WalRecord>, WalError> {
        debug!(path = %self.path.display(), "WAL replay started");

        let mut guard = self
            .file
            .lock()
            .map_err(|_| WalError::Internal("WAL mutex poisoned".into()))?;
        guard.seek(SeekFrom::Start(0))?;

        let mut records = Vec::new();
        loop {
            let length = match read_record_length(&mut guard)? {
                Some(length) => length,
                None => break,
            };

            if length == 0 {
                warn!(path = %self.path.display(), "zero-length WAL record");
                return Err(WalError::ZeroLengthRecord);
            }

            let mut frame = vec![0u8; length as usize];
            match guard.read_exact(&mut frame) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(length, "WAL truncated record (partial payload)");
                    return Err(WalError::TruncatedRecord);
                }
                Err(e) => return Err(WalError::Io(e)),
            }

            let record = decode_record(&frame)?;
            if record.op == WalOp::Flush {
                // Everything before the marker already lives in an SSTable.
                trace!(dropped = records.len(), "WAL flush marker reached");
                records.clear();
            } else {
                records.push(record);
            }
        }

        debug!(count = records.len(), "WAL replay finished");
        Ok(records)
    }

    /// Flushes the underlying file to stable storage.
    pub fn sync(&self) -> Result<(), WalError> {
        let guard = self
            .file
            .lock()
            .map_err(|_| WalError::Internal("WAL mutex poisoned".into()))?;
        guard.sync_all()?;
        Ok(())
    }

    /// Path of the underlying WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        match self.file.lock() {
            Ok(guard) => {
                if let Err(e) = guard.sync_all() {
                    error!(path = %self.path.display(), error = %e, "WAL sync failed on drop");
                }
            }
            Err(poisoned) => {
                let file = poisoned.into_inner();
                if let Err(e) = file.sync_all() {
                    error!(path = %self.path.display(), error = %e, "WAL sync failed on drop (poisoned lock)");
                }
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Record codec
// ------------------------------------------------------------------------------------------------

/// Encodes one record frame: `[length][payload][crc32]`, all big-endian.
fn encode_record(op: WalOp, key: &[u8], value: &[u8]) -> Vec<u8> {
    let payload_len = PAYLOAD_HEADER_SIZE + key.len() + value.len();

    let mut payload = Vec::with_capacity(payload_len);
    payload.push(op as u8);
    payload.extend_from_slice(&(key.len() as u32).to_be_bytes());
    payload.extend_from_slice(&(value.len() as u32).to_be_bytes());
    payload.extend_from_slice(key);
    payload.extend_from_slice(value);

    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let checksum = hasher.finalize();

    let length = (payload_len + U32_SIZE) as u32;
    let mut entry = Vec::with_capacity(U32_SIZE + payload_len + U32_SIZE);
    entry.extend_from_slice(&length.to_be_bytes());
    entry.extend_from_slice(&payload);
    entry.extend_from_slice(&checksum.to_be_bytes());

    entry
}

/// Decodes one record frame (`payload + crc32`), verifying the checksum and
/// the declared key/value lengths.
fn decode_record(frame: &[u8]) -> Result<WalRecord, WalError> {
    if frame.len() < PAYLOAD_HEADER_SIZE + U32_SIZE {
        return Err(WalError::TruncatedRecord);
    }

    let payload_len = frame.len() - U32_SIZE;
    let payload = &frame[..payload_len];

    let expected = u32::from_be_bytes(
        frame[payload_len..]
            .try_into()
            .map_err(|_| WalError::TruncatedRecord)?,
    );
    let mut hasher = Crc32::new();
    hasher.update(payload);
    if hasher.finalize() != expected {
        return Err(WalError::ChecksumMismatch);
    }

    let op = WalOp::from_u8(payload[0])?;
    let key_len = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]) as usize;
    let val_len = u32::from_be_bytes([payload[5], payload[6], payload[7], payload[8]]) as usize;

    if PAYLOAD_HEADER_SIZE + key_len + val_len != payload_len {
        return Err(WalError::LengthMismatch);
    }

    let key =
        String::from_utf8(payload[PAYLOAD_HEADER_SIZE..PAYLOAD_HEADER_SIZE + key_len].to_vec())?;
    let value = payload[PAYLOAD_HEADER_SIZE + key_len..].to_vec();

    Ok(WalRecord { op, key, value })
}

/// Reads the next length prefix. `Ok(None)` is clean end-of-file; a partial
/// prefix is a truncated record.
fn read_record_length(file: &mut File) -> Result<Option<u32>, WalError> {
    let mut buf = [0u8; U32_SIZE];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WalError::TruncatedRecord);
        }
        filled += n;
    }
    Ok(Some(u32::from_be_bytes(buf)))
}
