//! # WAL — Write-Ahead Log
//!
//! Provides crash-safe durability for the StratumKV storage engine.
//!
//! Every mutation (`put` or `delete`) is appended as a line of UTF-8 text to
//! an append-only file **before** the corresponding memtable update. On
//! restart the WAL is replayed to reconstruct the mutable memtable,
//! guaranteeing that no acknowledged write is lost.
//!
//! ## Line format
//!
//! ```text
//! <key>=<value-or-tombstone-marker>\n
//! ```
//!
//! The key/value split happens on the *first* `=` — a value may itself
//! contain `=` bytes. A value equal to [`memtable::TOMBSTONE_MARKER`] marks
//! a deletion.
//!
//! ## Example
//!
//! ```rust,no_run
//! use memtable::{Memtable, Record};
//! use wal::Wal;
//!
//! let mut w = Wal::open("wal.log", true).unwrap();
//! w.append(b"hello", &Record::Value(b"world".to_vec())).unwrap();
//! drop(w);
//!
//! let w = Wal::open("wal.log", true).unwrap();
//! let mut mem = Memtable::new();
//! w.replay_into(&mut mem).unwrap();
//! ```

use memtable::{Memtable, Record, TOMBSTONE_MARKER};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only, line-oriented write-ahead log.
///
/// Every [`append`](Wal::append) writes one line; when `sync` is `true` it
/// also fsyncs before returning, so a write the caller has been told
/// succeeded is durable on disk. With `sync` `false`, an append is
/// guaranteed written to the OS buffer but may still be lost on a crash
/// before the next fsync. The struct has no internal locking of its own —
/// callers (the engine) serialize access with an external lock, matching
/// every other method's "mutually exclusive" contract in this crate's
/// design.
pub struct Wal {
    path: PathBuf,
    file: File,
    sync: bool,
}

impl Wal {
    /// Opens (creating if necessary) a WAL file in append mode.
    ///
    /// If `sync` is `true`, every [`append`](Wal::append) is followed by an
    /// `fsync`.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        Ok(Self { path, file, sync })
    }

    /// Appends one record as `key=value-or-tombstone-marker\n`, fsyncing
    /// afterward if this WAL was opened with `sync: true`.
    ///
    /// A write accepted by this call with `sync: true` is guaranteed
    /// durable on disk: callers upstream (the engine) rely on this to
    /// satisfy "every write accepted by put/delete is present in the WAL
    /// before the call returns".
    pub fn append(&mut self, key: &[u8], value: &Record) -> Result<(), WalError> {
        let value_bytes: &[u8] = match value {
            Record::Value(v) => v.as_slice(),
            Record::Tombstone => TOMBSTONE_MARKER,
        };

        let mut line = Vec::with_capacity(key.len() + value_bytes.len() + 2);
        line.extend_from_slice(key);
        line.push(b'=');
        line.extend_from_slice(value_bytes);
        line.push(b'\n');

        self.file.write_all(&line)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Truncates the WAL to zero length and reopens it for append.
    ///
    /// Called by the engine only after every memtable the WAL covers has
    /// been durably flushed to an SSTable.
    pub fn clear(&mut self) -> Result<(), WalError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .read(true)
            .open(&self.path)?;
        self.file = file;
        Ok(())
    }

    /// Replays every line of the WAL into `memtable`.
    ///
    /// Lines are read independently of this handle's write position, so
    /// replay may be called at any time (typically once, at engine
    /// construction). A line with no `=` separator is malformed — it is
    /// logged and skipped rather than treated as fatal, per the WAL's
    /// `Corruption` policy.
    pub fn replay_into(&self, memtable: &mut Memtable) -> Result<(), WalError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((key, raw_value)) => {
                    if key.is_empty() {
                        warn!(line_no, "skipping WAL line with empty key");
                        continue;
                    }
                    let record = if raw_value.as_bytes() == TOMBSTONE_MARKER {
                        Record::Tombstone
                    } else {
                        Record::Value(raw_value.as_bytes().to_vec())
                    };
                    // Replay cannot fail on an empty key here since it was
                    // just checked above; mismatches are a logic bug.
                    let _ = memtable.put(key.as_bytes().to_vec(), record);
                }
                None => {
                    warn!(line_no, line, "skipping malformed WAL line (no '=' separator)");
                }
            }
        }

        Ok(())
    }

    /// Flushes and releases the underlying file handle.
    pub fn close(mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
