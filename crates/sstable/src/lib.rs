//! # SSTable — Sorted String Table
//!
//! Immutable, on-disk storage files for the StratumKV storage engine.
//!
//! When the in-memory [`memtable::Memtable`] exceeds its size threshold the
//! engine flushes it to disk as an SSTable. SSTables are *write-once,
//! read-many* — once created they are never modified, only superseded by a
//! compaction run.
//!
//! ## On-disk format
//!
//! Every SSTable — plain or gzip-compressed — is a sequence of UTF-8 lines:
//!
//! ```text
//! <key>=<value-or-tombstone-marker>\n
//! ```
//!
//! split on the first `=`. A data directory contains three kinds of
//! SSTable-related file:
//!
//! - `sstable_<N>.txt` — a plain flushed SSTable, `N` a monotonically
//!   increasing counter.
//! - `sstable_compacted.txt.gz` — the gzip-compressed output of a
//!   compaction run.
//! - `sstable_compacted_temp.gz` / `sstable_<N>_<nonce>.tmp` — transient
//!   files that must never be read.

mod bloom_registry;
mod compaction;
pub mod format;
mod reader;
mod writer;

pub use bloom_registry::BloomRegistry;
pub use compaction::{compact_all, compact_by_file_count, compact_by_size, CompactionLock};
pub use reader::{compressed_files_newest_first, lookup, lookup_compressed, plain_files_newest_first};
pub use writer::write_from_memtable;

use thiserror::Error;

/// Errors produced by SSTable read, write, and compaction operations.
#[derive(Debug, Error)]
pub enum SstError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// An operation was given arguments it cannot act on (e.g. flushing an
    /// empty memtable).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A compaction was attempted while another was already running.
    #[error("compaction already in progress")]
    Busy,
}
