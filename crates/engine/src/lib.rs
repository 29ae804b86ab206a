//! # Engine — StratumKV Storage Engine
//!
//! The central orchestrator tying [`memtable`], [`wal`], and [`sstable`]
//! together into a complete, single-process, file-backed LSM-tree
//! key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────────────┐
//! │                        ENGINE                           │
//! │                                                         │
//! │ write.rs  → WAL append (fsync) → mutable memtable insert│
//! │                |                                        │
//! │                |  (size >= threshold?)                  │
//! │                v                                         │
//! │            rotate into immutable queue, wake flusher     │
//! │                                                         │
//! │ flusher.rs → drains queue, writes SSTables, truncates WAL│
//! │                |                                        │
//! │                v  (opportunistic)                        │
//! │            compaction.rs → merged gzip SSTable           │
//! │                                                         │
//! │ read.rs → mutable memtable → immutable queue (newest     │
//! │           first) → plain SSTables (Bloom-gated) → gzip   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                               |
//! |----------------|--------------------------------------------------------|
//! | [`lib`]        | `Engine` struct, construction, accessors, `Drop`        |
//! | [`recovery`]   | WAL replay, SSTable counter recovery, Bloom rebuild     |
//! | [`write`]      | `put()`, `delete()`, internal rotation                 |
//! | [`read`]       | `get()`, the five-step resolution order                |
//! | [`flusher`]    | Background thread draining the immutable queue          |
//! | [`compaction`] | `force_compaction()` and opportunistic checks           |
//!
//! ## Crash safety
//!
//! Every write is appended to the WAL (fsynced) before the memtable is
//! mutated. The WAL is truncated only after every memtable it covers has
//! been durably flushed. SSTables are written via temp file + atomic
//! rename, exactly as in [`sstable::writer`].

mod compaction;
mod flusher;
mod read;
mod recovery;
mod write;

use config::EngineConfig;
use crossbeam_channel::Sender;
use memtable::Memtable;
use sstable::{BloomRegistry, CompactionLock};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, RwLock};
use std::thread::JoinHandle;
use thiserror::Error;
use wal::Wal;

pub use config::EngineConfig as Config;

/// Errors surfaced by the engine's public write-path and construction
/// operations.
///
/// Corruption in on-disk data is never surfaced here — malformed WAL or
/// SSTable lines are logged and skipped at the point of parsing, inside
/// `wal` and `sstable`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// An operation was given arguments it cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A compaction was already running.
    #[error("compaction already in progress")]
    Busy,
}

impl From<memtable::MemtableError> for EngineError {
    fn from(e: memtable::MemtableError) -> Self {
        EngineError::InvalidArgument(e.to_string())
    }
}

impl From<wal::WalError> for EngineError {
    fn from(e: wal::WalError) -> Self {
        match e {
            wal::WalError::Io(io) => EngineError::Io(io),
        }
    }
}

impl From<sstable::SstError> for EngineError {
    fn from(e: sstable::SstError) -> Self {
        match e {
            sstable::SstError::Io(io) => EngineError::Io(io),
            sstable::SstError::InvalidArgument(s) => EngineError::InvalidArgument(s),
            sstable::SstError::Busy => EngineError::Busy,
        }
    }
}

/// Mutable state protected by the engine's single write lock: the active
/// memtable, the immutable queue awaiting flush, and the next SSTable
/// counter to allocate.
pub(crate) struct WriteState {
    pub(crate) mem: Memtable,
    pub(crate) immutable: VecDeque<Memtable>,
    pub(crate) next_counter: u64,
}

/// Snapshot of engine state for observability (`stats()`).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    /// Byte size of the active mutable memtable.
    pub active_memtable_bytes: usize,
    /// Number of memtables waiting in the immutable queue.
    pub immutable_count: usize,
    /// Combined size in bytes of every on-disk SSTable (plain + gzip).
    pub total_sstable_bytes: u64,
    /// Number of on-disk SSTable files (plain + gzip, excluding temp files).
    pub sstable_file_count: usize,
    /// Configured memtable rotation threshold.
    pub memtable_threshold_bytes: usize,
    /// Configured soft disk limit.
    pub soft_disk_limit_bytes: u64,
    /// Configured soft file count limit.
    pub soft_file_count: usize,
}

/// Shared state reachable from both the `Engine` handle and the background
/// flusher thread.
pub(crate) struct Shared {
    pub(crate) dir: PathBuf,
    pub(crate) config: EngineConfig,
    pub(crate) state: Mutex<WriteState>,
    pub(crate) wal: Mutex<Wal>,
    /// Guards concurrent SSTable file I/O: readers for lookups, a write
    /// guard while a new SSTable file is being written or compacted.
    pub(crate) sst_lock: RwLock<()>,
    pub(crate) bloom: BloomRegistry,
    pub(crate) compaction_lock: CompactionLock,
    pub(crate) is_flushing: AtomicBool,
}

/// The central storage engine orchestrating the memtable, WAL, and
/// on-disk SSTables.
///
/// # Write path
///
/// 1. Append the record to the WAL (fsync before returning).
/// 2. Apply the mutation to the mutable memtable.
/// 3. If the memtable's byte size reaches the configured threshold, rotate
///    it into the immutable queue and wake the background flusher.
///
/// # Read path
///
/// See [`read`] for the five-step resolution order (mutable memtable,
/// immutable queue newest-first, Bloom-gated plain SSTables, gzip
/// SSTables, absent).
///
/// # Recovery
///
/// On construction ([`Engine::open`]), the WAL is replayed into a fresh
/// memtable, the SSTable counter is recovered by scanning the directory,
/// and Bloom filters are rebuilt for every existing SSTable.
pub struct Engine {
    pub(crate) shared: std::sync::Arc<Shared>,
    flusher_tx: Sender<flusher::Message>,
    flusher_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dir", &self.shared.dir)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens (or creates) an engine over `dir` with `config`, performing
    /// full recovery. See [`recovery`] for the construction steps.
    pub fn open<P: AsRef<Path>>(dir: P, config: EngineConfig) -> Result<Self, EngineError> {
        recovery::open(dir.as_ref(), config)
    }

    /// Opens an engine over `dir` with [`EngineConfig::default`].
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, EngineError> {
        Self::open(dir, EngineConfig::default())
    }

    /// Returns a point-in-time snapshot of engine state.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let state = self.shared.state.lock().expect("write lock poisoned");
        let (total_bytes, file_count) = sstable_disk_usage(&self.shared.dir);
        EngineStats {
            active_memtable_bytes: state.mem.size_in_bytes(),
            immutable_count: state.immutable.len(),
            total_sstable_bytes: total_bytes,
            sstable_file_count: file_count,
            memtable_threshold_bytes: self.shared.config.memtable_threshold_bytes,
            soft_disk_limit_bytes: self.shared.config.soft_disk_limit_bytes,
            soft_file_count: self.shared.config.soft_file_count,
        }
    }

    /// `true` if any registered per-SSTable Bloom filter might contain
    /// `key` (an OR across every filter currently registered).
    #[must_use]
    pub fn might_contain_in_sstables(&self, key: &[u8]) -> bool {
        self.shared.bloom.might_contain_any(key)
    }

    /// Blocks until the immutable queue is empty and no flush is in
    /// progress. Polls with a short sleep rather than joining the flusher
    /// thread, since that thread is long-lived for the engine's lifetime.
    pub fn wait_for_flush_completion(&self) {
        use std::sync::atomic::Ordering;
        use std::time::Duration;
        loop {
            let queue_empty = {
                let state = self.shared.state.lock().expect("write lock poisoned");
                state.immutable.is_empty()
            };
            let flushing = self.shared.is_flushing.load(Ordering::Acquire);
            if queue_empty && !flushing {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Flushes and closes the WAL, releasing resources. The background
    /// flusher thread is signaled to shut down and joined.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.close_internal()
    }

    fn close_internal(&mut self) -> Result<(), EngineError> {
        self.flush()?;
        let _ = self.flusher_tx.send(flusher::Message::Shutdown);
        if let Some(handle) = self.flusher_thread.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Best-effort flush on drop: any data left in the memtable or immutable
/// queue is flushed so it is not lost. Errors are silently ignored — the
/// data is still durable in the WAL and will be recovered on next open.
impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close_internal();
    }
}

fn sstable_disk_usage(dir: &Path) -> (u64, usize) {
    let mut total = 0u64;
    let mut count = 0usize;
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return (0, 0),
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if sstable::format::is_transient(&name) {
            continue;
        }
        let is_plain = sstable::format::parse_plain_counter(&name).is_some();
        let is_compacted = name == sstable::format::COMPACTED_NAME;
        if !is_plain && !is_compacted {
            continue;
        }
        if let Ok(meta) = entry.metadata() {
            total += meta.len();
            count += 1;
        }
    }
    (total, count)
}

#[cfg(test)]
mod tests;
