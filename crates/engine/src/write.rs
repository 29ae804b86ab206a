//! Write path: `put()`, `delete()`, and the internal rotation that hands a
//! full memtable off to the background flusher.
//!
//! Every mutation is appended to the WAL (fsynced) before the memtable is
//! touched. Once the memtable's byte accounting reaches the configured
//! threshold, it is rotated into the immutable queue and the flusher
//! thread is woken; the caller never blocks on the drain itself.

use crate::{flusher, Engine, EngineError};
use memtable::{Memtable, Record};

impl Engine {
    /// Inserts a key-value pair.
    ///
    /// Appends to the WAL, inserts into the mutable memtable, and rotates
    /// the memtable into the immutable queue if its byte size has reached
    /// the configured threshold.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if `key` is empty, or
    /// [`EngineError::Io`] on WAL failure.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), EngineError> {
        self.write_record(key, Record::Value(value))
    }

    /// Deletes a key by writing a tombstone. Shadows any older value across
    /// every layer until a compaction consumes all of them.
    pub fn delete(&self, key: Vec<u8>) -> Result<(), EngineError> {
        self.write_record(key, Record::Tombstone)
    }

    fn write_record(&self, key: Vec<u8>, record: Record) -> Result<(), EngineError> {
        if key.is_empty() {
            return Err(EngineError::InvalidArgument("key must not be empty".to_string()));
        }

        {
            let mut wal = self.shared.wal.lock().expect("wal lock poisoned");
            wal.append(&key, &record)?;
        }

        let rotated = {
            let mut state = self.shared.state.lock().expect("write lock poisoned");
            state.mem.put(key, record)?;
            if state.mem.size_in_bytes() >= self.shared.config.memtable_threshold_bytes {
                let full = std::mem::replace(&mut state.mem, Memtable::new());
                state.immutable.push_back(full);
                true
            } else {
                false
            }
        };

        if rotated {
            let _ = self.flusher_tx.send(flusher::Message::Wake);
        }

        Ok(())
    }

    /// Forces a synchronous drain: rotates the mutable memtable (if
    /// non-empty) into the immutable queue, then drains the queue to disk
    /// inline rather than waiting on the background flusher.
    ///
    /// No-op if both the mutable memtable and immutable queue are empty.
    pub fn flush(&self) -> Result<(), EngineError> {
        {
            let mut state = self.shared.state.lock().expect("write lock poisoned");
            if !state.mem.is_empty() {
                let full = std::mem::replace(&mut state.mem, Memtable::new());
                state.immutable.push_back(full);
            }
        }
        flusher::drain(&self.shared)
    }
}
