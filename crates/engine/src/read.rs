//! Read path: `get()` and its five-step resolution order.
//!
//! 1. The mutable memtable (freshest data).
//! 2. The immutable queue, newest to oldest.
//! 3. Plain on-disk SSTables, Bloom-gated, newest to oldest (mtime order).
//! 4. The gzip-compressed compacted SSTable, if present.
//! 5. Absent.
//!
//! A tombstone encountered at any step shadows every older layer and
//! short-circuits the lookup.

use crate::{Engine, EngineError};
use memtable::Record;

impl Engine {
    /// Looks up `key`, returning its live value if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if an SSTable file cannot be read.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        {
            let state = self.shared.state.lock().expect("write lock poisoned");
            if let Some(record) = state.mem.get(key) {
                return Ok(resolve(record.clone()));
            }
            for mem in state.immutable.iter().rev() {
                if let Some(record) = mem.get(key) {
                    return Ok(resolve(record.clone()));
                }
            }
        }

        let _guard = self.shared.sst_lock.read().expect("sstable lock poisoned");

        if let Some(record) = sstable::lookup(&self.shared.dir, key, &self.shared.bloom)? {
            return Ok(resolve(record));
        }

        if let Some(record) = sstable::lookup_compressed(&self.shared.dir, key)? {
            return Ok(resolve(record));
        }

        Ok(None)
    }
}

fn resolve(record: Record) -> Option<Vec<u8>> {
    match record {
        Record::Value(v) => Some(v),
        Record::Tombstone => None,
    }
}
