//! Per-engine-instance registry of per-file [`SstableFilter`]s, scoped so
//! that multiple engines can coexist in one process without sharing state.

use bloom::SstableFilter;
use std::collections::HashMap;
use std::sync::RwLock;

/// Maps an SSTable file name to the Bloom filter built for its contents.
///
/// A filter's lifetime should equal its file's presence in the data
/// directory: callers must [`unregister`](BloomRegistry::unregister) when a
/// file is deleted (e.g. during compaction).
#[derive(Default)]
pub struct BloomRegistry {
    filters: RwLock<HashMap<String, SstableFilter>>,
}

impl BloomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (overwriting any prior filter for the same name) a filter
    /// for `file_name`.
    pub fn register(&self, file_name: String, filter: SstableFilter) {
        let mut guard = self.filters.write().expect("bloom registry lock poisoned");
        guard.insert(file_name, filter);
    }

    /// Removes the filter registered for `file_name`, if any.
    pub fn unregister(&self, file_name: &str) {
        let mut guard = self.filters.write().expect("bloom registry lock poisoned");
        guard.remove(file_name);
    }

    /// Returns `false` only if a filter is registered for `file_name` and it
    /// definitively rejects `key` — the caller may skip scanning that file.
    /// With no filter registered, the file must be scanned regardless.
    #[must_use]
    pub fn might_contain_in(&self, file_name: &str, key: &[u8]) -> bool {
        let guard = self.filters.read().expect("bloom registry lock poisoned");
        match guard.get(file_name) {
            Some(filter) => filter.might_contain(key),
            None => true,
        }
    }

    /// `true` if *any* registered filter might contain `key`. Used by
    /// [`engine::Engine::might_contain_in_sstables`](../engine/struct.Engine.html).
    #[must_use]
    pub fn might_contain_any(&self, key: &[u8]) -> bool {
        let guard = self.filters.read().expect("bloom registry lock poisoned");
        guard.values().any(|f| f.might_contain(key))
    }

    /// Removes every registered filter.
    pub fn clear(&self) {
        let mut guard = self.filters.write().expect("bloom registry lock poisoned");
        guard.clear();
    }

    /// Number of files with a registered filter.
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.filters.read().expect("bloom registry lock poisoned");
        guard.len()
    }

    /// `true` if no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
