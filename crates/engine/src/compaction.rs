//! Compaction: merging on-disk SSTables into the single gzip-compressed
//! compacted file, both on an explicit request and opportunistically
//! after a flush.

use crate::{Engine, EngineError, Shared};
use tracing::{info, warn};

impl Engine {
    /// Forces an unconditional compaction of every on-disk SSTable into
    /// the compacted gzip file, regardless of the configured soft limits.
    ///
    /// Returns [`EngineError::Busy`] if a compaction is already running
    /// (the lock is non-blocking: a concurrent caller never waits).
    pub fn force_compaction(&self) -> Result<(), EngineError> {
        let _guard = self.shared.sst_lock.write().expect("sstable lock poisoned");
        sstable::compact_all(
            &self.shared.dir,
            &self.shared.compaction_lock,
            &self.shared.bloom,
        )?;
        Ok(())
    }
}

/// Runs the soft-limit compaction checks after a flush, in the order
/// "size" then "file count". Each is independently conditional: a check
/// that finds the engine under its limit is a no-op, not an error.
///
/// A [`sstable::SstError::Busy`] from either check means a compaction was
/// already in progress and is swallowed — the next flush will try again.
pub(crate) fn run_opportunistic_checks(shared: &std::sync::Arc<Shared>) -> Result<(), EngineError> {
    let _guard = shared.sst_lock.write().expect("sstable lock poisoned");

    match sstable::compact_by_size(
        &shared.dir,
        shared.config.soft_disk_limit_bytes,
        &shared.compaction_lock,
        &shared.bloom,
    ) {
        Ok(true) => info!("opportunistic compaction ran (disk size over soft limit)"),
        Ok(false) => {}
        Err(sstable::SstError::Busy) => return Ok(()),
        Err(e) => {
            warn!(error = %e, "size-triggered compaction check failed");
            return Err(e.into());
        }
    }

    match sstable::compact_by_file_count(
        &shared.dir,
        shared.config.soft_file_count,
        &shared.compaction_lock,
        &shared.bloom,
    ) {
        Ok(true) => info!("opportunistic compaction ran (file count over soft limit)"),
        Ok(false) => {}
        Err(sstable::SstError::Busy) => {}
        Err(e) => {
            warn!(error = %e, "file-count-triggered compaction check failed");
            return Err(e.into());
        }
    }

    Ok(())
}
