//! Merges the SSTables in a data directory into a single gzip-compressed
//! file, dropping tombstones and any key shadowed by a newer write.
//!
//! Two triggers decide *whether* to compact ([`compact_by_size`],
//! [`compact_by_file_count`]); [`compact_all`] is the trigger-independent
//! merge algorithm both funnel into. A single [`CompactionLock`] ensures at
//! most one compaction runs at a time — a contended attempt returns
//! [`SstError::Busy`] immediately rather than waiting.

use crate::bloom_registry::BloomRegistry;
use crate::format::{decode_line, encode_line, is_transient, parse_plain_counter, COMPACTED_NAME, COMPACTED_TEMP_NAME};
use crate::SstError;
use bloom::SstableFilter;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use memtable::Record;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};
use std::time::SystemTime;
use tracing::warn;

/// Serializes compaction attempts; see module docs.
pub type CompactionLock = Mutex<()>;

/// Runs [`compact_all`] if the combined size of every SSTable in `dir`
/// exceeds `size_limit_bytes`. Passing `0` forces compaction unconditionally.
///
/// Returns `Ok(true)` if a compaction ran, `Ok(false)` if it was skipped
/// because the directory was under the limit.
///
/// # Errors
///
/// Returns [`SstError::Busy`] if another compaction is already running.
pub fn compact_by_size(
    dir: &Path,
    size_limit_bytes: u64,
    lock: &CompactionLock,
    registry: &BloomRegistry,
) -> Result<bool, SstError> {
    let _guard = try_acquire(lock)?;
    let files = gather_oldest_first(dir)?;
    if size_limit_bytes > 0 {
        let total: u64 = files.iter().filter_map(|f| fs::metadata(f).ok()).map(|m| m.len()).sum();
        if total <= size_limit_bytes {
            return Ok(false);
        }
    }
    compact_all_locked(dir, &files, registry)?;
    Ok(true)
}

/// Runs [`compact_all`] if the directory has more than `max_files` SSTables.
/// Passing `0` forces compaction unconditionally.
///
/// # Errors
///
/// Returns [`SstError::Busy`] if another compaction is already running.
pub fn compact_by_file_count(
    dir: &Path,
    max_files: usize,
    lock: &CompactionLock,
    registry: &BloomRegistry,
) -> Result<bool, SstError> {
    let _guard = try_acquire(lock)?;
    let files = gather_oldest_first(dir)?;
    if max_files > 0 && files.len() <= max_files {
        return Ok(false);
    }
    compact_all_locked(dir, &files, registry)?;
    Ok(true)
}

/// Forces a compaction of every SSTable in `dir` regardless of size or
/// file-count thresholds. Used by `Engine::force_compaction`.
///
/// # Errors
///
/// Returns [`SstError::Busy`] if another compaction is already running.
pub fn compact_all(dir: &Path, lock: &CompactionLock, registry: &BloomRegistry) -> Result<(), SstError> {
    let _guard = try_acquire(lock)?;
    let files = gather_oldest_first(dir)?;
    compact_all_locked(dir, &files, registry)
}

fn try_acquire(lock: &CompactionLock) -> Result<std::sync::MutexGuard<'_, ()>, SstError> {
    match lock.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::WouldBlock) => Err(SstError::Busy),
        Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
    }
}

/// Lists every plain and compacted SSTable file in `dir` (never temp files),
/// oldest mtime first.
fn gather_oldest_first(dir: &Path) -> Result<Vec<PathBuf>, SstError> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SstError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_transient(&name) {
            continue;
        }
        let is_plain = parse_plain_counter(&name).is_some();
        let is_compacted = name == COMPACTED_NAME;
        if !is_plain && !is_compacted {
            continue;
        }
        let mtime = fs::metadata(entry.path())
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((mtime, entry.path()));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

fn compact_all_locked(dir: &Path, files: &[PathBuf], registry: &BloomRegistry) -> Result<(), SstError> {
    if files.is_empty() {
        return Ok(());
    }

    let mut merged: BTreeMap<Vec<u8>, Record> = BTreeMap::new();
    for path in files {
        if let Err(e) = merge_one_file(path, &mut merged) {
            warn!(file = %path.display(), error = %e, "skipping file that disappeared or failed mid-compaction");
        }
    }

    let temp_path = dir.join(COMPACTED_TEMP_NAME);
    let final_path = dir.join(COMPACTED_NAME);

    let mut filter = SstableFilter::new();
    {
        let raw = File::create(&temp_path)?;
        let mut encoder = GzEncoder::new(raw, Compression::default());
        for (key, record) in &merged {
            // Tombstones are dropped: compaction always covers every
            // on-disk layer in this engine, so no shadowed layer can resurrect them.
            if record.is_tombstone() {
                continue;
            }
            filter.add(key);
            encoder.write_all(&encode_line(key, record))?;
            encoder.write_all(b"\n")?;
        }
        encoder.finish()?.sync_all()?;
    }

    rename_or_copy(&temp_path, &final_path)?;

    for path in files {
        if path == &final_path {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            registry.unregister(name);
        }
        if let Err(e) = fs::remove_file(path) {
            warn!(file = %path.display(), error = %e, "failed to remove compacted input file");
        }
    }

    registry.register(COMPACTED_NAME.to_string(), filter);
    Ok(())
}

fn merge_one_file(path: &Path, merged: &mut BTreeMap<Vec<u8>, Record>) -> Result<(), SstError> {
    let file = File::open(path)?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let lines: Box<dyn Iterator<Item = std::io::Result<String>>> = if name.ends_with(".gz") {
        Box::new(BufReader::new(GzDecoder::new(file)).lines())
    } else {
        Box::new(BufReader::new(file).lines())
    };

    for line in lines {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match decode_line(&line) {
            Some((key, record)) => {
                merged.insert(key, record);
            }
            None => warn!(file = %path.display(), line, "skipping malformed line during compaction"),
        }
    }
    Ok(())
}

/// Renames `from` to `to`, falling back to copy-then-remove if the
/// filesystem refuses the atomic rename (e.g. crossing a mount point).
fn rename_or_copy(from: &Path, to: &Path) -> Result<(), SstError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "atomic rename failed, falling back to copy");
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/compaction_tests.rs"]
mod tests;
