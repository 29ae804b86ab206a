use crate::bloom_registry::BloomRegistry;
use crate::format::{encode_line, plain_name};
use crate::SstError;
use bloom::SstableFilter;
use memtable::Memtable;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Number of rename attempts before giving up.
const RENAME_RETRIES: u32 = 3;
/// Backoff between rename attempts.
const RENAME_BACKOFF: Duration = Duration::from_millis(50);

static TEMP_NONCE: AtomicU64 = AtomicU64::new(0);

/// Flushes `mem` to a new plain SSTable file in `dir` with counter `counter`,
/// registering a [`SstableFilter`] for it in `registry`.
///
/// The write is crash-safe: entries are serialized into a uniquely named
/// temp file, fsynced, then atomically renamed into place. A reader can
/// never observe a partially written `sstable_<N>.txt`.
///
/// # Errors
///
/// Returns an error if `mem` is empty or on any I/O failure, including
/// exhausting the rename retries.
pub fn write_from_memtable(
    dir: &Path,
    counter: u64,
    mem: &Memtable,
    registry: &BloomRegistry,
) -> Result<PathBuf, SstError> {
    if mem.is_empty() {
        return Err(SstError::InvalidArgument(
            "refusing to write an empty SSTable".to_string(),
        ));
    }

    fs::create_dir_all(dir)?;

    let nonce = TEMP_NONCE.fetch_add(1, Ordering::Relaxed);
    let time_nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let tmp_name = format!("sstable_{counter}_{time_nonce}_{nonce}.tmp");
    let tmp_path = dir.join(&tmp_name);
    let final_name = plain_name(counter);
    let final_path = dir.join(&final_name);

    let mut filter = SstableFilter::new();
    {
        let raw = File::create(&tmp_path)?;
        let mut w = BufWriter::new(raw);
        for (key, record) in mem.dump() {
            filter.add(&key);
            w.write_all(&encode_line(&key, &record))?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
        w.into_inner()
            .map_err(|e| SstError::Io(e.into_error()))?
            .sync_all()?;
    }

    rename_with_retries(&tmp_path, &final_path)?;
    sync_parent(&final_path);

    registry.register(final_name, filter);
    Ok(final_path)
}

fn rename_with_retries(from: &Path, to: &Path) -> Result<(), SstError> {
    let mut last_err = None;
    for attempt in 0..RENAME_RETRIES {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, error = %e, "sstable rename attempt failed, retrying");
                last_err = Some(e);
                if attempt + 1 < RENAME_RETRIES {
                    thread::sleep(RENAME_BACKOFF);
                }
            }
        }
    }
    let _ = fs::remove_file(from);
    Err(SstError::Io(last_err.expect("retry loop always sets last_err")))
}

/// Fsyncs the parent directory of `path` so a rename into it is durable
/// even after a crash. Best-effort: failures are logged, not propagated.
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        match File::open(parent) {
            Ok(dir) => {
                if let Err(e) = dir.sync_all() {
                    warn!(error = %e, "failed to fsync sstable parent directory");
                }
            }
            Err(e) => warn!(error = %e, "failed to open sstable parent directory for fsync"),
        }
    }
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
