use crate::bloom_registry::BloomRegistry;
use crate::format::{decode_line, is_transient, parse_plain_counter, COMPACTED_TEMP_NAME};
use crate::SstError;
use flate2::read::GzDecoder;
use memtable::Record;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// Looks up `key` across every plain `sstable_<N>.txt` file in `dir`,
/// newest (by mtime) first.
///
/// Files with a registered Bloom filter that rejects the key are skipped
/// without being opened. I/O errors on an individual file are logged and
/// that file is skipped rather than aborting the whole search.
pub fn lookup(dir: &Path, key: &[u8], registry: &BloomRegistry) -> Result<Option<Record>, SstError> {
    for (name, path) in plain_files_newest_first(dir)? {
        if !registry.might_contain_in(&name, key) {
            continue;
        }
        match scan_file_for_key(&path, key) {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => continue,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable sstable during lookup");
                continue;
            }
        }
    }
    Ok(None)
}

/// Looks up `key` across gzip-compressed SSTables (the compaction output),
/// newest first. No Bloom filter gate.
pub fn lookup_compressed(dir: &Path, key: &[u8]) -> Result<Option<Record>, SstError> {
    for path in compressed_files_newest_first(dir)? {
        match scan_gz_file_for_key(&path, key) {
            Ok(Some(record)) => return Ok(Some(record)),
            Ok(None) => continue,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable gzip sstable during lookup");
                continue;
            }
        }
    }
    Ok(None)
}

/// Lists `sstable_<N>.txt` files in `dir`, newest mtime first.
pub fn plain_files_newest_first(dir: &Path) -> Result<Vec<(String, PathBuf)>, SstError> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SstError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if parse_plain_counter(&name).is_none() || is_transient(&name) {
            continue;
        }
        let mtime = mtime_of(&entry.path());
        found.push((mtime, name, entry.path()));
    }
    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found.into_iter().map(|(_, n, p)| (n, p)).collect())
}

/// Lists non-transient `.gz` files in `dir`, newest mtime first.
pub fn compressed_files_newest_first(dir: &Path) -> Result<Vec<PathBuf>, SstError> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SstError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".gz") || name == COMPACTED_TEMP_NAME || is_transient(&name) {
            continue;
        }
        let mtime = mtime_of(&entry.path());
        found.push((mtime, entry.path()));
    }
    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

fn mtime_of(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn scan_file_for_key(path: &Path, key: &[u8]) -> Result<Option<Record>, SstError> {
    let file = File::open(path)?;
    scan_reader_for_key(BufReader::new(file), key)
}

fn scan_gz_file_for_key(path: &Path, key: &[u8]) -> Result<Option<Record>, SstError> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    scan_reader_for_key(BufReader::new(decoder), key)
}

fn scan_reader_for_key<R: BufRead>(reader: R, key: &[u8]) -> Result<Option<Record>, SstError> {
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match decode_line(&line) {
            Some((found_key, record)) => {
                if found_key == key {
                    return Ok(Some(record));
                }
            }
            None => warn!(line, "skipping malformed sstable line"),
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod tests;
