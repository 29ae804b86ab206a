//! Construction and cold-start recovery.
//!
//! 1. Ensure the data directory exists.
//! 2. Compute the next SSTable counter from existing `sstable_<N>.txt` files.
//! 3. Create a fresh mutable memtable.
//! 4. Open the WAL and replay it into the memtable.
//! 5. Rebuild Bloom filters for every existing SSTable (plain and gzip).
//! 6. Spawn the background flusher thread.

use crate::{flusher, Engine, EngineError, Shared, WriteState};
use bloom::SstableFilter;
use config::EngineConfig;
use flate2::read::GzDecoder;
use memtable::Memtable;
use sstable::{format, BloomRegistry, CompactionLock};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;
use wal::Wal;

pub(crate) fn open(dir: &Path, config: EngineConfig) -> Result<Engine, EngineError> {
    fs::create_dir_all(dir)?;

    let next_counter = next_sstable_counter(dir)?;

    let mut mem = Memtable::new();
    let wal_path = dir.join("wal.log");
    let wal = Wal::open(&wal_path, config.wal_sync)?;
    wal.replay_into(&mut mem)?;

    let bloom = BloomRegistry::new();
    rebuild_bloom_filters(dir, &bloom)?;

    let shared = Arc::new(Shared {
        dir: dir.to_path_buf(),
        config,
        state: Mutex::new(WriteState {
            mem,
            immutable: VecDeque::new(),
            next_counter,
        }),
        wal: Mutex::new(wal),
        sst_lock: RwLock::new(()),
        bloom,
        compaction_lock: CompactionLock::new(()),
        is_flushing: AtomicBool::new(false),
    });

    let (tx, thread) = flusher::spawn(Arc::clone(&shared));

    Ok(Engine {
        shared,
        flusher_tx: tx,
        flusher_thread: Some(thread),
    })
}

/// Scans `sstable_<N>.txt` files and returns `max(N) + 1`, or `0` if none
/// exist. Compacted files never participate in counter allocation.
fn next_sstable_counter(dir: &Path) -> Result<u64, EngineError> {
    let mut max_seen: Option<u64> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(n) = format::parse_plain_counter(&name) {
            max_seen = Some(max_seen.map_or(n, |m| m.max(n)));
        }
    }
    Ok(max_seen.map_or(0, |m| m + 1))
}

fn rebuild_bloom_filters(dir: &Path, registry: &BloomRegistry) -> Result<(), EngineError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if format::is_transient(&name) {
            continue;
        }
        let is_plain = format::parse_plain_counter(&name).is_some();
        let is_compacted = name == format::COMPACTED_NAME;
        if !is_plain && !is_compacted {
            continue;
        }
        match build_filter_for_file(&entry.path(), is_compacted) {
            Ok(filter) => registry.register(name, filter),
            Err(e) => warn!(file = %entry.path().display(), error = %e, "skipping unreadable sstable during bloom rebuild"),
        }
    }
    Ok(())
}

fn build_filter_for_file(path: &Path, compressed: bool) -> Result<SstableFilter, std::io::Error> {
    let file = File::open(path)?;
    let mut filter = SstableFilter::new();
    let lines: Box<dyn Iterator<Item = std::io::Result<String>>> = if compressed {
        Box::new(BufReader::new(GzDecoder::new(file)).lines())
    } else {
        Box::new(BufReader::new(file).lines())
    };
    for line in lines {
        let line = line?;
        if let Some((key, _)) = format::decode_line(&line) {
            filter.add(&key);
        }
    }
    Ok(filter)
}
