use crate::{flusher, Shared, WriteState};
use config::EngineConfig;
use memtable::{Memtable, Record};
use sstable::{BloomRegistry, CompactionLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tempfile::tempdir;
use wal::Wal;

fn wait_until_flushing(shared: &Shared, timeout: Duration) {
    let start = Instant::now();
    while !shared.is_flushing.load(Ordering::Acquire) {
        assert!(start.elapsed() < timeout, "drain never started");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Exercises `drain_inner`'s re-loop: a memtable queued while a drain is
/// already in flight is picked up by that same drain call, with no second
/// wake message needed.
///
/// The `sst_lock` read guard held by the main thread blocks the drain
/// thread right after it pops the first memtable, giving a deterministic
/// window (rather than a timing guess) in which to queue the second one.
#[test]
fn drain_absorbs_a_memtable_queued_while_it_is_running() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(dir.path().join("wal.log"), true).unwrap();

    let mut first = Memtable::new();
    first.put(b"a".to_vec(), Record::Value(b"1".to_vec())).unwrap();

    let shared = Arc::new(Shared {
        dir: dir.path().to_path_buf(),
        config: EngineConfig::default(),
        state: Mutex::new(WriteState {
            mem: Memtable::new(),
            immutable: VecDeque::from([first]),
            next_counter: 0,
        }),
        wal: Mutex::new(wal),
        sst_lock: RwLock::new(()),
        bloom: BloomRegistry::new(),
        compaction_lock: CompactionLock::new(()),
        is_flushing: AtomicBool::new(false),
    });

    let blocker = shared.sst_lock.read().unwrap();

    let drain_handle = {
        let shared = Arc::clone(&shared);
        std::thread::spawn(move || flusher::drain(&shared))
    };

    wait_until_flushing(&shared, Duration::from_secs(1));
    std::thread::sleep(Duration::from_millis(10));

    {
        let mut late = Memtable::new();
        late.put(b"late".to_vec(), Record::Value(b"arrived-during-drain".to_vec()))
            .unwrap();
        let mut state = shared.state.lock().unwrap();
        state.immutable.push_back(late);
    }

    drop(blocker);
    drain_handle.join().unwrap().unwrap();

    let state = shared.state.lock().unwrap();
    assert!(
        state.immutable.is_empty(),
        "drain must loop back and pick up the late arrival without a fresh wake"
    );
    drop(state);

    assert_eq!(sstable::lookup(dir.path(), b"a", &shared.bloom).unwrap(), Some(Record::Value(b"1".to_vec())));
    assert_eq!(
        sstable::lookup(dir.path(), b"late", &shared.bloom).unwrap(),
        Some(Record::Value(b"arrived-during-drain".to_vec()))
    );
}
