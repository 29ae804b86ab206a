use crate::bloom_registry::BloomRegistry;
use crate::compaction::{compact_all, compact_by_file_count, compact_by_size, CompactionLock};
use crate::format::COMPACTED_NAME;
use crate::reader::lookup_compressed;
use crate::writer::write_from_memtable;
use crate::SstError;
use memtable::{Memtable, Record};
use tempfile::tempdir;

fn mem_with(pairs: &[(&[u8], Record)]) -> Memtable {
    let mut m = Memtable::new();
    for (k, v) in pairs {
        m.put(k.to_vec(), v.clone()).unwrap();
    }
    m
}

#[test]
fn force_compaction_merges_and_drops_tombstones() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(
        dir.path(),
        0,
        &mem_with(&[(b"a", Record::Value(b"1".to_vec())), (b"b", Record::Value(b"2".to_vec()))]),
        &registry,
    )
    .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    write_from_memtable(
        dir.path(),
        1,
        &mem_with(&[(b"a", Record::Value(b"1-updated".to_vec())), (b"c", Record::Tombstone)]),
        &registry,
    )
    .unwrap();

    compact_all(dir.path(), &lock, &registry).unwrap();

    assert!(dir.path().join(COMPACTED_NAME).exists());
    assert!(!dir.path().join("sstable_0.txt").exists());
    assert!(!dir.path().join("sstable_1.txt").exists());

    assert_eq!(
        lookup_compressed(dir.path(), b"a").unwrap(),
        Some(Record::Value(b"1-updated".to_vec()))
    );
    assert_eq!(lookup_compressed(dir.path(), b"b").unwrap(), Some(Record::Value(b"2".to_vec())));
    assert_eq!(lookup_compressed(dir.path(), b"c").unwrap(), None, "tombstoned key must be dropped");
}

#[test]
fn compact_by_size_skips_when_under_limit() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();

    let ran = compact_by_size(dir.path(), u64::MAX, &lock, &registry).unwrap();
    assert!(!ran);
    assert!(dir.path().join("sstable_0.txt").exists());
}

#[test]
fn compact_by_size_zero_forces_unconditionally() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();

    let ran = compact_by_size(dir.path(), 0, &lock, &registry).unwrap();
    assert!(ran);
    assert!(dir.path().join(COMPACTED_NAME).exists());
}

#[test]
fn compact_by_file_count_skips_under_limit() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();

    let ran = compact_by_file_count(dir.path(), 10, &lock, &registry).unwrap();
    assert!(!ran);
}

#[test]
fn compact_by_file_count_runs_over_limit() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    for i in 0..3u64 {
        write_from_memtable(dir.path(), i, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let ran = compact_by_file_count(dir.path(), 1, &lock, &registry).unwrap();
    assert!(ran);
    assert!(dir.path().join(COMPACTED_NAME).exists());
}

#[test]
fn contended_compaction_returns_busy() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();

    let _held = lock.lock().unwrap();
    let result = compact_all(dir.path(), &lock, &registry);
    assert!(matches!(result, Err(SstError::Busy)));
}

#[test]
fn compacting_an_empty_directory_is_a_no_op() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    compact_all(dir.path(), &lock, &registry).unwrap();
    assert!(!dir.path().join(COMPACTED_NAME).exists());
}

#[test]
fn compaction_skips_a_file_that_disappears_mid_run() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(10));
    write_from_memtable(dir.path(), 1, &mem_with(&[(b"b", Record::Value(b"2".to_vec()))]), &registry).unwrap();

    let files = super::gather_oldest_first(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    // Remove one of the listed files before compaction actually reads it,
    // simulating it disappearing between the listing and the merge.
    std::fs::remove_file(&files[0]).unwrap();

    super::compact_all_locked(dir.path(), &files, &registry).unwrap();

    assert!(dir.path().join(COMPACTED_NAME).exists());
    assert_eq!(lookup_compressed(dir.path(), b"b").unwrap(), Some(Record::Value(b"2".to_vec())));
}

#[test]
fn second_compaction_merges_into_first() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let lock = CompactionLock::new(());

    write_from_memtable(dir.path(), 0, &mem_with(&[(b"a", Record::Value(b"1".to_vec()))]), &registry).unwrap();
    compact_all(dir.path(), &lock, &registry).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(10));
    write_from_memtable(dir.path(), 1, &mem_with(&[(b"b", Record::Value(b"2".to_vec()))]), &registry).unwrap();
    compact_all(dir.path(), &lock, &registry).unwrap();

    assert_eq!(lookup_compressed(dir.path(), b"a").unwrap(), Some(Record::Value(b"1".to_vec())));
    assert_eq!(lookup_compressed(dir.path(), b"b").unwrap(), Some(Record::Value(b"2".to_vec())));
}
