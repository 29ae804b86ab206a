use crate::{Engine, EngineError};
use config::EngineConfig;
use tempfile::tempdir;

fn small_threshold_config(bytes: usize) -> EngineConfig {
    EngineConfig {
        memtable_threshold_bytes: bytes,
        ..EngineConfig::default()
    }
}

#[test]
fn read_checks_mutable_memtable_first() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::new(dir.path())?;
    engine.put(b"k".to_vec(), b"v".to_vec())?;
    assert_eq!(engine.get(b"k")?, Some(b"v".to_vec()));
    Ok(())
}

#[test]
fn immutable_queue_is_checked_newest_first() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), small_threshold_config(1))?;

    // Each put rotates the prior memtable into the immutable queue, since
    // the threshold is crossed immediately.
    engine.put(b"key".to_vec(), b"old".to_vec())?;
    engine.put(b"key".to_vec(), b"new".to_vec())?;

    assert_eq!(engine.get(b"key")?, Some(b"new".to_vec()));
    Ok(())
}

#[test]
fn newest_sstable_wins_on_read() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), small_threshold_config(1))?;

    engine.put(b"k".to_vec(), b"v1".to_vec())?;
    engine.flush()?;
    std::thread::sleep(std::time::Duration::from_millis(2));

    engine.put(b"k".to_vec(), b"v2".to_vec())?;
    engine.flush()?;

    assert_eq!(engine.get(b"k")?, Some(b"v2".to_vec()));
    Ok(())
}

#[test]
fn tombstone_in_memtable_shadows_sstable_value() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), small_threshold_config(1024 * 1024))?;

    engine.put(b"k".to_vec(), b"old_value".to_vec())?;
    engine.flush()?;

    engine.delete(b"k".to_vec())?;

    assert!(engine.get(b"k")?.is_none());
    Ok(())
}

#[test]
fn bloom_filter_reports_negatives_for_absent_keys() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::new(dir.path())?;
    engine.put(b"present".to_vec(), b"v".to_vec())?;
    engine.flush()?;

    assert!(engine.might_contain_in_sstables(b"present"));
    // Bloom filters only guarantee no false negatives, so this only checks
    // that a key that was never inserted is reported absent far more often
    // than not; it is not a hard guarantee for every possible key.
    assert!(!engine.might_contain_in_sstables(b"definitely-absent-key-xyz"));
    Ok(())
}

#[test]
fn compacted_sstable_is_consulted_after_plain_ones() -> Result<(), EngineError> {
    let dir = tempdir().unwrap();
    let engine = Engine::open(dir.path(), small_threshold_config(1))?;

    engine.put(b"a".to_vec(), b"1".to_vec())?;
    engine.flush()?;
    engine.put(b"b".to_vec(), b"2".to_vec())?;
    engine.flush()?;

    engine.force_compaction()?;

    assert_eq!(engine.get(b"a")?, Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b")?, Some(b"2".to_vec()));
    Ok(())
}
