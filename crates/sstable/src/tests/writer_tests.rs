use crate::bloom_registry::BloomRegistry;
use crate::format::plain_name;
use crate::writer::write_from_memtable;
use crate::SstError;
use memtable::{Memtable, Record};
use tempfile::tempdir;

fn sample_memtable() -> Memtable {
    let mut m = Memtable::new();
    m.put(b"a".to_vec(), Record::Value(b"apple".to_vec())).unwrap();
    m.put(b"b".to_vec(), Record::Value(b"banana".to_vec())).unwrap();
    m.put(b"c".to_vec(), Record::Value(b"".to_vec())).unwrap();
    m.put(b"d".to_vec(), Record::Tombstone).unwrap();
    m
}

#[test]
fn write_empty_memtable_is_rejected() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mem = Memtable::new();
    let result = write_from_memtable(dir.path(), 0, &mem, &registry);
    assert!(matches!(result, Err(SstError::InvalidArgument(_))));
    assert!(!dir.path().join(plain_name(0)).exists());
}

#[test]
fn write_creates_final_file_and_no_temp_remnants() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mem = sample_memtable();

    let path = write_from_memtable(dir.path(), 3, &mem, &registry).unwrap();
    assert_eq!(path, dir.path().join(plain_name(3)));
    assert!(path.exists());

    let remaining: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining, vec![plain_name(3)]);
}

#[test]
fn write_registers_a_bloom_filter() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mem = sample_memtable();

    write_from_memtable(dir.path(), 0, &mem, &registry).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.might_contain_in(&plain_name(0), b"a"));
}

#[test]
fn write_lines_are_key_ordered() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mut mem = Memtable::new();
    mem.put(b"z".to_vec(), Record::Value(b"1".to_vec())).unwrap();
    mem.put(b"a".to_vec(), Record::Value(b"2".to_vec())).unwrap();
    mem.put(b"m".to_vec(), Record::Value(b"3".to_vec())).unwrap();

    let path = write_from_memtable(dir.path(), 0, &mem, &registry).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    let keys: Vec<&str> = content.lines().map(|l| l.split('=').next().unwrap()).collect();
    assert_eq!(keys, vec!["a", "m", "z"]);
}

#[test]
fn write_preserves_tombstones_and_empty_values() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mem = sample_memtable();

    let path = write_from_memtable(dir.path(), 0, &mem, &registry).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.contains("c=\n") || content.ends_with("c="));
    assert!(content.contains("d=__TOMBSTONE__"));
}

#[test]
fn write_removes_temp_file_when_rename_fails() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mem = sample_memtable();

    // Pre-create the final path as a directory so the rename in
    // `write_from_memtable` can never succeed: renaming a file onto an
    // existing directory fails on every platform this targets.
    std::fs::create_dir(dir.path().join(plain_name(7))).unwrap();

    let result = write_from_memtable(dir.path(), 7, &mem, &registry);
    assert!(matches!(result, Err(SstError::Io(_))));

    let leftover_tmp = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().ends_with(".tmp"));
    assert!(!leftover_tmp, "a failed rename must not leave its temp file behind");
}

#[test]
fn write_large_memtable() {
    let dir = tempdir().unwrap();
    let registry = BloomRegistry::new();
    let mut mem = Memtable::new();
    for i in 0..2_000u32 {
        mem.put(format!("key{i:05}").into_bytes(), Record::Value(b"v".to_vec()))
            .unwrap();
    }
    let path = write_from_memtable(dir.path(), 0, &mem, &registry).unwrap();
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().count(), 2_000);
}
