use sstable::format;
use std::fs;
use std::path::Path;

/// Counts on-disk SSTable files (plain + compacted), excluding temp files.
pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    !format::is_transient(&name)
                        && (format::parse_plain_counter(&name).is_some()
                            || name == format::COMPACTED_NAME)
                })
                .count()
        })
        .unwrap_or(0)
}
