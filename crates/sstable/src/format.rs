//! SSTable file naming conventions and line (de)serialization.
//!
//! Every SSTable, plain or compacted, is a sequence of UTF-8 lines of the
//! form `<key>=<value-or-tombstone-marker>\n`. The key/value split happens
//! on the *first* `=`; a value may itself contain `=` bytes.

use memtable::{Record, TOMBSTONE_MARKER};

/// Prefix shared by every plain flushed SSTable file name.
pub const PLAIN_PREFIX: &str = "sstable_";

/// Suffix of a plain flushed SSTable file name.
pub const PLAIN_SUFFIX: &str = ".txt";

/// Name of the current compacted output file.
pub const COMPACTED_NAME: &str = "sstable_compacted.txt.gz";

/// Name of the transient file written during compaction. Must never be read.
pub const COMPACTED_TEMP_NAME: &str = "sstable_compacted_temp.gz";

/// Builds the on-disk name for a plain flushed SSTable with counter `n`.
pub fn plain_name(n: u64) -> String {
    format!("{PLAIN_PREFIX}{n}{PLAIN_SUFFIX}")
}

/// Parses the counter `N` out of a `sstable_<N>.txt` file name. Returns
/// `None` for any other name, including temp files and the compacted file.
pub fn parse_plain_counter(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(PLAIN_PREFIX)?;
    let digits = rest.strip_suffix(PLAIN_SUFFIX)?;
    digits.parse::<u64>().ok()
}

/// Returns `true` if `file_name` is a transient file that must never be
/// read as a real SSTable (flush temp files end in `.tmp`; the compaction
/// temp file is [`COMPACTED_TEMP_NAME`]).
pub fn is_transient(file_name: &str) -> bool {
    file_name.ends_with(".tmp") || file_name == COMPACTED_TEMP_NAME
}

/// Serializes one `(key, record)` pair as a line, without the trailing
/// newline.
pub fn encode_line(key: &[u8], record: &Record) -> Vec<u8> {
    let value_bytes: &[u8] = match record {
        Record::Value(v) => v.as_slice(),
        Record::Tombstone => TOMBSTONE_MARKER,
    };
    let mut line = Vec::with_capacity(key.len() + value_bytes.len() + 1);
    line.extend_from_slice(key);
    line.push(b'=');
    line.extend_from_slice(value_bytes);
    line
}

/// Parses a line of the form `key=value-or-tombstone-marker` into
/// `(key, record)`. Returns `None` if the line has no `=` separator or an
/// empty key — both are treated as corruption by callers, logged and
/// skipped rather than fatal.
pub fn decode_line(line: &str) -> Option<(Vec<u8>, Record)> {
    let (key, raw_value) = line.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    let record = if raw_value.as_bytes() == TOMBSTONE_MARKER {
        Record::Tombstone
    } else {
        Record::Value(raw_value.as_bytes().to_vec())
    };
    Some((key.as_bytes().to_vec(), record))
}
