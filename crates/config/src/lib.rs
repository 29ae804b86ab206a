//! # Config
//!
//! Tunable thresholds for the StratumKV storage engine.
//!
//! [`EngineConfig`] carries the thresholds the engine tunes (memtable
//! rotation threshold, soft disk limit, soft file count, WAL sync mode,
//! Bloom false-positive rate). The core engine never reads the environment
//! itself — [`EngineConfig::from_env`] is for host programs (the `cli`
//! crate) that want `STRATUMKV_*` variables to override defaults.

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Memtable byte-size threshold that triggers rotation into the
    /// immutable queue. Default: 4 KiB.
    pub memtable_threshold_bytes: usize,
    /// Soft total on-disk SSTable size that triggers size-based compaction.
    /// Default: 1 GiB.
    pub soft_disk_limit_bytes: u64,
    /// Soft SSTable file count that triggers file-count-based compaction.
    /// Default: 10.
    pub soft_file_count: usize,
    /// If `true`, every WAL append is followed by an `fsync`.
    pub wal_sync: bool,
    /// Target false-positive rate for Bloom filters that size themselves
    /// from an expected item count (the general-purpose [`bloom::BloomFilter`],
    /// not the fixed-size per-SSTable filter the engine attaches to every
    /// flushed file).
    pub bloom_false_positive_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memtable_threshold_bytes: 4 * 1024,
            soft_disk_limit_bytes: 1024 * 1024 * 1024,
            soft_file_count: 10,
            wal_sync: true,
            bloom_false_positive_rate: 0.01,
        }
    }
}

impl EngineConfig {
    /// Builds a config from defaults overridden by `STRATUMKV_*` environment
    /// variables, for use by host programs. The core engine never calls
    /// this itself.
    ///
    /// | Variable                       | Overrides                     |
    /// |---------------------------------|--------------------------------|
    /// | `STRATUMKV_FLUSH_BYTES`         | `memtable_threshold_bytes`     |
    /// | `STRATUMKV_DISK_LIMIT_BYTES`    | `soft_disk_limit_bytes`        |
    /// | `STRATUMKV_FILE_COUNT_LIMIT`    | `soft_file_count`              |
    /// | `STRATUMKV_WAL_SYNC`            | `wal_sync`                     |
    /// | `STRATUMKV_BLOOM_FPR`           | `bloom_false_positive_rate`    |
    ///
    /// Unset or unparsable variables fall back to the default silently.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            memtable_threshold_bytes: env_parsed("STRATUMKV_FLUSH_BYTES")
                .unwrap_or(defaults.memtable_threshold_bytes),
            soft_disk_limit_bytes: env_parsed("STRATUMKV_DISK_LIMIT_BYTES")
                .unwrap_or(defaults.soft_disk_limit_bytes),
            soft_file_count: env_parsed("STRATUMKV_FILE_COUNT_LIMIT")
                .unwrap_or(defaults.soft_file_count),
            wal_sync: env_parsed("STRATUMKV_WAL_SYNC").unwrap_or(defaults.wal_sync),
            bloom_false_positive_rate: env_parsed("STRATUMKV_BLOOM_FPR")
                .unwrap_or(defaults.bloom_false_positive_rate),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}
