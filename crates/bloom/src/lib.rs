//! # Bloom Filter
//!
//! Space-efficient probabilistic data structures for set-membership testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the
//! set (no false negatives), but may occasionally report that a key **is**
//! in the set when it isn't (false positives).
//!
//! This crate provides two variants:
//!
//! - [`BloomFilter`] — general purpose, sized from an expected item count
//!   and a target false-positive rate.
//! - [`SstableFilter`] — the fixed-size variant StratumKV attaches to every
//!   on-disk SSTable file as a negative-lookup gate. It trades precision for
//!   being cheap to build without knowing the exact entry count in advance.
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new(1000, 0.01);
//! bf.add(b"hello");
//! assert!(bf.might_contain(b"hello"));
//! ```

use std::io::{self, Read, Write};

/// A bloom filter backed by a bit vector with `k` independent hash
/// functions, sized for an expected item count and target false-positive
/// rate.
///
/// Uses double hashing: `h(i) = h1 + i * h2`, where `h1` and `h2` come from
/// two distinct integer mixing accumulations over the key's bytes.
pub struct BloomFilter {
    bits: Vec<u8>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates a new bloom filter sized for `expected_items` with the given
    /// target `false_positive_rate`.
    ///
    /// Bit count: `m = ceil(-n * ln(p) / ln(2)^2)`.
    /// Hash count: `k = round((m/n) * ln(2))`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in
    /// `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / std::f64::consts::LN_2.powi(2)).ceil() as u64;
        let m = m.max(8);

        let k = ((m as f64 / n) * std::f64::consts::LN_2).round() as u32;
        let k = k.max(1);

        let byte_len = ((m + 7) / 8) as usize;

        Self {
            bits: vec![0u8; byte_len],
            num_bits: m,
            num_hashes: k,
        }
    }

    fn from_raw(bits: Vec<u8>, num_bits: u64, num_hashes: u32) -> Self {
        Self {
            bits,
            num_bits,
            num_hashes,
        }
    }

    /// Adds a key to the filter.
    pub fn add(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let idx = probe(h1, h2, i as u64, self.num_bits);
            set_bit(&mut self.bits, idx);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not**.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let idx = probe(h1, h2, i as u64, self.num_bits);
            if !get_bit(&self.bits, idx) {
                return false;
            }
        }
        true
    }

    /// Returns the number of bits in the filter.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Returns the number of hash functions (`k`).
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Size of the serialized form in bytes: `num_bits(u64) + num_hashes(u32)
    /// + bits_len(u32) + bits`.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 4 + 4 + self.bits.len()
    }

    /// Serializes the filter to a writer. All integers little-endian.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.num_bits.to_le_bytes())?;
        w.write_all(&self.num_hashes.to_le_bytes())?;
        w.write_all(&(self.bits.len() as u32).to_le_bytes())?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Deserializes a filter written by [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];
        let mut buf4 = [0u8; 4];

        r.read_exact(&mut buf8)?;
        let num_bits = u64::from_le_bytes(buf8);

        r.read_exact(&mut buf4)?;
        let num_hashes = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let bits_len = u32::from_le_bytes(buf4) as usize;

        const MAX_BLOOM_BYTES: usize = 128 * 1024 * 1024;
        if bits_len > MAX_BLOOM_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} bytes", bits_len),
            ));
        }

        let mut bits = vec![0u8; bits_len];
        r.read_exact(&mut bits)?;

        Ok(Self::from_raw(bits, num_bits, num_hashes))
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("bytes", &self.bits.len())
            .finish()
    }
}

/// Fixed-size bloom filter (8192 bits, two hash probes) attached to a single
/// on-disk SSTable file.
///
/// Unlike [`BloomFilter`], this variant does not need an expected item
/// count up front — it is sized once and reused for any SSTable regardless
/// of how many keys end up in it, trading some false-positive precision on
/// large files for simplicity at build time.
#[derive(Debug, Clone)]
pub struct SstableFilter {
    bits: Vec<u8>,
}

/// Number of bits in every [`SstableFilter`] (1024 bytes).
pub const SSTABLE_FILTER_BITS: usize = 8192;

impl SstableFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bits: vec![0u8; SSTABLE_FILTER_BITS / 8],
        }
    }

    /// Adds a key to the filter.
    pub fn add(&mut self, key: &[u8]) {
        let (h1, h2) = string_hash_pair(key);
        for idx in [h1 % SSTABLE_FILTER_BITS as u64, h2 % SSTABLE_FILTER_BITS as u64] {
            set_bit(&mut self.bits, idx);
        }
    }

    /// Returns `true` if the key **might** be present in the file this
    /// filter was built from.
    #[must_use]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = string_hash_pair(key);
        for idx in [h1 % SSTABLE_FILTER_BITS as u64, h2 % SSTABLE_FILTER_BITS as u64] {
            if !get_bit(&self.bits, idx) {
                return false;
            }
        }
        true
    }
}

impl Default for SstableFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Two seed hashes derived from the key's bytes via two distinct integer
/// mixing accumulations (mix-with-31 and mix-with-17), as specified for the
/// general-purpose filter's double hashing scheme.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    let mut h1: u64 = 0;
    let mut h2: u64 = 0;
    for &b in key {
        h1 = h1.wrapping_mul(31).wrapping_add(b as u64);
        h2 = h2.wrapping_mul(17).wrapping_add(b as u64);
    }
    (h1, h2)
}

/// Probe `i`: `(h1 + i * h2) mod m`.
fn probe(h1: u64, h2: u64, i: u64, m: u64) -> u64 {
    h1.wrapping_add(i.wrapping_mul(h2)) % m
}

/// A simple string hash (FNV-1a-style accumulation) and its 16-bit rotation,
/// used by the fixed-size per-SSTable filter.
fn string_hash_pair(key: &[u8]) -> (u64, u64) {
    let mut h: u64 = 0;
    for &b in key {
        h = h.wrapping_mul(131).wrapping_add(b as u64);
    }
    let rotated = h.rotate_left(16);
    (h, rotated)
}

fn set_bit(bits: &mut [u8], idx: u64) {
    let byte_idx = (idx / 8) as usize;
    let bit_offset = (idx % 8) as u8;
    bits[byte_idx] |= 1 << bit_offset;
}

fn get_bit(bits: &[u8], idx: u64) -> bool {
    let byte_idx = (idx / 8) as usize;
    let bit_offset = (idx % 8) as u8;
    (bits[byte_idx] >> bit_offset) & 1 == 1
}
