//! Approximate membership filter used to count unique visitors.
//!
//! A classic Bloom filter: `m` bits shared by `k` probes. The probes are
//! derived from two seeded SipHash values (`h1 + i * h2`, modulo `m`), so only two hashes
//! are computed per key regardless of `k`.
//!
//! Bits are only ever set, never cleared, which gives the "no false
//! negatives" guarantee: once `add(key)` returned, `contains(key)` is true
//! for the rest of the filter's life. The false positive rate grows as the
//! number of distinct keys exceeds the configured capacity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

/// Default number of distinct keys the filter is sized for.
pub const DEFAULT_CAPACITY: usize = 100_000;
/// Default target false positive rate at `DEFAULT_CAPACITY`.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;
/// Largest capacity a filter is sized for (about 120 MB of bits at 1%).
pub const MAX_CAPACITY: usize = 100_000_000;

const MAX_HASHES: u32 = 16;

/// Concurrent Bloom filter over string keys.
#[derive(Debug)]
pub struct ApproximateSet {
    words: RwLock<Vec<u64>>,
    bits: u64,
    hashes: u32,
}

impl Default for ApproximateSet {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_FALSE_POSITIVE_RATE)
    }
}

impl ApproximateSet {
    /// Size a filter for `capacity` keys at `false_positive_rate`.
    ///
    /// Out-of-range inputs are clamped: capacity to `[1, MAX_CAPACITY]`, the
    /// rate to `[1e-9, 0.5]`.
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        let n = capacity.clamp(1, MAX_CAPACITY) as f64;
        let p = if false_positive_rate.is_finite() {
            false_positive_rate.clamp(1e-9, 0.5)
        } else {
            DEFAULT_FALSE_POSITIVE_RATE
        };
        let ln2 = std::f64::consts::LN_2;

        let bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let hashes = ((bits as f64 / n) * ln2).round().clamp(1.0, MAX_HASHES as f64) as u32;
        let words = bits.div_ceil(64) as usize;

        Self {
            words: RwLock::new(vec![0; words]),
            bits,
            hashes,
        }
    }

    /// Number of bits in the filter (`m`).
    pub fn bit_len(&self) -> u64 {
        self.bits
    }

    /// Number of probes per key (`k`).
    pub fn hash_count(&self) -> u32 {
        self.hashes
    }

    /// Probabilistic membership test. Never false for an added key.
    pub fn contains(&self, key: &str) -> bool {
        let (h1, h2) = hash_pair(key);
        let words = self.words.read().unwrap_or_else(PoisonError::into_inner);
        self.probes(h1, h2).all(|bit| is_set(&words, bit))
    }

    /// Mark `key` as seen. Idempotent.
    pub fn add(&self, key: &str) {
        self.check_and_add(key);
    }

    /// Test and insert under one write lock.
    ///
    /// Returns `true` if the key was (possibly) present already, `false` if
    /// this call is the one that made it present.
    pub fn check_and_add(&self, key: &str) -> bool {
        let (h1, h2) = hash_pair(key);
        let mut words = self.words.write().unwrap_or_else(PoisonError::into_inner);

        let mut present = true;
        for bit in self.probes(h1, h2) {
            let (idx, mask) = locate(bit);
            if words[idx] & mask == 0 {
                present = false;
                words[idx] |= mask;
            }
        }
        present
    }

    /// Estimate of the number of distinct keys added so far
    /// (Swamidass & Baldi), derived from the fraction of set bits.
    pub fn estimated_len(&self) -> u64 {
        let set: u64 = {
            let words = self.words.read().unwrap_or_else(PoisonError::into_inner);
            words.iter().map(|w| u64::from(w.count_ones())).sum()
        };
        if set == 0 {
            return 0;
        }
        let m = self.bits as f64;
        let k = f64::from(self.hashes);
        let fill = (set as f64 / m).min(1.0 - f64::EPSILON);
        (-(m / k) * (1.0 - fill).ln()).round() as u64
    }

    fn probes(&self, h1: u64, h2: u64) -> impl Iterator<Item = u64> {
        probe_positions(h1, h2, self.bits, self.hashes)
    }
}

fn hash_pair(key: &str) -> (u64, u64) {
    let h1 = seeded_hash(0x51_7c_c1_b7, key);
    let h2 = seeded_hash(0x27_22_0a_95, key);
    (h1, h2)
}

/// `h1 + i * step (mod bits)` for `i in 0..hashes`.
///
/// `bits` is not a power of two, so `h2` may be a multiple of it; the step is
/// reduced modulo `bits` and kept non-zero so the probes never all land on
/// the same bit.
fn probe_positions(h1: u64, h2: u64, bits: u64, hashes: u32) -> impl Iterator<Item = u64> {
    let start = h1 % bits;
    let step = (h2 % bits).max(1);
    (0..u64::from(hashes)).map(move |i| start.wrapping_add(i.wrapping_mul(step)) % bits)
}

fn seeded_hash(seed: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

fn locate(bit: u64) -> (usize, u64) {
    ((bit / 64) as usize, 1u64 << (bit % 64))
}

fn is_set(words: &[u64], bit: u64) -> bool {
    let (idx, mask) = locate(bit);
    words[idx] & mask != 0
}
