//! Bloom filters used on the transaction relay path.
//!
//! [`BloomFilter`] is the classic peer-negotiated transaction filter: a peer
//! uploads one and we only announce transactions relevant to it.
//! [`RollingBloomFilter`] is a generational variant that forgets the oldest
//! third of its entries as new ones arrive, used for the recent-rejects set.

use okapi_chain::{serialization::OkapiSerialize, transaction::Transaction, transparent};
use rand::{thread_rng, Rng};

/// The largest filter a peer may install, in bytes.
pub const MAX_BLOOM_FILTER_SIZE: usize = 36_000;

/// The largest number of hash functions a peer may request.
pub const MAX_HASH_FUNCS: u32 = 50;

const LN2SQUARED: f64 = 0.480_453_013_918_201_4;
const LN2: f64 = 0.693_147_180_559_945_3;

/// Seed multiplier decorrelating the filter's hash functions.
const HASH_SEED_STEP: u32 = 0xFBA4_C795;

/// How a [`BloomFilter`] grows as matching transactions stream past.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BloomUpdate {
    /// Never add anything to the filter.
    None,
    /// Add the outpoint of every matched output, so chains of spends keep
    /// matching.
    All,
    /// Like `All`, but only for pay-to-pubkey style outputs. The relay
    /// layer treats scripts as opaque, so no outpoints are added here.
    PubkeyOnly,
}

/// A peer-supplied transaction filter, as negotiated with `filterload`.
///
/// A filter with no data matches every transaction: peers that upload an
/// undersized filter have asked for everything.
#[derive(Clone, Debug)]
pub struct BloomFilter {
    data: Vec<u8>,
    num_hashes: u32,
    tweak: u32,
    flags: BloomUpdate,
}

impl BloomFilter {
    /// Build a filter sized for `elements` entries at the given
    /// false-positive rate, clamped to the protocol maximums.
    pub fn new(elements: usize, fp_rate: f64, tweak: u32, flags: BloomUpdate) -> Self {
        let bits = (-1.0 / LN2SQUARED * elements as f64 * fp_rate.ln()) as usize;
        let data = vec![0u8; bits.min(MAX_BLOOM_FILTER_SIZE * 8) / 8];
        let num_hashes =
            (((data.len() * 8) as f64 / elements as f64 * LN2) as u32).min(MAX_HASH_FUNCS);

        BloomFilter {
            data,
            num_hashes,
            tweak,
            flags,
        }
    }

    fn bit_index(&self, hash_num: u32, data: &[u8]) -> usize {
        let seed = hash_num.wrapping_mul(HASH_SEED_STEP).wrapping_add(self.tweak);
        murmur_hash3(seed, data) as usize % (self.data.len() * 8)
    }

    /// Add an element to the filter.
    pub fn insert(&mut self, data: &[u8]) {
        if self.data.is_empty() {
            return;
        }
        for n in 0..self.num_hashes {
            let index = self.bit_index(n, data);
            self.data[index >> 3] |= 1 << (7 & index);
        }
    }

    /// Returns `true` if the element may have been inserted.
    pub fn contains(&self, data: &[u8]) -> bool {
        if self.data.is_empty() {
            return true;
        }
        (0..self.num_hashes).all(|n| {
            let index = self.bit_index(n, data);
            self.data[index >> 3] & (1 << (7 & index)) != 0
        })
    }

    /// Returns `true` if `transaction` is relevant to this filter, growing
    /// the filter per its update flags so later spends of matched outputs
    /// stay relevant.
    ///
    /// A transaction is relevant if the filter contains its id, one of its
    /// output scripts, one of its spent outpoints, or one of its input
    /// scripts.
    pub fn is_relevant_and_update(&mut self, transaction: &Transaction) -> bool {
        let txid = transaction.hash();
        let mut found = self.contains(&txid.0);

        for (index, output) in transaction.outputs.iter().enumerate() {
            if output.lock_script.is_empty() || !self.contains(output.lock_script.as_raw_bytes()) {
                continue;
            }
            found = true;
            if self.flags == BloomUpdate::All {
                let outpoint = transparent::OutPoint::new(txid, index as u32);
                let raw = outpoint
                    .okapi_serialize_to_vec()
                    .expect("serializing an outpoint into a vec is infallible");
                self.insert(&raw);
            }
        }

        if found {
            return true;
        }

        for input in &transaction.inputs {
            let raw = input
                .outpoint
                .okapi_serialize_to_vec()
                .expect("serializing an outpoint into a vec is infallible");
            if self.contains(&raw) {
                return true;
            }
            if !input.unlock_script.is_empty() && self.contains(input.unlock_script.as_raw_bytes())
            {
                return true;
            }
        }

        false
    }
}

/// A bloom filter that only remembers its most recent entries.
///
/// Entries are tagged with one of three generations packed into 2-bit lanes.
/// When the current generation fills up, the oldest generation is wiped and
/// its slot reused, so the filter always holds at least the last
/// `(elements + 1) / 2` inserts and at most ~1.5 × `elements`.
pub struct RollingBloomFilter {
    data: Vec<u64>,
    num_hashes: u32,
    entries_per_generation: u32,
    entries_this_generation: u32,
    generation: u64,
    tweak: u32,
}

impl RollingBloomFilter {
    /// Build a filter that remembers at least the last `elements` inserts
    /// at the given false-positive rate.
    pub fn new(elements: u32, fp_rate: f64) -> Self {
        let log_fp_rate = fp_rate.ln();
        // Each inserted element is covered by this many bits:
        let num_hashes = ((log_fp_rate / 0.5_f64.ln()).round() as i64).clamp(1, 50) as u32;
        // With two generations of entries alive at any one time, the third
        // being wiped, capacity per generation is half the requested total.
        let entries_per_generation = (elements + 1) / 2;
        let max_elements = entries_per_generation * 3;
        let filter_bits = (-(num_hashes as f64) * max_elements as f64
            / (1.0 - (log_fp_rate / num_hashes as f64).exp()).ln())
        .ceil() as u32;
        // Two bit lanes per position, each lane a u64 word.
        let words = ((filter_bits.div_ceil(64)) << 1) as usize;

        let mut filter = RollingBloomFilter {
            data: vec![0; words],
            num_hashes,
            entries_per_generation,
            entries_this_generation: 0,
            generation: 1,
            tweak: 0,
        };
        filter.reset();
        filter
    }

    fn hash(&self, hash_num: u32, data: &[u8]) -> u32 {
        let seed = hash_num.wrapping_mul(HASH_SEED_STEP).wrapping_add(self.tweak);
        murmur_hash3(seed, data)
    }

    /// Add an element to the filter, retiring the oldest generation if the
    /// current one is full.
    pub fn insert(&mut self, data: &[u8]) {
        if self.entries_this_generation == self.entries_per_generation {
            self.entries_this_generation = 0;
            self.generation += 1;
            if self.generation == 4 {
                self.generation = 1;
            }
            let generation_mask_1 = 0u64.wrapping_sub(self.generation & 1);
            let generation_mask_2 = 0u64.wrapping_sub(self.generation >> 1);
            // Wipe every position tagged with the generation we are reusing.
            for p in (0..self.data.len()).step_by(2) {
                let p1 = self.data[p];
                let p2 = self.data[p + 1];
                let mask = (p1 ^ generation_mask_1) | (p2 ^ generation_mask_2);
                self.data[p] = p1 & mask;
                self.data[p + 1] = p2 & mask;
            }
        }
        self.entries_this_generation += 1;

        for n in 0..self.num_hashes {
            let h = self.hash(n, data);
            let bit = h & 0x3f;
            // The low bits of h select the bit, the high bits the position,
            // so reusing h for both is safe.
            let pos = fast_range(h, self.data.len() as u32) as usize;
            self.data[pos & !1] =
                (self.data[pos & !1] & !(1u64 << bit)) | ((self.generation & 1) << bit);
            self.data[pos | 1] =
                (self.data[pos | 1] & !(1u64 << bit)) | ((self.generation >> 1) << bit);
        }
    }

    /// Returns `true` if the element may have been inserted and has not yet
    /// been retired.
    pub fn contains(&self, data: &[u8]) -> bool {
        for n in 0..self.num_hashes {
            let h = self.hash(n, data);
            let bit = h & 0x3f;
            let pos = fast_range(h, self.data.len() as u32) as usize;
            if (self.data[pos & !1] | self.data[pos | 1]) >> bit & 1 == 0 {
                return false;
            }
        }
        true
    }

    /// Forget every entry and rotate the hash seed, so a cleared filter is
    /// uncorrelated with its previous life.
    pub fn reset(&mut self) {
        self.tweak = thread_rng().gen();
        self.entries_this_generation = 0;
        self.generation = 1;
        self.data.fill(0);
    }
}

/// Map a uniform 32-bit value onto `[0, n)` without the modulo bias of `%`.
fn fast_range(x: u32, n: u32) -> u32 {
    ((x as u64 * n as u64) >> 32) as u32
}

/// MurmurHash3 (32-bit), the hash family standardized for relay bloom
/// filters.
fn murmur_hash3(seed: u32, data: &[u8]) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let blocks = data.len() / 4;

    for block in 0..blocks {
        let i = block * 4;
        let mut k1 = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);

        h1 ^= k1;
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = &data[blocks * 4..];
    let mut k1 = 0u32;
    if tail.len() >= 3 {
        k1 ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k1 ^= tail[0] as u32;
        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(15);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;

    h1
}
