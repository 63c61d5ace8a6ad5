use std::hash::BuildHasher;

use bytemuck::{Pod, Zeroable};
use modular_bitfield::prelude::B31;
use modular_bitfield::{bitfield, Specifier};
use rustc_hash::FxSeededState;

#[derive(Specifier, PartialEq)]
pub enum Status {
    Empty,
    Full,
}

/// One word of the bucket table: occupancy status plus the arena index of
/// the slot this bucket points at. A zeroed word is an empty bucket, so a
/// freshly created (zero-filled) file starts with every bucket empty.
#[bitfield(bits = 32)]
#[derive(Clone, Copy, Zeroable, Pod)]
#[repr(C)]
pub struct BucketWord {
    #[bits = 1]
    status: Status,
    slot: B31,
}

impl BucketWord {
    pub fn full_at(slot_idx: usize) -> Self {
        BucketWord::new()
            .with_status(Status::Full)
            .with_slot(slot_idx as u32)
    }

    pub fn is_empty(&self) -> bool {
        self.status() == Status::Empty
    }

    pub fn slot_idx(&self) -> usize {
        self.slot() as usize
    }
}

/// Outcome of probing the bucket table for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The key is already stored in this slot
    Found { bucket: usize, slot: usize },
    /// First empty bucket in the probe sequence
    Vacant { bucket: usize },
    /// The probe wrapped all the way around without finding an empty bucket
    Exhausted,
}

/// Maps hashed keys to buckets and runs the linear probe over the bucket
/// table.
///
/// The hasher is seeded from the table header, so every mapping of the same
/// file reproduces identical bucket placement. Changing the seed after
/// entries are written would corrupt lookups.
pub struct BucketIndex {
    nbuckets: usize,
    hasher: FxSeededState,
}

impl std::fmt::Debug for BucketIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketIndex")
            .field("nbuckets", &self.nbuckets)
            .finish_non_exhaustive()
    }
}

impl BucketIndex {
    pub fn new(nbuckets: usize, seed: u64) -> Self {
        Self {
            nbuckets,
            hasher: FxSeededState::with_seed(seed as usize),
        }
    }

    pub fn bucket_of(&self, key: &[u8]) -> usize {
        self.hasher.hash_one(key) as usize % self.nbuckets
    }

    /// Probe the bucket table for `key`, starting at its home bucket.
    ///
    /// `key_at` resolves a slot index to the key bytes stored in the arena.
    /// The scan stops at the first empty bucket; there are no tombstones
    /// because deletion is not supported.
    pub fn probe<'a>(
        &self,
        buckets: &[BucketWord],
        key: &[u8],
        key_at: impl Fn(usize) -> &'a [u8],
    ) -> Probe {
        let start = self.bucket_of(key);
        let mut b = start;
        loop {
            let word = buckets[b];
            if word.is_empty() {
                return Probe::Vacant { bucket: b };
            }
            if key_at(word.slot_idx()) == key {
                return Probe::Found {
                    bucket: b,
                    slot: word.slot_idx(),
                };
            }
            b = (b + 1) % self.nbuckets;
            if b == start {
                return Probe::Exhausted;
            }
        }
    }
}
