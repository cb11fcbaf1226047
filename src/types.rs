//! Core identifiers: global document ids, timestamps, and bucket addressing.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;

/// Fixed-width digest derived from a [`DocumentId`]. Two documents with the
/// same identifier have the same `GlobalId`; equality and hashing follow the
/// digest bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub [u8; 12]);

impl GlobalId {
    /// Derives a `GlobalId` the same way two documents that share an
    /// identifier always hash to the same digest: a stable, non-cryptographic
    /// hash of the identifier's bytes, truncated/expanded to a fixed width.
    pub fn from_document_id(id: &DocumentId) -> Self {
        let mut hasher = ahash_like_hasher();
        id.as_str().hash(&mut hasher);
        let h = hasher.finish();
        let mut bytes = [0u8; 12];
        bytes[0..8].copy_from_slice(&h.to_le_bytes());
        // Mix a second pass into the remaining bytes so short ids with
        // colliding low bits still diverge across the full width.
        let mut hasher2 = ahash_like_hasher();
        (id.as_str(), 0xa5a5_a5a5u32).hash(&mut hasher2);
        bytes[8..12].copy_from_slice(&hasher2.finish().to_le_bytes()[0..4]);
        GlobalId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

fn ahash_like_hasher() -> std::collections::hash_map::DefaultHasher {
    std::collections::hash_map::DefaultHasher::new()
}

/// Unsigned 64-bit monotonic value assigned by the caller. Uniqueness is not
/// guaranteed by the caller; collisions are rejected by the store.
pub type Timestamp = u64;

/// 64-bit bucket identifier, as produced by a bucket-id factory external to
/// this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketId(pub u64);

impl BucketId {
    /// Number of significant bits used to address this bucket, mirroring the
    /// "used bits" concept a real bucket-id factory carries alongside the raw
    /// id (needed by `split` to decide which target a document belongs to).
    pub fn used_bits(self) -> u32 {
        if self.0 == 0 {
            1
        } else {
            64 - self.0.leading_zeros()
        }
    }

    /// Re-derives a bucket id truncated to `bits` significant bits, the way
    /// `split` compares a document's natural bucket id against a target's id
    /// under the target's bit width.
    pub fn truncated_to(self, bits: u32) -> BucketId {
        if bits >= 64 {
            return self;
        }
        let mask = (1u64 << bits) - 1;
        BucketId(self.0 & mask)
    }
}

/// Top-level namespace a bucket lives under. Only [`BucketSpace::Default`] is
/// served; any other value yields an empty result set where applicable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum BucketSpace {
    Default,
    Other,
}

impl BucketSpace {
    pub fn is_default(self) -> bool {
        matches!(self, BucketSpace::Default)
    }
}

/// Named shard key under which documents are grouped.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Bucket {
    pub space: BucketSpace,
    pub id: BucketId,
}

impl Bucket {
    pub fn new(id: BucketId) -> Self {
        Bucket {
            space: BucketSpace::Default,
            id,
        }
    }

    pub fn in_other_space(id: BucketId) -> Self {
        Bucket {
            space: BucketSpace::Other,
            id,
        }
    }
}

/// Server-side cursor id. 64-bit, starts at 1, monotonically increasing,
/// never reused within the process lifetime; 0 is reserved as "unset".
pub type IteratorId = u64;
