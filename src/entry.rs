//! [`DocEntry`] and [`BucketEntry`] — a single timestamped record in a
//! bucket, and the running CRC-32 checksum contribution it makes once it
//! becomes (or stops being) the newest entry for its GID.

use crate::document::{Document, DocumentId};
use crate::types::{GlobalId, Timestamp};

/// One record in a bucket's entry log. Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub enum DocEntry {
    Put(Timestamp, Document),
    Remove(Timestamp, DocumentId),
    Noop(Timestamp),
}

impl DocEntry {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DocEntry::Put(t, _) | DocEntry::Remove(t, _) | DocEntry::Noop(t) => *t,
        }
    }

    pub fn document_id(&self) -> Option<&DocumentId> {
        match self {
            DocEntry::Put(_, doc) => Some(&doc.id),
            DocEntry::Remove(_, id) => Some(id),
            DocEntry::Noop(_) => None,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, DocEntry::Remove(..))
    }

    pub fn is_put(&self) -> bool {
        matches!(self, DocEntry::Put(..))
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            DocEntry::Put(_, doc) => Some(doc),
            _ => None,
        }
    }

    /// Serialized byte size used for quotas/accounting.
    pub fn size(&self) -> u32 {
        match self {
            DocEntry::Put(_, doc) => doc.size(),
            DocEntry::Remove(_, id) => id.as_str().len() as u32,
            DocEntry::Noop(_) => 0,
        }
    }

    /// `persisted_size` mirrors `size` in this in-memory implementation:
    /// there is no on-disk encoding to diverge from.
    pub fn persisted_size(&self) -> u32 {
        self.size()
    }
}

/// Pairs a [`DocEntry`] with its cached GID, the way the bucket avoids
/// recomputing `GlobalId::from_document_id` on every lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct BucketEntry {
    pub entry: DocEntry,
    pub gid: GlobalId,
}

impl BucketEntry {
    pub fn new(entry: DocEntry) -> Self {
        let gid = entry
            .document_id()
            .map(GlobalId::from_document_id)
            .unwrap_or(GlobalId([0; 12]));
        BucketEntry { entry, gid }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.entry.timestamp()
    }

    /// CRC-32 over the concatenation of the entry's GID bytes and its 64-bit
    /// timestamp bytes.
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.gid.as_bytes());
        hasher.update(&self.timestamp().to_le_bytes());
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let e1 = BucketEntry::new(DocEntry::Put(
            100,
            Document::new(DocumentId::new("id:ns:t::a")),
        ));
        let e2 = BucketEntry::new(DocEntry::Put(
            100,
            Document::new(DocumentId::new("id:ns:t::a")),
        ));
        assert_eq!(e1.checksum(), e2.checksum());
    }

    #[test]
    fn checksum_depends_on_timestamp() {
        let e1 = BucketEntry::new(DocEntry::Put(
            100,
            Document::new(DocumentId::new("id:ns:t::a")),
        ));
        let e2 = BucketEntry::new(DocEntry::Put(
            200,
            Document::new(DocumentId::new("id:ns:t::a")),
        ));
        assert_ne!(e1.checksum(), e2.checksum());
    }
}
