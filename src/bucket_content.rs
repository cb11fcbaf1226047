//! [`BucketContent`] — a single bucket's entry log, its GID-to-newest-entry
//! index, and the aggregated [`BucketInfo`] kept in sync with it.
//!
//! The GID map holds the *timestamp* of the newest entry for each GID rather
//! than a shared reference to the entry itself — `entries` remains the
//! sole owner of every [`DocEntry`], and a timestamp is a cheap, `Copy`
//! handle back into it via binary search.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::entry::{BucketEntry, DocEntry};
use crate::fatal_invariant_violation;
use crate::types::{GlobalId, Timestamp};

/// Aggregate stats for a bucket: checksum, counts, sizes, ready, active.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub checksum: u32,
    pub document_count: u32,
    pub document_size: u32,
    pub entry_count: u32,
    pub used_size: u32,
    pub ready: bool,
    pub active: bool,
}

impl Default for BucketInfo {
    fn default() -> Self {
        BucketInfo {
            checksum: 0,
            document_count: 0,
            document_size: 0,
            entry_count: 0,
            used_size: 0,
            ready: true,
            active: false,
        }
    }
}

/// Coerces an XOR accumulator: 0 means "empty"; if contributing entries
/// exist but happen to XOR to 0, coerce to 1.
fn coerce_checksum(checksum: u32, contributing_entries: u32) -> u32 {
    if contributing_entries == 0 {
        0
    } else if checksum == 0 {
        1
    } else {
        checksum
    }
}

pub struct BucketContent {
    entries: Vec<BucketEntry>,
    gid_map: HashMap<GlobalId, Timestamp>,
    info: BucketInfo,
    outdated_info: bool,
    active: bool,
}

impl Default for BucketContent {
    fn default() -> Self {
        BucketContent {
            entries: Vec::new(),
            gid_map: HashMap::new(),
            info: BucketInfo::default(),
            outdated_info: false,
            active: false,
        }
    }
}

impl BucketContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[BucketEntry] {
        &self.entries
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sets the activity flag. Does not mark `info` outdated — activity is
    /// stored outside the checksum.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn entry_index_for_timestamp(&self, t: Timestamp) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&t, |e| e.timestamp())
    }

    pub fn has_timestamp(&self, t: Timestamp) -> bool {
        self.entry_index_for_timestamp(t).is_ok()
    }

    /// Returns the entry at exactly `t`, or `None`. O(log n).
    pub fn get_entry_by_timestamp(&self, t: Timestamp) -> Option<&DocEntry> {
        self.entry_index_for_timestamp(t)
            .ok()
            .map(|i| &self.entries[i].entry)
    }

    /// Returns the newest entry for the GID of `document_id`, or `None`.
    /// O(1) via `gid_map`.
    pub fn get_entry_by_document_id(&self, document_id: &DocumentId) -> Option<&DocEntry> {
        let gid = GlobalId::from_document_id(document_id);
        let ts = *self.gid_map.get(&gid)?;
        self.get_entry_by_timestamp(ts)
    }

    /// Places a new entry into `entries`, maintaining ascending timestamp
    /// order, and updates `gid_map`.
    pub fn insert(&mut self, entry: DocEntry) {
        let bucket_entry = BucketEntry::new(entry);
        let timestamp = bucket_entry.timestamp();

        let insertion_index = if self
            .entries
            .last()
            .map_or(true, |last| last.timestamp() < timestamp)
        {
            self.entries.len()
        } else {
            match self.entry_index_for_timestamp(timestamp) {
                Ok(existing_index) => {
                    if self.entries[existing_index] == bucket_entry {
                        return; // accepted no-op: identical re-insert
                    }
                    fatal_invariant_violation!(
                        "timestamp {timestamp} already present with a different entry"
                    );
                },
                Err(insertion_index) => insertion_index,
            }
        };
        let gid = bucket_entry.gid;
        let is_put = bucket_entry.entry.is_put();
        let size = bucket_entry.entry.size();
        let entry_checksum = bucket_entry.checksum();
        self.entries.insert(insertion_index, bucket_entry);

        match self.gid_map.get(&gid).copied() {
            None => {
                self.gid_map.insert(gid, timestamp);
                if !self.outdated_info {
                    if is_put {
                        let checksum = self.info.checksum ^ entry_checksum;
                        self.info.checksum = if checksum == 0 { 1 } else { checksum };
                        self.info.document_count += 1;
                        self.info.document_size += size;
                    }
                    self.info.entry_count += 1;
                    self.info.used_size += size;
                }
            },
            Some(existing_ts) => {
                if existing_ts < timestamp {
                    self.gid_map.insert(gid, timestamp);
                }
                self.outdated_info = true;
            },
        }

        debug_assert!(self.outdated_info || self.info.entry_count as usize == self.entries.len());
    }

    /// Locates the entry at `timestamp` and removes it from both `entries`
    /// and (conditionally) `gid_map`.
    ///
    /// Mirrors the reference implementation's quirk: this removes the
    /// GID-map entry outright when it pointed at the erased timestamp,
    /// without promoting an older surviving entry of the same GID. `revert`
    /// (below) does promote; the two are intentionally asymmetric — see
    /// DESIGN.md.
    pub fn erase_entry(&mut self, timestamp: Timestamp) {
        let Ok(index) = self.entry_index_for_timestamp(timestamp) else {
            return;
        };
        let removed = self.entries.remove(index);
        if self.gid_map.get(&removed.gid) == Some(&timestamp) {
            self.gid_map.remove(&removed.gid);
        }
        self.outdated_info = true;
    }

    /// Undoes a single entry at `timestamp`.
    pub fn revert(&mut self, timestamp: Timestamp) {
        let Some(reverted_index) = self.entry_index_for_timestamp(timestamp).ok() else {
            return;
        };
        let reverted_gid = self.entries[reverted_index].gid;

        let mut newest_surviving: Option<Timestamp> = None;
        let mut new_entries = Vec::with_capacity(self.entries.len().saturating_sub(1));
        for bucket_entry in self.entries.drain(..) {
            if bucket_entry.timestamp() == timestamp {
                continue;
            }
            if bucket_entry.gid == reverted_gid {
                newest_surviving = Some(match newest_surviving {
                    Some(ts) => ts.max(bucket_entry.timestamp()),
                    None => bucket_entry.timestamp(),
                });
            }
            new_entries.push(bucket_entry);
        }
        self.entries = new_entries;

        match newest_surviving {
            Some(ts) => {
                self.gid_map.insert(reverted_gid, ts);
            },
            None => {
                self.gid_map.remove(&reverted_gid);
            },
        }
        self.outdated_info = true;
    }

    /// Returns the cached `BucketInfo`, recomputing it first if outdated.
    pub fn get_bucket_info(&mut self) -> BucketInfo {
        if self.outdated_info {
            self.recompute_info();
        }
        self.info
    }

    fn recompute_info(&mut self) {
        let mut document_count = 0u32;
        let mut document_size = 0u32;
        let mut used_size = 0u32;
        let mut checksum = 0u32;
        let mut contributing = 0u32;

        for bucket_entry in &self.entries {
            used_size += bucket_entry.entry.size();
            if bucket_entry.entry.is_remove() {
                continue;
            }
            if !bucket_entry.entry.is_put() {
                continue;
            }
            let is_newest = self.gid_map.get(&bucket_entry.gid) == Some(&bucket_entry.timestamp());
            if !is_newest {
                continue;
            }
            document_count += 1;
            document_size += bucket_entry.entry.size();
            checksum ^= bucket_entry.checksum();
            contributing += 1;
        }

        self.info = BucketInfo {
            checksum: coerce_checksum(checksum, contributing),
            document_count,
            document_size,
            entry_count: self.entries.len() as u32,
            used_size,
            ready: true,
            active: self.active,
        };
        self.outdated_info = false;
    }

    /// Returns a newline-separated dump of entry debug strings, or the
    /// caller returns the literal `DOESN'T EXIST` string if the bucket itself
    /// is missing.
    pub fn dump(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{:?}", e.entry))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn put(ts: Timestamp, id: &str) -> DocEntry {
        DocEntry::Put(ts, Document::new(DocumentId::new(id)))
    }

    #[test]
    fn insert_then_get_by_id_and_timestamp() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        assert_eq!(
            bc.get_entry_by_document_id(&DocumentId::new("id:ns:t::a")),
            Some(&put(100, "id:ns:t::a"))
        );
        assert_eq!(bc.get_entry_by_timestamp(100), Some(&put(100, "id:ns:t::a")));
        assert!(bc.has_timestamp(100));
        assert!(!bc.has_timestamp(200));
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(100, "id:ns:t::a"));
        assert_eq!(bc.entries().len(), 1);
    }

    #[test]
    #[should_panic(expected = "fatal invariant violation")]
    fn conflicting_insert_is_fatal() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(100, "id:ns:t::b"));
    }

    #[test]
    fn checksum_zero_iff_no_live_put() {
        let mut bc = BucketContent::new();
        assert_eq!(bc.get_bucket_info().checksum, 0);
        bc.insert(put(100, "id:ns:t::a"));
        assert_ne!(bc.get_bucket_info().checksum, 0);
    }

    #[test]
    fn second_put_keeps_document_count_one_but_bumps_entry_count() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(200, "id:ns:t::a"));
        let info = bc.get_bucket_info();
        assert_eq!(info.document_count, 1);
        assert_eq!(info.entry_count, 2);
    }

    #[test]
    fn remove_then_revert_restores_put() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(200, "id:ns:t::a"));
        bc.insert(DocEntry::Remove(300, DocumentId::new("id:ns:t::a")));
        assert!(bc
            .get_entry_by_document_id(&DocumentId::new("id:ns:t::a"))
            .unwrap()
            .is_remove());

        bc.revert(300);
        let entry = bc
            .get_entry_by_document_id(&DocumentId::new("id:ns:t::a"))
            .unwrap();
        assert_eq!(entry.timestamp(), 200);
        let info = bc.get_bucket_info();
        assert_eq!(info.document_count, 1);
        assert_eq!(info.entry_count, 2);
    }

    #[test]
    fn erase_entry_does_not_promote_older_version() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(200, "id:ns:t::a"));
        bc.erase_entry(200);
        // Documented quirk: gid_map loses the
        // mapping entirely rather than falling back to the ts=100 entry.
        assert_eq!(
            bc.get_entry_by_document_id(&DocumentId::new("id:ns:t::a")),
            None
        );
        assert!(bc.has_timestamp(100));
    }

    #[test]
    fn entry_count_matches_len_after_recompute() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        bc.insert(put(200, "id:ns:t::b"));
        bc.insert(DocEntry::Remove(300, DocumentId::new("id:ns:t::a")));
        let info = bc.get_bucket_info();
        assert_eq!(info.entry_count as usize, bc.entries().len());
        let used: u32 = bc.entries().iter().map(|e| e.entry.size()).sum();
        assert_eq!(info.used_size, used);
    }

    /// `BucketInfo` is the wire shape returned by `getBucketInfo`-style admin
    /// endpoints; it must round-trip through JSON untouched.
    #[test]
    fn bucket_info_json_round_trip() {
        let mut bc = BucketContent::new();
        bc.insert(put(100, "id:ns:t::a"));
        let info = bc.get_bucket_info();

        let json = serde_json::to_string(&info).unwrap();
        let decoded: BucketInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, decoded);
    }
}
