//! [`BucketStore`] — the process-wide mapping from bucket identifier to
//! bucket content, and the scoped guards that are the only legal handle to
//! read or mutate a [`BucketContent`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::bucket_content::BucketContent;
use crate::fatal_invariant_violation;
use crate::types::{Bucket, BucketSpace};

struct Slot {
    content: Mutex<BucketContent>,
    in_use: AtomicBool,
}

impl Slot {
    fn new() -> Self {
        Slot {
            content: Mutex::new(BucketContent::new()),
            in_use: AtomicBool::new(false),
        }
    }
}

/// Process-wide mapping from [`Bucket`] to bucket content, protected by one
/// mutex. Only the default bucket space is served.
#[derive(Default)]
pub struct BucketStore {
    buckets: Mutex<HashMap<Bucket, Arc<Slot>>>,
}

/// A held exclusive lock on a bucket's content. Drops back to not-in-use.
pub struct ExclusiveGuard {
    slot: Arc<Slot>,
}

impl ExclusiveGuard {
    pub fn content(&self) -> MutexGuard<'_, BucketContent> {
        self.slot.content.lock()
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        if !self.slot.in_use.swap(false, Ordering::Release) {
            fatal_invariant_violation!("exclusive guard dropped but bucket was not marked in-use");
        }
    }
}

/// A held shared lock on a bucket's content. Does not touch `in_use`;
/// multiple shared guards may coexist. Holding a shared guard
/// concurrently with an exclusive one on the same bucket is a caller bug this
/// store does not detect.
pub struct SharedGuard {
    slot: Arc<Slot>,
}

impl SharedGuard {
    pub fn content(&self) -> MutexGuard<'_, BucketContent> {
        self.slot.content.lock()
    }
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty bucket if absent. If present and not in-use, keeps it
    /// (logged). If present and in-use, this is a fatal violation.
    pub fn create_bucket(&self, bucket: Bucket) {
        let mut buckets = self.buckets.lock();
        match buckets.get(&bucket) {
            None => {
                buckets.insert(bucket, Arc::new(Slot::new()));
            },
            Some(slot) => {
                if slot.in_use.load(Ordering::Acquire) {
                    fatal_invariant_violation!("createBucket on an in-use bucket {bucket:?}");
                }
                tracing::debug!(?bucket, "createBucket: bucket already existed");
            },
        }
    }

    /// Requires the bucket to not be in-use, then removes it.
    pub fn delete_bucket(&self, bucket: Bucket) {
        let mut buckets = self.buckets.lock();
        if let Some(slot) = buckets.get(&bucket) {
            if slot.in_use.load(Ordering::Acquire) {
                fatal_invariant_violation!("deleteBucket on an in-use bucket {bucket:?}");
            }
        }
        buckets.remove(&bucket);
    }

    pub fn contains(&self, bucket: Bucket) -> bool {
        self.buckets.lock().contains_key(&bucket)
    }

    /// Returns the bucket ids for the default bucket space; empty for any
    /// other space.
    pub fn list_buckets(&self, space: BucketSpace) -> Vec<Bucket> {
        if !space.is_default() {
            return Vec::new();
        }
        self.buckets
            .lock()
            .keys()
            .filter(|b| b.space.is_default())
            .copied()
            .collect()
    }

    /// Acquires an exclusive guard. Transitions `in_use` false→true
    /// atomically; double-acquire is a fatal violation.
    pub fn acquire_exclusive(&self, bucket: Bucket) -> Option<ExclusiveGuard> {
        let slot = {
            let buckets = self.buckets.lock();
            buckets.get(&bucket)?.clone()
        };
        if slot.in_use.swap(true, Ordering::AcqRel) {
            fatal_invariant_violation!("double-acquire of exclusive guard on bucket {bucket:?}");
        }
        Some(ExclusiveGuard { slot })
    }

    /// Acquires a shared guard. Does not touch `in_use`.
    pub fn acquire_shared(&self, bucket: Bucket) -> Option<SharedGuard> {
        let slot = {
            let buckets = self.buckets.lock();
            buckets.get(&bucket)?.clone()
        };
        Some(SharedGuard { slot })
    }

    /// Sets every bucket's active flag to `value`, under the store mutex.
    pub fn set_all_active(&self, value: bool) {
        let buckets = self.buckets.lock();
        for slot in buckets.values() {
            slot.content.lock().set_active(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BucketId;

    #[test]
    fn create_then_acquire_exclusive() {
        let store = BucketStore::new();
        let bucket = Bucket::new(BucketId(1));
        store.create_bucket(bucket);
        let guard = store.acquire_exclusive(bucket).unwrap();
        assert_eq!(guard.content().entries().len(), 0);
    }

    #[test]
    fn acquire_missing_bucket_returns_none() {
        let store = BucketStore::new();
        assert!(store.acquire_exclusive(Bucket::new(BucketId(1))).is_none());
    }

    #[test]
    #[should_panic(expected = "double-acquire")]
    fn double_exclusive_acquire_is_fatal() {
        let store = BucketStore::new();
        let bucket = Bucket::new(BucketId(1));
        store.create_bucket(bucket);
        let _first = store.acquire_exclusive(bucket).unwrap();
        let _second = store.acquire_exclusive(bucket).unwrap();
    }

    #[test]
    fn guard_drop_releases_in_use() {
        let store = BucketStore::new();
        let bucket = Bucket::new(BucketId(1));
        store.create_bucket(bucket);
        {
            let _guard = store.acquire_exclusive(bucket).unwrap();
        }
        let _guard_again = store.acquire_exclusive(bucket).unwrap();
    }

    #[test]
    fn list_buckets_empty_for_non_default_space() {
        let store = BucketStore::new();
        store.create_bucket(Bucket::new(BucketId(1)));
        assert!(store.list_buckets(BucketSpace::Other).is_empty());
        assert_eq!(store.list_buckets(BucketSpace::Default).len(), 1);
    }
}
