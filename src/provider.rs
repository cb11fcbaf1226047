//! [`Provider`] — the storage-provider operations, tying [`BucketStore`]
//! together with the iterator table and cluster-state tracking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::bucket_content::BucketInfo;
use crate::cluster_state::{should_deactivate_all, ClusterState};
use crate::config::StoreConfig;
use crate::document::{Document, DocumentId, DocumentUpdate, FieldSet};
use crate::entry::DocEntry;
use crate::error::{Result, StoreError};
use crate::iterator::{IncludedVersions, IterateBatch, IteratorHandle, IteratorIdAllocator};
use crate::selection::Selection;
use crate::store::BucketStore;
use crate::types::{Bucket, BucketId, BucketSpace, IteratorId, Timestamp};

/// The result of a `get`.
#[derive(Clone, Debug, PartialEq)]
pub enum GetResult {
    NotFound,
    Tombstone { timestamp: Timestamp },
    Found { document: Document, timestamp: Timestamp },
}

struct Iterators {
    allocator: IteratorIdAllocator,
    handles: HashMap<IteratorId, IteratorHandle>,
}

impl Default for Iterators {
    fn default() -> Self {
        Iterators {
            allocator: IteratorIdAllocator::new(),
            handles: HashMap::new(),
        }
    }
}

/// The storage-provider facade. All operations require [`Provider::initialize`]
/// to have been called first.
pub struct Provider {
    config: StoreConfig,
    store: BucketStore,
    iterators: Mutex<Iterators>,
    node_up: Mutex<bool>,
    initialized: AtomicBool,
}

impl Provider {
    pub fn new(config: StoreConfig) -> Self {
        Provider {
            config,
            store: BucketStore::new(),
            iterators: Mutex::new(Iterators::default()),
            node_up: Mutex::new(true),
            initialized: AtomicBool::new(false),
        }
    }

    /// Flips the initialized flag. Calling any other operation before this
    /// fails with a transient "not initialized" error.
    pub fn initialize(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    fn check_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::not_initialized())
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn create_bucket(&self, bucket: Bucket) -> Result<()> {
        self.check_initialized()?;
        self.store.create_bucket(bucket);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_bucket(&self, bucket: Bucket) -> Result<()> {
        self.check_initialized()?;
        self.store.delete_bucket(bucket);
        Ok(())
    }

    pub fn list_buckets(&self, space: BucketSpace) -> Result<Vec<Bucket>> {
        self.check_initialized()?;
        Ok(self.store.list_buckets(space))
    }

    #[tracing::instrument(skip(self))]
    pub fn get_bucket_info(&self, bucket: Bucket) -> Result<BucketInfo> {
        self.check_initialized()?;
        let guard = self
            .store
            .acquire_exclusive(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;
        Ok(guard.content().get_bucket_info())
    }

    /// `put(bucket, timestamp, document)`. Idempotent re-`put`s at the same
    /// timestamp with the same document id succeed as a no-op; a different
    /// document id at an already-used timestamp is rejected with
    /// [`StoreError::TimestampExists`].
    #[tracing::instrument(skip(self, document))]
    pub fn put(&self, bucket: Bucket, timestamp: Timestamp, document: Document) -> Result<()> {
        self.check_initialized()?;
        let guard = self
            .store
            .acquire_exclusive(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;
        let mut content = guard.content();

        if let Some(existing) = content.get_entry_by_timestamp(timestamp) {
            let existing_id = existing.document_id();
            if existing_id == Some(&document.id) {
                return Ok(());
            }
            return Err(StoreError::TimestampExists);
        }

        content.insert(DocEntry::Put(timestamp, document));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn get(&self, bucket: Bucket, field_set: &FieldSet, id: &DocumentId) -> Result<GetResult> {
        self.check_initialized()?;
        let Some(guard) = self.store.acquire_shared(bucket) else {
            return Ok(GetResult::NotFound);
        };
        let content = guard.content();
        match content.get_entry_by_document_id(id) {
            None => Ok(GetResult::NotFound),
            Some(DocEntry::Remove(ts, _)) => Ok(GetResult::Tombstone { timestamp: *ts }),
            Some(DocEntry::Noop(_)) => Ok(GetResult::NotFound),
            Some(DocEntry::Put(ts, doc)) => Ok(GetResult::Found {
                document: if field_set.is_all() {
                    doc.clone()
                } else {
                    doc.project(field_set)
                },
                timestamp: *ts,
            }),
        }
    }

    /// `remove(bucket, timestamp, document_id)`. Returns whether a live put
    /// existed for `document_id` before this call.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, bucket: Bucket, timestamp: Timestamp, id: &DocumentId) -> Result<bool> {
        self.check_initialized()?;
        let guard = self
            .store
            .acquire_exclusive(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;
        let mut content = guard.content();

        let found_put = matches!(content.get_entry_by_document_id(id), Some(DocEntry::Put(..)));

        if content.has_timestamp(timestamp) {
            content.erase_entry(timestamp);
        }
        content.insert(DocEntry::Remove(timestamp, id.clone()));
        Ok(found_put)
    }

    /// `update(bucket, timestamp, update)`.
    ///
    /// Returns `Ok(None)` when the document did not exist and
    /// `create_if_nonexistent` was not set — the sentinel for "no previous
    /// timestamp, no-op". Otherwise returns the previous timestamp (the new
    /// timestamp itself, if the document was just synthesized).
    #[tracing::instrument(skip(self, update))]
    pub fn update(
        &self,
        bucket: Bucket,
        timestamp: Timestamp,
        update: DocumentUpdate,
    ) -> Result<Option<Timestamp>> {
        self.check_initialized()?;
        let existing = self.get(bucket, &FieldSet::All, &update.id)?;

        let (mut doc, previous_timestamp) = match existing {
            GetResult::Found { document, timestamp: ts } => (document, ts),
            GetResult::Tombstone { .. } | GetResult::NotFound => {
                if !update.create_if_nonexistent {
                    return Ok(None);
                }
                (Document::new(update.id.clone()), timestamp)
            },
        };

        update.apply_to(&mut doc);
        self.put(bucket, timestamp, doc)?;
        Ok(Some(previous_timestamp))
    }

    /// `revert(bucket, timestamp)`. No-op if no entry exists at `timestamp`.
    #[tracing::instrument(skip(self))]
    pub fn revert(&self, bucket: Bucket, timestamp: Timestamp) -> Result<()> {
        self.check_initialized()?;
        let guard = self
            .store
            .acquire_exclusive(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;
        guard.content().revert(timestamp);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn set_active_state(&self, bucket: Bucket, active: bool) -> Result<()> {
        self.check_initialized()?;
        let guard = self
            .store
            .acquire_exclusive(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;
        guard.content().set_active(active);
        Ok(())
    }

    /// Applies a new cluster state: if the local node is down, every bucket
    /// in the default space is deactivated.
    #[tracing::instrument(skip(self, cluster_state))]
    pub fn set_cluster_state(&self, space: BucketSpace, cluster_state: &dyn ClusterState) {
        *self.node_up.lock() = cluster_state.node_up();
        if should_deactivate_all(space, cluster_state) {
            self.store.set_all_active(false);
        }
    }

    /// `split(source, target1, target2)`: ensures all three buckets exist,
    /// partitions `source`'s entries between `target1` and `target2` by
    /// bucket-id membership, propagates `active`, then deletes `source`.
    #[tracing::instrument(skip(self))]
    pub fn split(&self, source: Bucket, target1: Bucket, target2: Bucket) -> Result<()> {
        self.check_initialized()?;
        self.store.create_bucket(source);
        self.store.create_bucket(target1);
        self.store.create_bucket(target2);

        let source_guard = self
            .store
            .acquire_exclusive(source)
            .ok_or_else(StoreError::bucket_not_found)?;
        let target1_guard = self
            .store
            .acquire_exclusive(target1)
            .expect("target1 was just created");
        let target2_guard = self
            .store
            .acquire_exclusive(target2)
            .expect("target2 was just created");

        let target1_bits = target1.id.used_bits();
        let entries: Vec<DocEntry> = {
            let source_content = source_guard.content();
            source_content
                .entries()
                .iter()
                .map(|e| e.entry.clone())
                .collect()
        };
        let source_active = source_guard.content().is_active();

        let natural_bucket_id_of = |entry: &DocEntry| -> BucketId {
            let gid_bytes = entry
                .document_id()
                .map(crate::types::GlobalId::from_document_id)
                .unwrap_or(crate::types::GlobalId([0; 12]));
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&gid_bytes.0[0..8]);
            BucketId(u64::from_le_bytes(raw))
        };

        {
            let mut t1 = target1_guard.content();
            let mut t2 = target2_guard.content();
            for entry in entries {
                let natural = natural_bucket_id_of(&entry).truncated_to(target1_bits);
                if natural == target1.id.truncated_to(target1_bits) {
                    t1.insert(entry);
                } else {
                    t2.insert(entry);
                }
            }
            t1.set_active(source_active);
            t2.set_active(source_active);
        }

        drop(source_guard);
        self.store.delete_bucket(source);
        Ok(())
    }

    /// `join(source1, source2, target)`: ensures `target` exists, moves every
    /// entry from each existing source into it via `insert`, ORs the active
    /// flags, deletes each source.
    #[tracing::instrument(skip(self))]
    pub fn join(&self, source1: Bucket, source2: Bucket, target: Bucket) -> Result<()> {
        self.check_initialized()?;
        self.store.create_bucket(target);
        let target_guard = self
            .store
            .acquire_exclusive(target)
            .expect("target was just created");

        let mut active = false;
        for source in [source1, source2] {
            let Some(source_guard) = self.store.acquire_exclusive(source) else {
                continue;
            };
            let entries: Vec<DocEntry> = {
                let source_content = source_guard.content();
                active |= source_content.is_active();
                source_content.entries().iter().map(|e| e.entry.clone()).collect()
            };
            {
                let mut target_content = target_guard.content();
                for entry in entries {
                    target_content.insert(entry);
                }
            }
            drop(source_guard);
            self.store.delete_bucket(source);
        }
        target_guard.content().set_active(active);
        Ok(())
    }

    /// Parses `selection`, plans the timestamp set to visit, and allocates a
    /// new iterator.
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(self, explicit_timestamps))]
    pub fn create_iterator(
        &self,
        bucket: Bucket,
        field_set: FieldSet,
        selection: &str,
        from_timestamp: Timestamp,
        to_timestamp: Timestamp,
        included_versions: IncludedVersions,
        explicit_timestamps: Option<Vec<Timestamp>>,
    ) -> Result<IteratorId> {
        self.check_initialized()?;
        let parsed_selection = if selection.is_empty() {
            None
        } else {
            Some(Selection::parse_leaf(selection)?)
        };

        let guard = self
            .store
            .acquire_shared(bucket)
            .ok_or_else(StoreError::bucket_not_found)?;

        let left_to_iterate = match explicit_timestamps {
            Some(timestamps) => timestamps,
            None => {
                let content = guard.content();
                let mut planned = Vec::new();
                for bucket_entry in content.entries().iter().rev() {
                    let entry = &bucket_entry.entry;
                    let ts = entry.timestamp();
                    if ts < from_timestamp || ts > to_timestamp {
                        continue;
                    }

                    if entry.is_remove() {
                        if matches!(included_versions, IncludedVersions::NewestDocumentOnly) {
                            continue;
                        }
                        if let Some(sel) = &parsed_selection {
                            if !sel.matches_id(entry.document_id().expect("remove has an id")) {
                                continue;
                            }
                        }
                        planned.push(ts);
                    } else {
                        let is_newest = content
                            .get_entry_by_document_id(entry.document_id().expect("put has an id"))
                            .map(|newest| newest.timestamp())
                            == Some(ts);
                        if !matches!(included_versions, IncludedVersions::AllVersions) && !is_newest {
                            continue;
                        }
                        if let Some(sel) = &parsed_selection {
                            if !sel.matches(entry.document().expect("put has a document")) {
                                continue;
                            }
                        }
                        planned.push(ts);
                    }
                }
                planned
            },
        };

        let mut iterators = self.iterators.lock();
        let id = iterators.allocator.allocate();
        iterators
            .handles
            .insert(id, IteratorHandle::new(bucket, field_set, left_to_iterate));
        Ok(id)
    }

    /// Consumes up to `max_bytes` worth of entries from the iterator,
    /// guaranteeing at least one entry per call even if it alone exceeds the
    /// budget.
    #[tracing::instrument(skip(self))]
    pub fn iterate(&self, iterator_id: IteratorId, max_bytes: u64) -> Result<IterateBatch> {
        self.check_initialized()?;
        let bucket = {
            let iterators = self.iterators.lock();
            iterators
                .handles
                .get(&iterator_id)
                .ok_or_else(StoreError::iterate_without_create)?
                .bucket
        };

        let guard = self
            .store
            .acquire_shared(bucket)
            .ok_or_else(StoreError::iterator_bucket_missing)?;
        let content = guard.content();

        let mut iterators = self.iterators.lock();
        let handle = iterators
            .handles
            .get_mut(&iterator_id)
            .ok_or_else(StoreError::iterate_without_create)?;

        let mut entries = Vec::new();
        let mut current_size: u64 = 0;
        while let Some(next_ts) = handle.pop_next_timestamp() {
            let Some(entry) = content.get_entry_by_timestamp(next_ts) else {
                continue;
            };
            let size = entry.size() as u64;
            if current_size != 0 && current_size + size > max_bytes {
                // Put it back; this entry belongs to the next batch.
                handle_push_back(handle, next_ts);
                break;
            }
            current_size += size;
            let emitted = if !entry.is_remove() && !handle.field_set.is_all() {
                match entry {
                    DocEntry::Put(ts, doc) => DocEntry::Put(*ts, doc.project(&handle.field_set)),
                    other => other.clone(),
                }
            } else {
                entry.clone()
            };
            entries.push(emitted);
        }

        let completed = handle.is_exhausted();
        if completed {
            iterators.handles.remove(&iterator_id);
        }
        Ok(IterateBatch { entries, completed })
    }

    /// Idempotent; an unknown id is not an error.
    pub fn destroy_iterator(&self, iterator_id: IteratorId) -> Result<()> {
        self.check_initialized()?;
        self.iterators.lock().handles.remove(&iterator_id);
        Ok(())
    }

    /// Returns `DOESN'T EXIST` for a missing bucket, or a newline-separated
    /// dump of entry string forms.
    pub fn dump_bucket(&self, bucket: Bucket) -> String {
        match self.store.acquire_shared(bucket) {
            None => "DOESN'T EXIST".to_string(),
            Some(guard) => guard.content().dump(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// `IteratorHandle::pop_next_timestamp` consumes from the back; putting one
/// back for the next batch means re-pushing it in the same place. Exposed as
/// a free function since `left_to_iterate` is private to the handle.
fn handle_push_back(handle: &mut IteratorHandle, timestamp: Timestamp) {
    handle.push_back(timestamp);
}

impl Default for Provider {
    fn default() -> Self {
        Provider::new(StoreConfig::default())
    }
}
