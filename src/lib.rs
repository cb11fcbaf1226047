//! In-memory bucketed document store with per-bucket exclusive-access
//! locking — a reference/dummy implementation of a storage-provider
//! interface, suitable for tests and local development against the same
//! contract a real persistence backend would serve.

pub mod bucket_content;
pub mod cluster_state;
pub mod config;
pub mod document;
pub mod entry;
pub mod error;
pub mod iterator;
pub mod provider;
pub mod selection;
pub mod store;
pub mod types;

pub use bucket_content::BucketInfo;
pub use cluster_state::{ClusterState, SimpleClusterState};
pub use config::StoreConfig;
pub use document::{Document, DocumentId, DocumentUpdate, FieldSet, FieldValue};
pub use entry::DocEntry;
pub use error::{StoreError, Result};
pub use iterator::{IncludedVersions, IterateBatch};
pub use provider::{GetResult, Provider};
pub use selection::Selection;
pub use types::{Bucket, BucketId, BucketSpace, GlobalId, IteratorId, Timestamp};
