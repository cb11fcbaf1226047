//! Error taxonomy for the bucket store, mirroring the stable error kinds a
//! storage-provider interface exposes to its callers.

use std::borrow::Cow;

/// Non-fatal failures the store surfaces to callers with a stable kind and a
/// human-readable message. Invariant violations are not represented here —
/// see [`fatal_invariant_violation`], which aborts the process instead.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Caller may retry after reconfiguration (e.g. bucket not found, store
    /// not yet initialized).
    #[error("{0}")]
    Transient(Cow<'static, str>),

    /// Caller must not retry unmodified (e.g. unparseable selection).
    #[error("{0}")]
    Permanent(Cow<'static, str>),

    /// `put` received a new document at a timestamp already used by a
    /// different document.
    #[error("timestamp already existed")]
    TimestampExists,
}

impl StoreError {
    pub fn transient(msg: impl Into<Cow<'static, str>>) -> Self {
        StoreError::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<Cow<'static, str>>) -> Self {
        StoreError::Permanent(msg.into())
    }

    pub fn bucket_not_found() -> Self {
        StoreError::transient("Bucket not found")
    }

    pub fn iterator_bucket_missing() -> Self {
        StoreError::transient("iterator references missing bucket")
    }

    pub fn not_initialized() -> Self {
        StoreError::transient("not initialized")
    }

    pub fn unparseable_selection() -> Self {
        StoreError::permanent("unparseable document selection")
    }

    pub fn iterate_without_create() -> Self {
        StoreError::permanent("iterate without prior createIterator")
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Aborts the process after logging, for corruption that must never be
/// papered over by a higher layer (double-acquire of an exclusive guard,
/// timestamp collision with a non-equal entry, deleting an in-use bucket,
/// GID-map inconsistency).
#[macro_export]
macro_rules! fatal_invariant_violation {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        tracing::error!(%msg, "fatal invariant violation");
        panic!("fatal invariant violation: {msg}");
    }};
}
