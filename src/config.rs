//! Small, explicit store configuration. There is no file-backed config
//! loader here — this module has no filesystem surface to configure.

/// Configuration for a [`crate::provider::Provider`].
#[derive(Clone, Copy, Debug)]
pub struct StoreConfig {
    /// Byte budget `iterate` uses when a caller does not specify one.
    pub default_iterate_max_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            default_iterate_max_bytes: 1 << 20,
        }
    }
}
