//! Storage engines that can back the key-value server
mod sled;

pub use self::sled::SledKvsEngine;

use crate::Result;

/// Interface of an embedded key-value storage engine.
///
/// Keys and values are opaque byte strings. Implementations must be safe to share between the
/// server's worker threads, no locking is done by the callers.
pub trait KvsEngine: Send + Sync + 'static {
    /// Set the value of a key, overwriting the previous value if there's one.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Get the value of a key. Returns `None` if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Remove a key.
    ///
    /// # Error
    ///
    /// If the key doesn't exist returns a `KeyNotFound` error.
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Replace the value of a key that already exists, the key is never created.
    ///
    /// # Error
    ///
    /// If the key doesn't exist returns a `KeyNotFound` error.
    fn replace(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Persist buffered writes to disk.
    fn flush(&self) -> Result<()>;
}
