//! Durable key/value storage for the edit session.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Synchronous, best-effort mapping from string keys to serialized values.
pub trait KeyValueStore: Send + Sync {
    /// Writes `value` under `key`, replacing what was there.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Reads the value under `key`.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Deletes `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Deletes every key.
    fn clear(&self) -> Result<()>;
}
