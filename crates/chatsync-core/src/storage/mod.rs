//! Storage layer
//!
//! Holds the local copy of the application state as a single JSON
//! snapshot. The sync service is the only writer.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub(crate) use persistence::atomic_write;
