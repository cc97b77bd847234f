//! Per-identity sync locks
//!
//! At most one sync or import runs per `provider:identity` key. Overlapping
//! calls are rejected rather than queued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::error::{SyncError, SyncResult};

/// Shared registry of per-key locks
///
/// Clones share the same registry, so services built from one registry
/// exclude each other.
#[derive(Debug, Clone, Default)]
pub struct SyncLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl SyncLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, failing with `SyncInProgress` if held
    ///
    /// The lock is released when the guard drops.
    pub fn try_acquire(&self, key: &str) -> SyncResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        lock.try_lock_owned()
            .map_err(|_| SyncError::SyncInProgress {
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_rejected() {
        let locks = SyncLocks::new();
        let guard = locks.try_acquire("webdav:alice").unwrap();

        let err = locks.try_acquire("webdav:alice").unwrap_err();
        assert!(matches!(err, SyncError::SyncInProgress { ref key } if key == "webdav:alice"));

        drop(guard);
        assert!(locks.try_acquire("webdav:alice").is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let locks = SyncLocks::new();
        let _a = locks.try_acquire("webdav:alice").unwrap();
        assert!(locks.try_acquire("upstash:alice").is_ok());
    }

    #[test]
    fn test_clones_share_registry() {
        let locks = SyncLocks::new();
        let other = locks.clone();
        let _guard = locks.try_acquire("k").unwrap();
        assert!(other.try_acquire("k").is_err());
    }
}
