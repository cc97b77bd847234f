//! In-process remote store
//!
//! Behaves like a remote store without any network: useful for dry runs
//! and for exercising the sync service in tests. Clones share storage, so
//! a test can keep a handle and inspect what was pushed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::client::{ClientFactory, SyncClient};
use super::error::{SyncError, SyncResult};
use super::state::SyncConfig;

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, String>,
    fail_gets: bool,
    fail_sets: bool,
    unreachable: bool,
    gets: usize,
    sets: usize,
}

/// Shared in-memory store implementing [`SyncClient`]
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an object
    pub fn with_object(self, key: &str, value: &str) -> Self {
        self.lock()
            .objects
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Current value stored under `key`
    pub fn object(&self, key: &str) -> Option<String> {
        self.lock().objects.get(key).cloned()
    }

    /// Make every `get` fail with a transport error
    pub fn fail_gets(&self, fail: bool) {
        self.lock().fail_gets = fail;
    }

    /// Make every `set` fail with a transport error
    pub fn fail_sets(&self, fail: bool) {
        self.lock().fail_sets = fail;
    }

    /// Make `check` report the store as unreachable
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Number of `get` calls served
    pub fn get_count(&self) -> usize {
        self.lock().gets
    }

    /// Number of `set` calls served
    pub fn set_count(&self) -> usize {
        self.lock().sets
    }

    fn injected_failure(operation: &str) -> SyncError {
        SyncError::Transport {
            url: "memory://".to_string(),
            message: format!("injected {} failure", operation),
        }
    }
}

#[async_trait]
impl SyncClient for MemoryClient {
    async fn get(&self, key: &str) -> SyncResult<String> {
        let mut inner = self.lock();
        inner.gets += 1;
        if inner.fail_gets {
            return Err(Self::injected_failure("get"));
        }
        Ok(inner.objects.get(key).cloned().unwrap_or_default())
    }

    async fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut inner = self.lock();
        inner.sets += 1;
        if inner.fail_sets {
            return Err(Self::injected_failure("set"));
        }
        inner.objects.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn check(&self) -> SyncResult<bool> {
        Ok(!self.lock().unreachable)
    }
}

/// Every configuration maps to this same shared store
impl ClientFactory for MemoryClient {
    fn create(&self, _config: &SyncConfig) -> SyncResult<Box<dyn SyncClient>> {
        Ok(Box::new(self.clone()))
    }
}
