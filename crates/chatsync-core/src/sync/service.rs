//! Sync orchestration
//!
//! `SyncService` owns the sync configuration and drives the pull, merge,
//! push cycle against the configured remote store. It also exports
//! transcripts and imports snapshot files through the same merge engine.
//!
//! ## Ordering
//!
//! A sync writes the merged snapshot to the remote first, then commits it
//! locally, then records the sync time. Any failure before the remote write
//! leaves local state untouched.
//!
//! ## Usage
//!
//! ```ignore
//! let service = SyncService::new(
//!     SyncConfigStore::with_path(config.sync_config_path()),
//!     Arc::new(FileSnapshotStore::from_config(&config)),
//!     Arc::new(HttpClientFactory::new(config.request_timeout())),
//!     Arc::new(SystemClock),
//! )?;
//! let outcome = service.sync().await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::client::ClientFactory;
use super::error::{SyncError, SyncResult};
use super::export::build_exports;
use super::lock::SyncLocks;
use super::merge::{merge, ConfigPolicy, DeletionPolicy, MergeOptions};
use super::state::{BackendKind, SyncConfig, SyncConfigStore};
use crate::clock::Clock;
use crate::models::ApplicationState;
use crate::storage::{atomic_write, SnapshotStore, StorageError};

/// Result of a successful sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote was empty; local state was pushed as-is
    FirstSync { sessions: usize },
    /// Local and remote were merged and both sides now hold the result
    Merged {
        sessions: usize,
        messages: usize,
        /// Sessions that arrived from the remote
        new_sessions: usize,
    },
}

/// Result of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No session had an answered question
    NoData,
    /// Paths of the transcripts written
    Written(Vec<PathBuf>),
}

/// Result of an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Local state was replaced; in-memory copies must be reloaded
    pub state_changed: bool,
    pub sessions: usize,
    pub new_sessions: usize,
}

/// Summary of the sync configuration
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub provider: BackendKind,
    pub identity: String,
    pub configured: bool,
    pub missing: Vec<&'static str>,
    pub proxy: Option<String>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_provider: Option<String>,
}

/// Orchestrates sync, export and import
pub struct SyncService {
    config_store: SyncConfigStore,
    config: RwLock<SyncConfig>,
    snapshots: Arc<dyn SnapshotStore>,
    factory: Arc<dyn ClientFactory>,
    clock: Arc<dyn Clock>,
    locks: SyncLocks,
    config_policy: ConfigPolicy,
    deletion_policy: DeletionPolicy,
    user_name: String,
}

impl SyncService {
    /// Create a service, loading (and migrating) the persisted sync config
    pub fn new(
        config_store: SyncConfigStore,
        snapshots: Arc<dyn SnapshotStore>,
        factory: Arc<dyn ClientFactory>,
        clock: Arc<dyn Clock>,
    ) -> SyncResult<Self> {
        let config = config_store.load()?;
        debug!(
            "Loaded sync config (provider: {}, identity: {})",
            config.provider,
            config.identity()
        );

        Ok(Self {
            config_store,
            config: RwLock::new(config),
            snapshots,
            factory,
            clock,
            locks: SyncLocks::new(),
            config_policy: ConfigPolicy::default(),
            deletion_policy: DeletionPolicy::default(),
            user_name: String::new(),
        })
    }

    /// Share a lock registry with other services
    pub fn with_locks(mut self, locks: SyncLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_config_policy(mut self, policy: ConfigPolicy) -> Self {
        self.config_policy = policy;
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    /// Name written into exported transcripts
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    fn read_config(&self) -> RwLockReadGuard<'_, SyncConfig> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, SyncConfig> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current sync configuration
    pub fn config(&self) -> SyncConfig {
        self.read_config().clone()
    }

    /// Edit the sync configuration and persist it
    ///
    /// The in-memory config only changes if the save succeeds.
    pub fn update_config<F>(&self, edit: F) -> SyncResult<SyncConfig>
    where
        F: FnOnce(&mut SyncConfig),
    {
        let mut config = self.write_config();
        let mut updated = config.clone();
        edit(&mut updated);
        self.config_store.save(&updated)?;
        *config = updated.clone();
        Ok(updated)
    }

    /// Merge options for the current config
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            last_sync_time: self.read_config().last_sync(),
            config_policy: self.config_policy,
            deletion_policy: self.deletion_policy,
        }
    }

    pub fn status(&self) -> SyncStatus {
        let config = self.read_config();
        SyncStatus {
            provider: config.provider,
            identity: config.identity().to_string(),
            configured: config.is_complete(),
            missing: config.missing_fields(),
            proxy: config.proxy().map(str::to_string),
            last_sync_time: config
                .last_sync()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            last_provider: (!config.last_provider.is_empty())
                .then(|| config.last_provider.clone()),
        }
    }

    /// Check that the configured remote store is reachable
    ///
    /// An incomplete config reports `false` without touching the network.
    pub async fn check(&self) -> SyncResult<bool> {
        let config = self.config();
        if !config.is_complete() {
            debug!("Sync config incomplete, skipping check");
            return Ok(false);
        }

        let client = self.factory.create(&config)?;
        let reachable = client.check().await?;
        info!(
            "Remote store {} is {}",
            config.provider,
            if reachable { "reachable" } else { "unreachable" }
        );
        Ok(reachable)
    }

    /// Pull, merge and push
    pub async fn sync(&self) -> SyncResult<SyncOutcome> {
        let config = self.config();
        config.validate()?;

        let _guard = self.locks.try_acquire(&config.lock_key())?;
        let key = config.identity().to_string();
        let options = self.merge_options();

        let local = self.snapshots.load_snapshot()?;
        let client = self.factory.create(&config)?;

        info!("Syncing with {} as {}", config.provider, key);
        let raw = client.get(&key).await?;

        let outcome = if raw.trim().is_empty() {
            info!("Remote is empty, pushing local state");
            client.set(&key, &local.to_json()?).await?;
            SyncOutcome::FirstSync {
                sessions: local.sessions.len(),
            }
        } else {
            let remote = ApplicationState::from_json(&raw)
                .map_err(|e| SyncError::CorruptRemoteState(e.to_string()))?;
            debug!(
                "Remote has {} sessions, local has {}",
                remote.sessions.len(),
                local.sessions.len()
            );

            let merged = merge(&local, &remote, &options);
            client.set(&key, &merged.to_json()?).await?;
            self.snapshots.save_snapshot(&merged)?;

            SyncOutcome::Merged {
                sessions: merged.sessions.len(),
                messages: merged.message_count(),
                new_sessions: count_new_sessions(&local, &merged),
            }
        };

        self.record_sync(config.provider);
        info!("Sync complete: {:?}", outcome);
        Ok(outcome)
    }

    /// Both sides already hold the merged state by now; a stale sync time
    /// only changes session ordering on the next merge.
    fn record_sync(&self, provider: BackendKind) {
        let now = self.clock.now();
        if let Err(e) = self.update_config(|config| config.mark_synced(provider, now)) {
            warn!("Synced, but failed to record sync time: {}", e);
        }
    }

    /// Write one transcript per session with at least one answered question
    pub fn export(&self, dir: &Path) -> SyncResult<ExportOutcome> {
        let state = self.snapshots.load_snapshot()?;
        let files = build_exports(&state, &self.user_name, self.clock.now());

        if files.is_empty() {
            info!("Nothing to export");
            return Ok(ExportOutcome::NoData);
        }

        std::fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut written = Vec::with_capacity(files.len());
        for file in &files {
            let path = dir.join(&file.file_name);
            atomic_write(&path, file.to_json()?.as_bytes())?;
            debug!("Exported session {} to {:?}", file.session_id, path);
            written.push(path);
        }

        info!("Exported {} transcript(s) to {:?}", written.len(), dir);
        Ok(ExportOutcome::Written(written))
    }

    /// Merge a snapshot file into local state
    ///
    /// A payload that doesn't parse leaves local state untouched.
    pub fn import(&self, raw: &str) -> SyncResult<ImportReport> {
        let imported = ApplicationState::from_json(raw)
            .map_err(|e| SyncError::CorruptImportFile(e.to_string()))?;

        let config = self.config();
        let _guard = self.locks.try_acquire(&config.lock_key())?;

        let local = self.snapshots.load_snapshot()?;
        let merged = merge(&local, &imported, &self.merge_options());
        self.snapshots.save_snapshot(&merged)?;

        let report = ImportReport {
            state_changed: true,
            sessions: merged.sessions.len(),
            new_sessions: count_new_sessions(&local, &merged),
        };
        info!(
            "Imported {} session(s), {} new",
            imported.sessions.len(),
            report.new_sessions
        );
        Ok(report)
    }
}

fn count_new_sessions(before: &ApplicationState, after: &ApplicationState) -> usize {
    after
        .sessions
        .iter()
        .filter(|s| before.session(&s.id).is_none())
        .count()
}
