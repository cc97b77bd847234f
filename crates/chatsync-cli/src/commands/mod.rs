//! Command handlers

pub mod config;
pub mod export;
pub mod import;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};

use chatsync_core::sync::{HttpClientFactory, SyncConfigStore};
use chatsync_core::{Config, FileSnapshotStore, SyncService, SystemClock};

/// Build the sync service over the configured data directory
pub fn open_service(config: &Config) -> Result<SyncService> {
    let service = SyncService::new(
        SyncConfigStore::with_path(config.sync_config_path()),
        Arc::new(FileSnapshotStore::from_config(config)),
        Arc::new(HttpClientFactory::new(config.request_timeout())),
        Arc::new(SystemClock),
    )
    .context("Failed to load sync configuration")?;

    Ok(match config.user_name {
        Some(ref name) => service.with_user_name(name.clone()),
        None => service,
    })
}
