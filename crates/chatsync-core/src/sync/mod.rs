//! Remote synchronization
//!
//! Keeps the local snapshot consistent with a copy held in a user-chosen
//! remote store.
//!
//! ## Protocol
//!
//! A sync is one full-snapshot round trip:
//! 1. Fetch the remote snapshot stored under the configured identity
//! 2. If there is none, push local state as-is
//! 3. Otherwise merge local and remote deterministically
//! 4. Push the merged snapshot, then commit it locally
//! 5. Record the sync time
//!
//! ## Usage
//!
//! ```ignore
//! let service = SyncService::new(config_store, snapshots, factory, clock)?;
//! service.update_config(|c| c.webdav.endpoint = url.into())?;
//! service.sync().await?;
//! ```

mod client;
mod error;
mod export;
mod lock;
pub mod memory;
pub mod merge;
mod service;
mod state;
pub mod upstash;
pub mod webdav;

pub use client::{ClientFactory, HttpClientFactory, SyncClient};
pub use error::{SyncError, SyncResult};
pub use export::{
    build_exports, sanitize_topic, transcript, ExportFeedback, ExportFile, ExportedAnswer,
    ExportedQa, SessionExport,
};
pub use lock::SyncLocks;
pub use memory::MemoryClient;
pub use merge::{merge, merge_default, ConfigPolicy, DeletionPolicy, MergeOptions};
pub use service::{ExportOutcome, ImportReport, SyncOutcome, SyncService, SyncStatus};
pub use state::{
    migrate, BackendKind, SyncConfig, SyncConfigStore, UpstashConfig, WebDavConfig,
    DEFAULT_STORAGE_KEY, SYNC_CONFIG_VERSION,
};
pub use upstash::UpstashClient;
pub use webdav::WebDavClient;
