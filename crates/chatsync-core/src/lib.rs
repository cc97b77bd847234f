//! chatsync Core Library
//!
//! This crate keeps a chat application's local state (sessions, messages,
//! settings) consistent with a copy held in a remote store, across devices
//! that may edit concurrently.
//!
//! # Architecture
//!
//! - **Snapshots**: the whole state travels as one JSON document; no deltas
//! - **Merge**: pure, deterministic union of local and remote snapshots
//! - **Backends**: WebDAV and Upstash REST behind one async client trait
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let service = SyncService::new(
//!     SyncConfigStore::with_path(config.sync_config_path()),
//!     Arc::new(FileSnapshotStore::from_config(&config)),
//!     Arc::new(HttpClientFactory::new(config.request_timeout())),
//!     Arc::new(SystemClock),
//! )?;
//!
//! match service.sync().await? {
//!     SyncOutcome::FirstSync { .. } => println!("pushed local state"),
//!     SyncOutcome::Merged { .. } => println!("merged"),
//! }
//! ```
//!
//! # Modules
//!
//! - `models`: Sessions, messages and the application snapshot
//! - `storage`: Local snapshot persistence
//! - `sync`: Backends, merge engine, sync service, export/import
//! - `clock`: Injectable time source
//! - `config`: Application configuration

pub mod clock;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use models::{ApplicationState, Message, Role, Session};
pub use storage::{FileSnapshotStore, SnapshotStore, StorageError};
pub use sync::{SyncError, SyncService};
