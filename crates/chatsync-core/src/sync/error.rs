//! Sync error taxonomy

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by backend clients and the sync service
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network unreachable, timeout, or an unexpected response
    #[error("Transport error talking to {url}: {message}")]
    Transport { url: String, message: String },

    /// Remote store rejected the configured credentials
    #[error("Remote store rejected credentials (HTTP {status})")]
    Auth { status: u16 },

    /// Remote payload is not a valid snapshot
    #[error("Remote state is corrupt: {0}")]
    CorruptRemoteState(String),

    /// Import payload is not a valid snapshot
    #[error("Import file is not a valid snapshot: {0}")]
    CorruptImportFile(String),

    /// Required provider fields are missing
    #[error("Sync configuration for {provider} is incomplete: missing {}", missing.join(", "))]
    ConfigIncomplete {
        provider: String,
        missing: Vec<&'static str>,
    },

    /// Another sync for the same identity is already running
    #[error("A sync for {key} is already in progress")]
    SyncInProgress { key: String },

    /// Local storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Failed to serialize a snapshot or config
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Build a transport error from a reqwest failure
    pub fn transport(url: &str, error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            error.to_string()
        };
        SyncError::Transport {
            url: url.to_string(),
            message,
        }
    }

    /// Whether retrying the same operation later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport { .. }
                | SyncError::SyncInProgress { .. }
                | SyncError::CorruptRemoteState(_)
        )
    }

    /// What the user can do about it, if anything
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::Storage(e) => e.recovery_suggestion(),
            SyncError::Auth { .. } => {
                Some("Check the credentials with `chatsync config show` and `chatsync check`.")
            }
            SyncError::ConfigIncomplete { .. } => {
                Some("Fill in the missing fields with `chatsync config set <key> <value>`.")
            }
            SyncError::CorruptImportFile(_) => {
                Some("Import expects a snapshot written by a chat client or by chatsync itself.")
            }
            // A push from another device can be read half-written
            SyncError::CorruptRemoteState(_) => {
                Some("Another device may be pushing right now. Wait a moment and sync again.")
            }
            SyncError::Transport { .. } | SyncError::SyncInProgress { .. } => {
                Some("This is usually temporary. Try again shortly.")
            }
            SyncError::Serialization(_) => None,
        }
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
