//! Local storage errors
//!
//! Failures reading or writing the local snapshot and the sync config.
//! Each variant names the file involved; [`StorageError::recovery_suggestion`]
//! gives the CLI something actionable to print.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied for '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Snapshot or sync config on disk is not valid JSON for its schema
    #[error("Invalid format in '{path}': {details}")]
    InvalidFormat { path: PathBuf, details: String },

    #[error("File not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The temp file was written but could not replace the target
    #[error("Could not replace '{to}' with '{from}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify an I/O failure on `path`
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StorageError::NotFound { path },
            _ if mentions_full_disk(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// What the user can do about it, if anything
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space, then sync again."),
            StorageError::PermissionDenied { .. } | StorageError::CreateDirectory { .. } => Some(
                "Make sure the data directory is writable, or point data_dir somewhere else with `chatsync config set data_dir <path>`.",
            ),
            StorageError::InvalidFormat { .. } => Some(
                "The file is damaged. Move it aside to start fresh, then import a saved snapshot with `chatsync import`.",
            ),
            StorageError::AtomicWriteFailed { .. } => Some(
                "Another program may be holding the file. Close it and try again.",
            ),
            StorageError::ReadError { .. }
            | StorageError::WriteError { .. }
            | StorageError::NotFound { .. } => None,
        }
    }
}

/// ENOSPC and quota errors only show up in the message
fn mentions_full_disk(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StorageResult<T> = Result<T, StorageError>;
