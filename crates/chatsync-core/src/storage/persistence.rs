//! Snapshot persistence
//!
//! Reads and writes the full application state as one JSON document.
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.
//!
//! Storage location: `~/.local/share/chatsync/snapshot.json` (configurable via `Config`)

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::error::{StorageError, StorageResult};
use crate::config::Config;
use crate::models::ApplicationState;

/// Local storage for the application state snapshot
///
/// Both operations are synchronous and durable once they return.
pub trait SnapshotStore: Send + Sync {
    /// Load the full local snapshot
    fn load_snapshot(&self) -> StorageResult<ApplicationState>;

    /// Replace the full local snapshot
    fn save_snapshot(&self, state: &ApplicationState) -> StorageResult<()>;
}

/// Snapshot store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store writing to the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the configured snapshot location
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.snapshot_path())
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a snapshot exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl SnapshotStore for FileSnapshotStore {
    /// A missing file loads as an empty snapshot.
    fn load_snapshot(&self) -> StorageResult<ApplicationState> {
        if !self.path.exists() {
            debug!("No snapshot at {:?}, starting empty", self.path);
            return Ok(ApplicationState::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| StorageError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;

        ApplicationState::from_json(&content).map_err(|e| StorageError::InvalidFormat {
            path: self.path.clone(),
            details: e.to_string(),
        })
    }

    fn save_snapshot(&self, state: &ApplicationState) -> StorageResult<()> {
        let json =
            serde_json::to_vec_pretty(state).map_err(|e| StorageError::InvalidFormat {
                path: self.path.clone(),
                details: e.to_string(),
            })?;
        atomic_write(&self.path, &json)?;
        debug!(
            "Saved snapshot ({} sessions) to {:?}",
            state.sessions.len(),
            self.path
        );
        Ok(())
    }
}

/// In-memory snapshot store
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    state: Arc<Mutex<ApplicationState>>,
}

impl MemorySnapshotStore {
    pub fn new(state: ApplicationState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> ApplicationState {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_snapshot(&self) -> StorageResult<ApplicationState> {
        Ok(self.snapshot())
    }

    fn save_snapshot(&self, state: &ApplicationState) -> StorageResult<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Message, Role, Session};
    use tempfile::TempDir;

    fn sample_state() -> ApplicationState {
        let mut state = ApplicationState::new();
        let mut session = Session::with_id("s1", "Example");
        session.push(Message::new(Role::User, "hello"));
        state.sessions.push(session);
        state
            .config
            .insert("theme".to_string(), serde_json::json!("dark"));
        state
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("snapshot.json"));

        assert!(!store.exists());
        assert!(store.load_snapshot().unwrap().sessions.is_empty());

        let state = sample_state();
        store.save_snapshot(&state).unwrap();
        assert!(store.exists());

        let loaded = store.load_snapshot().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileSnapshotStore::new(&path).load_snapshot().unwrap_err();
        assert!(matches!(err, StorageError::InvalidFormat { .. }));
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("snapshot.json"));

        store.save_snapshot(&sample_state()).unwrap();
        store.save_snapshot(&ApplicationState::new()).unwrap();

        let loaded = store.load_snapshot().unwrap();
        assert!(loaded.sessions.is_empty());
        assert!(!temp_dir.path().join("snapshot.tmp").exists());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir
            .path()
            .join("a")
            .join("b")
            .join("c")
            .join("file.txt");

        atomic_write(&nested_path, b"test data").unwrap();

        let content = fs::read_to_string(&nested_path).unwrap();
        assert_eq!(content, "test data");
    }

    #[test]
    fn test_memory_store_shares_state() {
        let store = MemorySnapshotStore::default();
        let handle = store.clone();

        store.save_snapshot(&sample_state()).unwrap();
        assert_eq!(handle.snapshot().sessions.len(), 1);
    }
}
