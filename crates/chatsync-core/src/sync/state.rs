//! Persisted sync configuration
//!
//! Stores the selected remote store, its credentials, proxy settings and
//! last-sync metadata as a versioned JSON envelope:
//!
//! ```text
//! { "version": 3, "state": { "provider": "webdav", ... } }
//! ```
//!
//! Every load goes through [`migrate`], whatever version is on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::error::{SyncError, SyncResult};
use crate::storage::{atomic_write, StorageError};

/// Current on-disk schema version
pub const SYNC_CONFIG_VERSION: u32 = 3;

/// Default namespace for the hosted key-value store
pub const DEFAULT_STORAGE_KEY: &str = "chatsync";

/// Proxy path shipped as the default before proxying moved out of the app
const LEGACY_PROXY_URL: &str = "/api/cors/";

/// Supported remote store families
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Generic WebDAV-compatible HTTP store
    #[default]
    WebDav,
    /// Hosted key-value store (Upstash REST API)
    Upstash,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::WebDav => "webdav",
            BackendKind::Upstash => "upstash",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webdav" => Ok(BackendKind::WebDav),
            "upstash" => Ok(BackendKind::Upstash),
            other => Err(format!(
                "Unknown provider '{}'. Valid providers: webdav, upstash",
                other
            )),
        }
    }
}

/// WebDAV connection parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebDavConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Fields written by newer versions, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Hosted key-value store connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstashConfig {
    #[serde(default)]
    pub endpoint: String,
    /// Namespace for stored keys
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for UpstashConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: DEFAULT_STORAGE_KEY.to_string(),
            api_key: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Sync configuration owned by the sync service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub provider: BackendKind,
    /// Route requests through `proxy_url`
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
    #[serde(default)]
    pub proxy_url: String,
    #[serde(default)]
    pub webdav: WebDavConfig,
    #[serde(default)]
    pub upstash: UpstashConfig,
    /// Epoch ms of the last successful sync, 0 if never
    #[serde(default)]
    pub last_sync_time: i64,
    /// Provider used by the last successful sync
    #[serde(default)]
    pub last_provider: String,
    /// Fields written by newer versions, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            provider: BackendKind::default(),
            use_proxy: default_use_proxy(),
            proxy_url: String::new(),
            webdav: WebDavConfig::default(),
            upstash: UpstashConfig::default(),
            last_sync_time: 0,
            last_provider: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

fn default_use_proxy() -> bool {
    true
}

impl SyncConfig {
    /// Identity of the active provider; also the remote object key
    pub fn identity(&self) -> &str {
        match self.provider {
            BackendKind::WebDav => &self.webdav.username,
            BackendKind::Upstash => &self.upstash.username,
        }
    }

    /// Required fields of the active provider that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &str); 3] = match self.provider {
            BackendKind::WebDav => [
                ("endpoint", self.webdav.endpoint.as_str()),
                ("username", self.webdav.username.as_str()),
                ("password", self.webdav.password.as_str()),
            ],
            BackendKind::Upstash => [
                ("endpoint", self.upstash.endpoint.as_str()),
                ("username", self.upstash.username.as_str()),
                ("apiKey", self.upstash.api_key.as_str()),
            ],
        };
        fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether every required field of the active provider is set
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Fail with `ConfigIncomplete` unless the active provider is fully configured
    pub fn validate(&self) -> SyncResult<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::ConfigIncomplete {
                provider: self.provider.to_string(),
                missing,
            })
        }
    }

    /// Proxy base URL, if proxying is enabled and configured
    pub fn proxy(&self) -> Option<&str> {
        let url = self.proxy_url.trim();
        (self.use_proxy && !url.is_empty()).then_some(url)
    }

    /// Key used to serialize syncs against the same remote identity
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.provider, self.identity())
    }

    /// Record a successful sync against `provider`
    pub fn mark_synced(&mut self, provider: BackendKind, at: DateTime<Utc>) {
        self.last_sync_time = at.timestamp_millis();
        self.last_provider = provider.to_string();
    }

    /// Last successful sync time, if any
    pub fn last_sync(&self) -> Option<i64> {
        (self.last_sync_time > 0).then_some(self.last_sync_time)
    }
}

/// Upgrade a persisted config from `from_version` to the current schema
///
/// Each step is gated on `from_version`, so already-applied steps are
/// skipped. Unknown fields survive.
pub fn migrate(persisted: Value, from_version: u32) -> SyncResult<SyncConfig> {
    let mut state = match persisted {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(SyncError::Serialization(serde::de::Error::custom(format!(
                "sync config must be an object, found {}",
                other
            ))))
        }
    };

    if from_version < 2 {
        // Hosted KV keys became namespaced by username
        let upstash = state
            .entry("upstash")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(upstash) = upstash {
            upstash.insert(
                "username".to_string(),
                Value::String(DEFAULT_STORAGE_KEY.to_string()),
            );
        }
    }

    if from_version < 3 && state.get("proxyUrl").and_then(Value::as_str) == Some(LEGACY_PROXY_URL)
    {
        state.insert("proxyUrl".to_string(), Value::String(String::new()));
    }

    Ok(serde_json::from_value(Value::Object(state))?)
}

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSyncConfig {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    state: Value,
}

/// Loads and saves the sync configuration
///
/// Without a path the store is in-memory only and `save` is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SyncConfigStore {
    path: Option<PathBuf>,
}

impl SyncConfigStore {
    /// Create an in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to disk
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Load and migrate the persisted config, or defaults if none exists
    pub fn load(&self) -> SyncResult<SyncConfig> {
        let Some(ref path) = self.path else {
            return migrate(serde_json::to_value(SyncConfig::default())?, SYNC_CONFIG_VERSION);
        };

        if !path.exists() {
            debug!("No sync config at {:?}, using defaults", path);
            return migrate(serde_json::to_value(SyncConfig::default())?, SYNC_CONFIG_VERSION);
        }

        let content = fs::read_to_string(path).map_err(|e| StorageError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let persisted: PersistedSyncConfig =
            serde_json::from_str(&content).map_err(|e| StorageError::InvalidFormat {
                path: path.clone(),
                details: e.to_string(),
            })?;

        if persisted.version < SYNC_CONFIG_VERSION {
            info!(
                "Migrating sync config from version {} to {}",
                persisted.version, SYNC_CONFIG_VERSION
            );
        }
        migrate(persisted.state, persisted.version)
    }

    /// Save the config at the current schema version
    pub fn save(&self, config: &SyncConfig) -> SyncResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let envelope = PersistedSyncConfig {
            version: SYNC_CONFIG_VERSION,
            state: serde_json::to_value(config)?,
        };
        let json = serde_json::to_vec_pretty(&envelope)?;
        atomic_write(path, &json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.provider, BackendKind::WebDav);
        assert!(config.use_proxy);
        assert_eq!(config.upstash.username, DEFAULT_STORAGE_KEY);
        assert!(config.last_sync().is_none());
        assert!(config.proxy().is_none());
    }

    #[test]
    fn test_missing_fields() {
        let mut config = SyncConfig::default();
        assert_eq!(
            config.missing_fields(),
            vec!["endpoint", "username", "password"]
        );

        config.webdav.endpoint = "https://dav.example.com".to_string();
        config.webdav.username = "alice".to_string();
        assert_eq!(config.missing_fields(), vec!["password"]);
        assert!(matches!(
            config.validate(),
            Err(SyncError::ConfigIncomplete { .. })
        ));

        config.webdav.password = "secret".to_string();
        assert!(config.is_complete());
        assert_eq!(config.lock_key(), "webdav:alice");
    }

    #[test]
    fn test_upstash_identity_is_namespace() {
        let mut config = SyncConfig::default();
        config.provider = BackendKind::Upstash;
        assert_eq!(config.identity(), DEFAULT_STORAGE_KEY);
        assert_eq!(config.missing_fields(), vec!["endpoint", "apiKey"]);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("WebDAV".parse::<BackendKind>(), Ok(BackendKind::WebDav));
        assert_eq!("upstash".parse::<BackendKind>(), Ok(BackendKind::Upstash));
        assert!("s3".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_migrate_backfills_namespace() {
        let persisted = json!({
            "provider": "upstash",
            "upstash": { "endpoint": "https://kv.example.com", "apiKey": "k" }
        });
        let config = migrate(persisted, 1).unwrap();
        assert_eq!(config.upstash.username, DEFAULT_STORAGE_KEY);
        assert_eq!(config.upstash.api_key, "k");
    }

    #[test]
    fn test_migrate_clears_legacy_proxy() {
        let persisted = json!({ "proxyUrl": "/api/cors/" });
        assert_eq!(migrate(persisted.clone(), 2).unwrap().proxy_url, "");

        // Already at version 3: left alone
        assert_eq!(migrate(persisted, 3).unwrap().proxy_url, "/api/cors/");

        let custom = json!({ "proxyUrl": "https://proxy.example.com" });
        assert_eq!(
            migrate(custom, 1).unwrap().proxy_url,
            "https://proxy.example.com"
        );
    }

    #[test]
    fn test_migrate_skips_applied_steps() {
        let persisted = json!({
            "upstash": { "endpoint": "e", "username": "custom", "apiKey": "k" }
        });
        let config = migrate(persisted, 2).unwrap();
        assert_eq!(config.upstash.username, "custom");
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let persisted = json!({
            "provider": "webdav",
            "useProxy": true,
            "proxyUrl": "/api/cors/",
            "webdav": { "endpoint": "https://dav", "username": "u", "password": "p" },
            "upstash": { "endpoint": "", "username": "someone", "apiKey": "" },
            "lastSyncTime": 1700000000000i64,
            "lastProvider": "webdav"
        });
        let once = migrate(persisted, 0).unwrap();
        let twice = migrate(serde_json::to_value(&once).unwrap(), SYNC_CONFIG_VERSION).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_migrate_preserves_unknown_fields() {
        let persisted = json!({
            "autoSyncMinutes": 15,
            "webdav": { "endpoint": "x", "folder": "custom" },
            "upstash": { "apiKey": "k", "region": "eu-west-1" },
        });
        let config = migrate(persisted, 0).unwrap();
        assert_eq!(config.extra.get("autoSyncMinutes"), Some(&json!(15)));
        assert_eq!(config.webdav.endpoint, "x");
        assert_eq!(config.webdav.extra.get("folder"), Some(&json!("custom")));
        assert_eq!(config.upstash.extra.get("region"), Some(&json!("eu-west-1")));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["autoSyncMinutes"], 15);
        assert_eq!(back["webdav"]["folder"], "custom");
        assert_eq!(back["upstash"]["region"], "eu-west-1");
        assert_eq!(back["upstash"]["apiKey"], "k");
        assert_eq!(back["upstash"]["username"], DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_store_round_trips_nested_unknown_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        fs::write(
            &path,
            json!({
                "version": SYNC_CONFIG_VERSION,
                "state": { "webdav": { "endpoint": "x", "folder": "custom" } }
            })
            .to_string(),
        )
        .unwrap();

        let store = SyncConfigStore::with_path(path.clone());
        let mut config = store.load().unwrap();
        config.last_sync_time = 7;
        store.save(&config).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["state"]["webdav"]["folder"], "custom");
        assert_eq!(raw["state"]["lastSyncTime"], 7);
    }

    #[test]
    fn test_migrate_rejects_non_object() {
        assert!(migrate(json!([1, 2]), 0).is_err());
        assert!(migrate(Value::Null, 0).is_ok());
    }

    #[test]
    fn test_store_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        let store = SyncConfigStore::with_path(path.clone());

        assert_eq!(store.load().unwrap(), SyncConfig::default());

        let mut config = SyncConfig::default();
        config.provider = BackendKind::Upstash;
        config.upstash.endpoint = "https://kv.example.com".to_string();
        config.last_sync_time = 42;
        store.save(&config).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], SYNC_CONFIG_VERSION);

        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_store_migrates_old_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync.json");
        fs::write(
            &path,
            r#"{"version": 1, "state": {"proxyUrl": "/api/cors/", "upstash": {"username": ""}}}"#,
        )
        .unwrap();

        let config = SyncConfigStore::with_path(path).load().unwrap();
        assert_eq!(config.proxy_url, "");
        assert_eq!(config.upstash.username, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn test_in_memory_store_save_is_noop() {
        let store = SyncConfigStore::new();
        store.save(&SyncConfig::default()).unwrap();
        assert_eq!(store.load().unwrap(), SyncConfig::default());
    }
}
