//! Config command handlers
//!
//! Application settings live in the TOML config file; sync settings live in
//! the versioned sync config owned by the sync service. `config set` routes
//! each key to the right place.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use chatsync_core::sync::{BackendKind, SyncConfig};
use chatsync_core::Config;

use super::open_service;
use crate::output::{or_unset, redact, Output, OutputFormat};

/// Keys stored in the application config file
const APP_KEYS: &[&str] = &["data_dir", "user_name", "request_timeout_secs", "log_file"];

/// Keys stored in the sync config
const SYNC_KEYS: &[&str] = &[
    "provider",
    "use_proxy",
    "proxy_url",
    "webdav.endpoint",
    "webdav.username",
    "webdav.password",
    "upstash.endpoint",
    "upstash.username",
    "upstash.api_key",
];

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let sync = open_service(&config)?.config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "user_name": config.user_name,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file,
                    "sync": {
                        "provider": sync.provider,
                        "use_proxy": sync.use_proxy,
                        "proxy_url": sync.proxy_url,
                        "webdav": {
                            "endpoint": sync.webdav.endpoint,
                            "username": sync.webdav.username,
                            "password": redact(&sync.webdav.password),
                        },
                        "upstash": {
                            "endpoint": sync.upstash.endpoint,
                            "username": sync.upstash.username,
                            "api_key": redact(&sync.upstash.api_key),
                        },
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!(
                "  user_name:            {}",
                config.user_name.as_deref().unwrap_or("(not set)")
            );
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Sync:");
            println!("  provider:         {}", sync.provider);
            println!("  use_proxy:        {}", sync.use_proxy);
            println!("  proxy_url:        {}", or_unset(&sync.proxy_url));
            println!("  webdav.endpoint:  {}", or_unset(&sync.webdav.endpoint));
            println!("  webdav.username:  {}", or_unset(&sync.webdav.username));
            println!("  webdav.password:  {}", redact(&sync.webdav.password));
            println!("  upstash.endpoint: {}", or_unset(&sync.upstash.endpoint));
            println!("  upstash.username: {}", or_unset(&sync.upstash.username));
            println!("  upstash.api_key:  {}", redact(&sync.upstash.api_key));
            println!();
            println!("Config file:      {}", effective_path.display());
            println!("Sync config file: {}", config.sync_config_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    if APP_KEYS.contains(&key.as_str()) {
        apply_app_key(&mut config, &key, &value)?;

        // Save to the CLI-specified path or default
        let save_path = config_path
            .cloned()
            .unwrap_or_else(Config::config_file_path);
        config
            .save_to_path(&save_path)
            .context("Failed to save configuration")?;
    } else if SYNC_KEYS.contains(&key.as_str()) {
        let service = open_service(&config)?;
        let mut updated = service.config();
        apply_sync_key(&mut updated, &key, &value)?;
        service
            .update_config(|sync| *sync = updated)
            .context("Failed to save sync configuration")?;
    } else {
        bail!(
            "Unknown configuration key: '{}'\n\
             Valid keys: {}, {}",
            key,
            APP_KEYS.join(", "),
            SYNC_KEYS.join(", ")
        );
    }

    let shown = if key.ends_with("password") || key.ends_with("api_key") {
        redact(&value)
    } else {
        value.as_str()
    };
    output.success(&format!("Set {} = {}", key, shown));

    Ok(())
}

/// Empty or "none" clears an optional setting
fn optional(value: &str) -> Option<&str> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value)
    }
}

fn apply_app_key(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "user_name" => config.user_name = optional(value).map(str::to_string),
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a whole number of seconds.")?;
        }
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => bail!("Unknown configuration key: '{}'", key),
    }
    Ok(())
}

fn apply_sync_key(config: &mut SyncConfig, key: &str, value: &str) -> Result<()> {
    let value = value.trim();
    match key {
        "provider" => {
            config.provider = value.parse::<BackendKind>().map_err(anyhow::Error::msg)?;
        }
        "use_proxy" => {
            config.use_proxy = value
                .parse()
                .context("Invalid value for use_proxy. Use 'true' or 'false'.")?;
        }
        "proxy_url" => config.proxy_url = optional(value).unwrap_or_default().to_string(),
        "webdav.endpoint" => config.webdav.endpoint = value.to_string(),
        "webdav.username" => config.webdav.username = value.to_string(),
        "webdav.password" => config.webdav.password = value.to_string(),
        "upstash.endpoint" => config.upstash.endpoint = value.to_string(),
        "upstash.username" => config.upstash.username = value.to_string(),
        "upstash.api_key" => config.upstash.api_key = value.to_string(),
        _ => bail!("Unknown sync configuration key: '{}'", key),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sync_keys() {
        let mut config = SyncConfig::default();
        apply_sync_key(&mut config, "provider", "Upstash").unwrap();
        apply_sync_key(&mut config, "upstash.endpoint", " https://kv.example.com ").unwrap();
        apply_sync_key(&mut config, "use_proxy", "false").unwrap();

        assert_eq!(config.provider, BackendKind::Upstash);
        assert_eq!(config.upstash.endpoint, "https://kv.example.com");
        assert!(!config.use_proxy);
    }

    #[test]
    fn test_apply_sync_key_rejects_bad_values() {
        let mut config = SyncConfig::default();
        assert!(apply_sync_key(&mut config, "provider", "ftp").is_err());
        assert!(apply_sync_key(&mut config, "use_proxy", "maybe").is_err());
        assert!(apply_sync_key(&mut config, "webdav.nope", "x").is_err());
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_proxy_url_none_clears() {
        let mut config = SyncConfig::default();
        apply_sync_key(&mut config, "proxy_url", "https://relay.example.com").unwrap();
        apply_sync_key(&mut config, "proxy_url", "none").unwrap();
        assert_eq!(config.proxy_url, "");
    }

    #[test]
    fn test_apply_app_keys() {
        let mut config = Config::default();
        apply_app_key(&mut config, "user_name", "alice").unwrap();
        apply_app_key(&mut config, "request_timeout_secs", "5").unwrap();
        apply_app_key(&mut config, "log_file", "/tmp/chatsync.log").unwrap();
        assert_eq!(config.user_name.as_deref(), Some("alice"));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/chatsync.log")));

        apply_app_key(&mut config, "user_name", "none").unwrap();
        assert!(config.user_name.is_none());
        assert!(apply_app_key(&mut config, "request_timeout_secs", "soon").is_err());
    }

    #[test]
    fn test_key_lists_are_disjoint() {
        for key in APP_KEYS {
            assert!(!SYNC_KEYS.contains(key));
        }
    }
}
