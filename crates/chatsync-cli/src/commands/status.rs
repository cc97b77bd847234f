//! Status command handler

use anyhow::{Context, Result};

use chatsync_core::{Config, FileSnapshotStore, SnapshotStore, SyncService};

use crate::output::{Output, OutputFormat};

/// Show sync and local storage status
pub fn show(config: &Config, service: &SyncService, output: &Output) -> Result<()> {
    let status = service.status();
    let store = FileSnapshotStore::from_config(config);
    let snapshot = store
        .load_snapshot()
        .context("Failed to load local snapshot")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "sync": status,
                    "storage": {
                        "snapshot": store.path(),
                        "exists": store.exists()
                    },
                    "counts": {
                        "sessions": snapshot.sessions.len(),
                        "messages": snapshot.message_count()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!(
                "{}",
                status
                    .last_sync_time
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
        OutputFormat::Human => {
            println!("chatsync Status");
            println!("===============");
            println!();
            println!("Sync:");
            println!("  Provider:  {}", status.provider);
            println!("  Identity:  {}", status.identity);
            if status.configured {
                println!("  Config:    complete");
            } else {
                println!("  Config:    missing {}", status.missing.join(", "));
            }
            if let Some(ref proxy) = status.proxy {
                println!("  Proxy:     {}", proxy);
            }
            match status.last_sync_time {
                Some(at) => println!(
                    "  Last sync: {} ({})",
                    at.format("%Y-%m-%d %H:%M:%S UTC"),
                    status.last_provider.as_deref().unwrap_or("unknown")
                ),
                None => println!("  Last sync: never"),
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!();
            println!("Contents:");
            println!("  Sessions: {}", snapshot.sessions.len());
            println!("  Messages: {}", snapshot.message_count());
        }
    }

    Ok(())
}
