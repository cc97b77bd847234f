//! Sync command handlers

use anyhow::Result;

use chatsync_core::sync::{SyncError, SyncOutcome};
use chatsync_core::SyncService;

use crate::output::{Output, OutputFormat};

/// Sync with the configured remote store
pub async fn sync(service: &SyncService, output: &Output) -> Result<()> {
    let config = service.config();
    output.message(&format!(
        "Syncing with {} as {}...",
        config.provider,
        config.identity()
    ));

    let outcome = match service.sync().await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let SyncError::ConfigIncomplete { ref missing, .. } = e {
                output.warning(&format!(
                    "Set the missing fields with:\n  {}",
                    missing
                        .iter()
                        .map(|field| format!(
                            "chatsync config set {}.{} <value>",
                            config.provider,
                            cli_key(field)
                        ))
                        .collect::<Vec<_>>()
                        .join("\n  ")
                ));
            }
            return Err(e.into());
        }
    };

    match output.format {
        OutputFormat::Json => match outcome {
            SyncOutcome::FirstSync { sessions } => println!(
                "{}",
                serde_json::json!({"status": "first_sync", "sessions": sessions})
            ),
            SyncOutcome::Merged {
                sessions,
                messages,
                new_sessions,
            } => println!(
                "{}",
                serde_json::json!({
                    "status": "merged",
                    "sessions": sessions,
                    "messages": messages,
                    "new_sessions": new_sessions
                })
            ),
        },
        _ => match outcome {
            SyncOutcome::FirstSync { sessions } => {
                output.success(&format!(
                    "Sync complete - remote was empty, pushed {} session(s)",
                    sessions
                ));
            }
            SyncOutcome::Merged {
                sessions,
                messages,
                new_sessions,
            } => {
                output.success("Sync complete - local and remote merged");
                output.message(&format!(
                    "  Sessions: {} ({} new), Messages: {}",
                    sessions, new_sessions, messages
                ));
            }
        },
    }

    Ok(())
}

/// Check that the configured remote store is reachable
pub async fn check(service: &SyncService, output: &Output) -> Result<()> {
    let config = service.config();
    if !config.is_complete() {
        output.warning(&format!(
            "{} is not fully configured (missing: {})",
            config.provider,
            config.missing_fields().join(", ")
        ));
    }

    let reachable = service.check().await?;
    match output.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({"provider": config.provider, "reachable": reachable})
        ),
        OutputFormat::Quiet => println!("{}", reachable),
        OutputFormat::Human => {
            if reachable {
                output.success(&format!("{} is reachable", config.provider));
            } else {
                println!("✗ {} is not reachable", config.provider);
            }
        }
    }

    Ok(())
}

/// Map a sync config field name to its `config set` key suffix
fn cli_key(field: &str) -> &str {
    match field {
        "apiKey" => "api_key",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_key() {
        assert_eq!(cli_key("apiKey"), "api_key");
        assert_eq!(cli_key("endpoint"), "endpoint");
    }
}
