//! Import command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use chatsync_core::SyncService;

use crate::output::{Output, OutputFormat};

/// Merge a snapshot file into local state
pub fn import(service: &SyncService, file: PathBuf, output: &Output) -> Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read import file {:?}", file))?;
    let report = service
        .import(&raw)
        .with_context(|| format!("Failed to import {:?}", file))?;

    match output.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "status": "success",
                "state_changed": report.state_changed,
                "sessions": report.sessions,
                "new_sessions": report.new_sessions
            })
        ),
        _ => {
            output.success(&format!(
                "Imported {} - {} session(s), {} new",
                file.display(),
                report.sessions,
                report.new_sessions
            ));
        }
    }

    Ok(())
}
