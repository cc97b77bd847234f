//! Export command handler

use std::path::PathBuf;

use anyhow::{Context, Result};

use chatsync_core::sync::ExportOutcome;
use chatsync_core::SyncService;

use crate::output::{Output, OutputFormat};

/// Write QA transcripts for every session with an answered question
pub fn export(service: &SyncService, out_dir: PathBuf, output: &Output) -> Result<()> {
    let outcome = service
        .export(&out_dir)
        .with_context(|| format!("Failed to export to {:?}", out_dir))?;

    match (outcome, output.format) {
        (ExportOutcome::NoData, OutputFormat::Json) => {
            println!("{}", serde_json::json!({"status": "no_data", "files": []}));
        }
        (ExportOutcome::NoData, _) => {
            output.message("Nothing to export - no session has an answered question.");
        }
        (ExportOutcome::Written(paths), OutputFormat::Json) => {
            println!(
                "{}",
                serde_json::json!({"status": "success", "files": paths})
            );
        }
        (ExportOutcome::Written(paths), OutputFormat::Quiet) => {
            for path in paths {
                println!("{}", path.display());
            }
        }
        (ExportOutcome::Written(paths), OutputFormat::Human) => {
            for path in &paths {
                println!("  {}", path.display());
            }
            output.success(&format!(
                "Exported {} transcript(s) to {}",
                paths.len(),
                out_dir.display()
            ));
        }
    }

    Ok(())
}
