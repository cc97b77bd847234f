//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use chatsync_core::{StorageError, SyncError};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning (never suppressed in human mode)
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Report a failed command
///
/// Errors are printed even in quiet mode. A hint is added when some error
/// in the chain knows how the user can recover.
pub fn report_error(format: OutputFormat, err: &anyhow::Error) {
    let hint = hint(err);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "message": format!("{:#}", err),
                    "hint": hint,
                    "retryable": is_retryable(err),
                })
            );
        }
        OutputFormat::Human | OutputFormat::Quiet => {
            eprintln!("Error: {:#}", err);
            if let Some(hint) = hint {
                eprintln!("Hint: {}", hint);
            }
        }
    }
}

/// First recovery suggestion found along the error chain
pub fn hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            e.suggestion()
        } else {
            cause
                .downcast_ref::<StorageError>()
                .and_then(StorageError::recovery_suggestion)
        }
    })
}

fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<SyncError>())
        .any(SyncError::is_retryable)
}

/// Mask a secret for display
pub fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(not set)"
    } else {
        "********"
    }
}

/// Display an optional setting
pub fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_hint_found_through_context() {
        let err = anyhow::Error::new(SyncError::Auth { status: 401 }).context("Sync failed");
        assert!(hint(&err).unwrap().contains("credentials"));
        assert!(!is_retryable(&err));

        let storage = StorageError::NotFound {
            path: "/data/snapshot.json".into(),
        };
        assert_eq!(hint(&anyhow::Error::new(storage)), None);

        let disk = SyncError::Storage(StorageError::DiskFull {
            path: "/data/snapshot.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "No space left on device"),
        });
        let err = anyhow::Error::new(disk).context("Failed to save");
        assert!(hint(&err).unwrap().contains("disk space"));
    }

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = anyhow::Error::new(SyncError::Transport {
            url: "https://dav.example.com".to_string(),
            message: "request timed out".to_string(),
        });
        assert!(is_retryable(&err));
        assert!(hint(&err).is_some());

        assert!(hint(&anyhow::anyhow!("plain failure")).is_none());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact(""), "(not set)");
        assert_eq!(redact("hunter2"), "********");
    }

    #[test]
    fn test_or_unset() {
        assert_eq!(or_unset(""), "(not set)");
        assert_eq!(or_unset("https://dav.example.com"), "https://dav.example.com");
    }
}
