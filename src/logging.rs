//! Structured logging setup.
//!
//! The human log is separate from the resume ledger: it can be filtered,
//! reformatted or dropped without affecting resumption.

use crate::config::LogFormat;
use crate::error::{BookvoiceError, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that overrides the level filter.
pub const LOG_ENV: &str = "BOOKVOICE_LOG";

/// Default filter directive for a verbosity level.
pub fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Filter from `BOOKVOICE_LOG`, then `RUST_LOG`, then verbosity.
pub fn build_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbosity, quiet)))
}

/// Install the global subscriber.
///
/// Logs go to stderr, or are appended to `file` when given.
pub fn init(verbosity: u8, quiet: bool, format: LogFormat, file: Option<&Path>) -> Result<()> {
    let (writer, ansi) = match file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let filter = build_filter(verbosity, quiet);
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(ansi)
                    .with_target(false)
                    .with_writer(writer),
            )
            .try_init(),
    };
    result.map_err(|e| BookvoiceError::Other(format!("Failed to initialize logging: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(default_directive(2, true), "warn");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(0, false), "info");
        assert_eq!(default_directive(1, false), "debug");
        assert_eq!(default_directive(5, false), "trace");
    }

    #[test]
    fn init_with_log_file_appends() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("bookvoice.log");
        // Another test may already have installed a global subscriber.
        if init(0, false, LogFormat::Json, Some(&path)).is_ok() {
            tracing::info!(index = 1, "written to file");
        }
        assert!(path.exists());
    }
}
