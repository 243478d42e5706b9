//! Logging setup for Slackbot using tracing.
//!
//! Two layers share one `EnvFilter` (`RUST_LOG`, default `warn,slackbot=info`):
//! a daily rolling file without ANSI codes and a colored stderr layer.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn,slackbot=info";
const LOG_FILE: &str = "slackbot.log";

/// Initialize logging under `~/.slackbot/logs`.
pub fn init() -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = get_log_dir()?;
    let guard = init_in(&log_dir)?;
    Ok((guard, log_dir))
}

/// Initialize logging with the rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Fails if a global subscriber is already set.
pub fn init_in(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(true))
        .try_init()?;

    tracing::debug!("Log directory: {}", log_dir.display());
    Ok(guard)
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Get the log directory path (~/.slackbot/logs).
pub fn get_log_dir() -> Result<PathBuf> {
    Ok(crate::config::get_home_dir()?.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_in_writes_to_log_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_dir = temp_dir.path().join("logs");

        let guard = init_in(&log_dir).unwrap();
        tracing::info!("logging test line");
        drop(guard);

        assert!(log_dir.is_dir());
        let files: Vec<_> = std::fs::read_dir(&log_dir).unwrap().collect();
        assert!(!files.is_empty());

        // Only one global subscriber per process.
        assert!(init_in(&log_dir).is_err());
    }
}
