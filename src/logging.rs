use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::store::LOG_FILE;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs to stderr and appends to `<save_dir>/translation.log`.
///
/// Keep the returned guard alive until exit so buffered lines reach the file. Falls
/// back to stderr only when the log file cannot be opened.
pub fn init(save_dir: &Path) -> Option<WorkerGuard> {
    let log_path = save_dir.join(LOG_FILE);
    let opened = std::fs::create_dir_all(save_dir).and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
    });
    match opened {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init();
            tracing::info!(path = %log_path.display(), "logging initialized");
            Some(guard)
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(env_filter())
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init();
            tracing::warn!(error = %e, path = %log_path.display(), "failed to open log file; using stderr");
            None
        }
    }
}
