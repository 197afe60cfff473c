//! Diagnostic logging setup.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vmforge_shared::errors::{ResultExt, VmforgeResult};

/// Environment variable holding the log filter, e.g. `VMFORGE_LOG=vmforge=debug`.
pub const LOG_ENV: &str = "VMFORGE_LOG";
pub const LOG_FILE: &str = "vmforge.log";

/// Keeps the file writer alive. Dropping it flushes pending log lines.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber: stderr always, plus `<log_dir>/vmforge.log`
/// when a directory is given.
///
/// A subscriber installed earlier (tests, embedding applications) is kept.
pub fn init_logging(log_dir: Option<&Path>) -> VmforgeResult<LoggingGuard> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            crate::util::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }

    Ok(LoggingGuard { _file: guard })
}
