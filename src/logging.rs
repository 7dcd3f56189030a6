//! Log setup. The terminal belongs to the ui, so everything goes to a file.
//!
//! Filter with `RUST_LOG`, e.g. `RUST_LOG=flagedit::editor=trace`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "flagedit.log";

/// Installs the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes pending lines.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let dir = log_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    if let Err(e) = fs::create_dir_all(&dir) {
        eprintln!("Warning: Could not initialize file logging: {}", e);
        return None;
    }

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        &dir,
        LOG_FILE_NAME,
    ));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Some(guard)
}

pub fn log_path(log_dir: Option<&Path>) -> PathBuf {
    log_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path() {
        assert_eq!(
            log_path(Some(Path::new("/var/log"))),
            PathBuf::from("/var/log/flagedit.log")
        );
        assert!(log_path(None).starts_with(std::env::temp_dir()));
    }
}
