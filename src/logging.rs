use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_NAME: &str = "crawler.log";
const DEFAULT_FILTER: &str = "mog_crawler=debug,info";

/// Installs the global subscriber: readable console output plus a daily-rotated
/// JSON file under `log_dir`.
///
/// The returned guard flushes the file writer when dropped, so `main` must hold it
/// until the run finishes.
pub fn init_logging(log_dir: impl AsRef<Path>) -> WorkerGuard {
    let log_dir = log_dir.as_ref();
    let _ = fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stdout);

    // RUST_LOG wins when set
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
