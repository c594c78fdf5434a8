//! Logging and tracing initialization.

use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use tracing::Subscriber;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
///
/// When a log file is configured it receives the output; opening it is
/// best-effort with a stderr fallback, since logging must never take
/// the process down.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = fmt::Subscriber::builder().with_env_filter(env_filter);

    match (config.json, open_log_file(config)) {
        (true, Some(writer)) => set_global(builder.json().with_writer(writer).finish()),
        (true, None) => set_global(builder.json().finish()),
        (false, Some(writer)) => set_global(
            builder
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer)
                .finish(),
        ),
        (false, None) => set_global(builder.with_target(true).finish()),
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}

fn set_global(subscriber: impl Subscriber + Send + Sync + 'static) {
    // Re-initialization (tests, embedded use) keeps the first subscriber.
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn open_log_file(config: &LoggingConfig) -> Option<Mutex<File>> {
    let path = config.file.as_ref()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(Mutex::new(file)),
        Err(e) => {
            eprintln!("Failed to open log file {}: {e}", path.display());
            None
        }
    }
}
