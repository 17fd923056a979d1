use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing::debug;

use crate::config::DirectoryConfig;

static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

fn default_log_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(std::env::temp_dir);
    base.join("principal-dir").join("logs")
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match "info".parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Installs the global subscriber. Failures are reported on stderr only.
pub fn init_logging(config: &DirectoryConfig) {
    if config.log_to_stderr {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr);
        if let Err(e) = subscriber.try_init() {
            eprintln!("Failed to init tracing subscriber: {e}");
        }
        return;
    }

    let log_dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log dir {:?}: {}", log_dir, e);
        return;
    }
    let file_appender = tracing_appender::rolling::never(&log_dir, "principal-dir.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(non_blocking);
    if let Err(e) = subscriber.try_init() {
        eprintln!("Failed to init tracing subscriber: {e}");
        return;
    }
    debug!(log_dir = ?log_dir, "logging initialized");
}
