//! Logging initialization for the client.
//!
//! Thin wrapper over the observability package: structured JSONL goes to
//! `~/.threadline/logs/client.jsonl`, stderr output is opt-in.

use crate::Paths;
use observability::LogConfig;

const SERVICE_NAME: &str = "threadline";

/// Initialize the logging system.
///
/// * `level` - Default log level, overridden by `RUST_LOG` when set. Unknown
///   names fall back to `info`.
/// * `paths` - Where the JSONL log file lives.
///
/// Set `THREADLINE_LOG_STDERR=1` to mirror logs to stderr.
pub fn init_logging(level: &str, paths: &Paths) {
    let also_stderr = std::env::var("THREADLINE_LOG_STDERR")
        .map(|raw| is_truthy(&raw))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
