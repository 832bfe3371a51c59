//! # Observability
//!
//! Logging setup shared by Threadline binaries.
//!
//! Libraries only emit `tracing` events; binaries call [`init_with_config`]
//! once at startup to decide where those events go:
//!
//! - JSON lines appended to `LogConfig::log_path`, when set
//! - compact human-readable lines on stderr, when `also_stderr` is set or
//!   no log file is configured
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "threadline".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod writer;

pub use writer::AppendLogWriter;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, recorded on the startup event.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL log file. `None` disables file output.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with defaults (stderr only, `info`).
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// A second call in the same process leaves the first subscriber in place.
/// If the log file cannot be opened, logging falls back to stderr.
pub fn init_with_config(config: LogConfig) {
    let file_writer = match config.log_path.as_deref().map(AppendLogWriter::new) {
        Some(Ok(writer)) => Some(writer),
        Some(Err(e)) => {
            eprintln!("failed to open log file {:?}: {}", config.log_path, e);
            None
        }
        None => None,
    };

    let stderr_enabled = config.also_stderr || file_writer.is_none();

    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_target(true)
            .with_writer(writer)
    });

    let stderr_layer = stderr_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter(&config.default_level))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }
}

/// Filter from `RUST_LOG`, or `default_level` when unset or invalid.
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
