//! # Observability
//!
//! Logging setup shared by the attendance sync services.
//!
//! Services are **log producers** only. They call [`init_with_config`] once at
//! startup and use the standard `tracing` macros everywhere else. Each
//! service writes structured JSONL to a central file:
//!
//! `~/.attendance-sync/logs/attendance.jsonl`
//!
//! The interactive daemon and the background delegate run as separate
//! processes and append to the same file; every line carries the service
//! name and pid so the two streams can be told apart:
//!
//! ```text
//! tail -f ~/.attendance-sync/logs/attendance.jsonl | jq 'select(.service == "attendance-delegate")'
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "attendance-syncd".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! })?;
//! tracing::info!("ready");
//! ```

mod file_sink;
mod json_layer;

use std::io;
use std::path::PathBuf;

pub use file_sink::{default_log_path, CentralLogWriter};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "attendance-syncd", "attendance-delegate").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Overridden by the `RUST_LOG` environment variable when set.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.attendance-sync/logs/attendance.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact human-readable logs to stderr.
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

/// Initialize logging with default settings for the given service.
pub fn init(service_name: &str) -> io::Result<()> {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    })
}

/// Initialize logging with custom configuration.
///
/// Fails if the log file cannot be opened. Calling this twice in one process
/// keeps the first subscriber and returns `Ok(())`.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    file_sink::install(&config)
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
