//! Logging bootstrap for the attendance binaries.
//!
//! Both processes write structured JSONL to `<base>/logs/attendance.jsonl`
//! through the shared observability crate.

use crate::{CoreResult, Paths};

/// Initialize the logging system for one attendance service.
///
/// `level` is the default filter; `RUST_LOG` still wins when set. Unknown
/// levels fall back to `info`.
///
/// ```ignore
/// init_logging("attendance-syncd", "debug", &paths, true)?;
/// tracing::info!("daemon started");
/// ```
pub fn init_logging(
    service_name: &str,
    level: &str,
    paths: &Paths,
    also_stderr: bool,
) -> CoreResult<()> {
    let default_level = parse_level(level).as_str().to_ascii_lowercase();

    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level,
        log_path: Some(paths.log_file()),
        also_stderr,
    })?;
    Ok(())
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
