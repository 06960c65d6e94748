//! Central JSONL file sink.
//!
//! Every service process appends to the same file.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default central log file: `~/.attendance-sync/logs/attendance.jsonl`.
///
/// Falls back to the system temp directory when no home directory exists
/// (e.g. a platform-spawned background context with a bare environment).
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".attendance-sync")
        .join("logs")
        .join("attendance.jsonl")
}

/// Append-only writer shared by every layer of one process.
///
/// The file is opened with `O_APPEND` and each formatted line reaches it in a
/// single `write_all`, so lines from the daemon and the delegate never split.
#[derive(Clone)]
pub struct CentralLogWriter {
    file: Arc<Mutex<File>>,
}

impl CentralLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for CentralLogWriter {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install the global subscriber: JSONL file layer plus optional stderr.
///
/// `RUST_LOG` wins over the configured level when it parses.
pub(crate) fn install(config: &LogConfig) -> io::Result<()> {
    let log_path = config
        .log_path
        .clone()
        .unwrap_or_else(default_log_path);
    let sink = CentralLogWriter::new(&log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));
    let stderr = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(JsonLayer::new(config.service_name.clone(), sink))
        .with(stderr)
        .try_init();

    // Already installed by an earlier call in this process.
    if installed.is_err() {
        return Ok(());
    }

    tracing::debug!(
        service = %config.service_name,
        log_path = %log_path.display(),
        "logging to central file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writer_creates_missing_log_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("attendance.jsonl");

        let mut sink = CentralLogWriter::new(&path).unwrap();
        sink.write_all(b"{\"message\":\"queued\"}\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"message\":\"queued\"}\n");
    }

    #[test]
    fn daemon_and_delegate_lines_share_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attendance.jsonl");

        let mut daemon = CentralLogWriter::new(&path).unwrap();
        let mut delegate = CentralLogWriter::new(&path).unwrap();
        daemon.write_all(b"daemon\n").unwrap();
        delegate.write_all(b"delegate\n").unwrap();
        daemon.write_all(b"daemon again\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "daemon\ndelegate\ndaemon again\n");
    }

    #[test]
    fn default_path_lives_under_base_dir() {
        let path = default_log_path();
        assert!(path.ends_with(".attendance-sync/logs/attendance.jsonl"));
    }
}
