//! File system paths shared by the interactive daemon and the background
//! delegate.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the home directory.
const BASE_DIR_NAME: &str = ".attendance-sync";
/// Socket the interactive daemon listens on for delegate requests.
const SOCKET_NAME: &str = "syncd.sock";

/// Manages file system paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.attendance-sync)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.attendance-sync`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (<base>/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the durable queue database path (<base>/queue.sqlite).
    pub fn queue_file(&self) -> PathBuf {
        self.base_dir.join("queue.sqlite")
    }

    /// Get the interactive daemon socket path (<base>/syncd.sock).
    pub fn socket_file(&self) -> PathBuf {
        self.base_dir.join(SOCKET_NAME)
    }

    /// Get the logs directory (<base>/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the central JSONL log file (<base>/logs/attendance.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("attendance.jsonl")
    }

    /// Get the directory holding wake-on-connectivity markers (<base>/wake).
    pub fn wake_dir(&self) -> PathBuf {
        self.base_dir.join("wake")
    }

    /// Get the marker file for a wake registration tag.
    pub fn wake_marker(&self, tag: &str) -> PathBuf {
        self.wake_dir().join(tag)
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.wake_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-attendance");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.queue_file(), base.join("queue.sqlite"));
        assert_eq!(paths.socket_file(), base.join("syncd.sock"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(paths.log_file(), base.join("logs/attendance.jsonl"));
        assert_eq!(
            paths.wake_marker("sync-attendance"),
            base.join("wake/sync-attendance")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested"));

        paths.ensure_dirs().unwrap();

        assert!(paths.base_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
        assert!(paths.wake_dir().is_dir());
    }
}
