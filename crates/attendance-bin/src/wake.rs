//! File-marker wake registration.
//!
//! Registering a tag writes `<base>/wake/<tag>`. The platform job that runs
//! `background-sync` on connectivity changes checks for the marker, and a
//! pass that leaves nothing failed removes it.

use async_trait::async_trait;
use attendance_config::Paths;
use attendance_sync::{WakeError, WakeRegistrar};
use chrono::Utc;
use std::io::ErrorKind;
use tracing::debug;

pub struct FileWakeRegistrar {
    paths: Paths,
}

impl FileWakeRegistrar {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl WakeRegistrar for FileWakeRegistrar {
    async fn register(&self, tag: &str) -> Result<(), WakeError> {
        let marker = self.paths.wake_marker(tag);
        tokio::fs::create_dir_all(self.paths.wake_dir())
            .await
            .map_err(|e| WakeError::Failed(e.to_string()))?;
        tokio::fs::write(&marker, Utc::now().to_rfc3339())
            .await
            .map_err(|e| WakeError::Failed(e.to_string()))?;
        debug!(marker = %marker.display(), "Wake marker written");
        Ok(())
    }
}

pub fn is_registered(paths: &Paths, tag: &str) -> bool {
    paths.wake_marker(tag).exists()
}

/// Remove the marker for `tag`. A missing marker is not an error.
pub fn clear(paths: &Paths, tag: &str) -> std::io::Result<()> {
    match std::fs::remove_file(paths.wake_marker(tag)) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_sync::SYNC_TAG;
    use tempfile::tempdir;

    #[tokio::test]
    async fn register_then_clear() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let registrar = FileWakeRegistrar::new(paths.clone());

        assert!(!is_registered(&paths, SYNC_TAG));
        registrar.register(SYNC_TAG).await.unwrap();
        registrar.register(SYNC_TAG).await.unwrap();
        assert!(is_registered(&paths, SYNC_TAG));

        clear(&paths, SYNC_TAG).unwrap();
        clear(&paths, SYNC_TAG).unwrap();
        assert!(!is_registered(&paths, SYNC_TAG));
    }
}
