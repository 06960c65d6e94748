//! Wake-on-connectivity registration.

use async_trait::async_trait;
use thiserror::Error;

/// Tag identifying the background sync registration.
pub const SYNC_TAG: &str = "sync-attendance";

#[derive(Error, Debug)]
pub enum WakeError {
    /// The platform has no wake-on-connectivity mechanism.
    #[error("Wake-on-connectivity not supported")]
    Unsupported,

    #[error("Wake registration failed: {0}")]
    Failed(String),
}

/// Asks the platform to run the background delegate when connectivity
/// returns. Registering the same tag twice is harmless.
#[async_trait]
pub trait WakeRegistrar: Send + Sync {
    async fn register(&self, tag: &str) -> Result<(), WakeError>;
}

/// Registrar for platforms without the mechanism. Queued events then wait
/// for the next online transition seen by an interactive context.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedWake;

#[async_trait]
impl WakeRegistrar for UnsupportedWake {
    async fn register(&self, _tag: &str) -> Result<(), WakeError> {
        Err(WakeError::Unsupported)
    }
}
