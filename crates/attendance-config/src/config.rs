//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default remote store URL (can be overridden at compile time via ATTENDANCE_REMOTE_URL).
pub const DEFAULT_REMOTE_URL: &str = match option_env!("ATTENDANCE_REMOTE_URL") {
    Some(url) => url,
    None => "https://attendance.example.supabase.co",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
const DEFAULT_DELEGATE_REPLY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Remote store REST endpoint.
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    /// Public API key sent with every remote request.
    #[serde(default)]
    pub remote_api_key: String,
    /// Bearer credential for remote writes. Only the interactive context has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Delay between an online transition and the drain it schedules.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Bound on each background delegate reply wait.
    #[serde(default = "default_delegate_reply_timeout_secs")]
    pub delegate_reply_timeout_secs: u64,
    /// HTTP timeout for one remote commit.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_delegate_reply_timeout_secs() -> u64 {
    DEFAULT_DELEGATE_REPLY_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            remote_url: default_remote_url(),
            remote_api_key: String::new(),
            access_token: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            delegate_reply_timeout_secs: DEFAULT_DELEGATE_REPLY_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from `<base>/config.json`, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `<base>/config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override fields from environment-style lookups.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(level) = get("ATTENDANCE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("ATTENDANCE_REMOTE_URL") {
            self.remote_url = url;
        }
        if let Some(key) = get("ATTENDANCE_REMOTE_API_KEY") {
            self.remote_api_key = key;
        }
        if let Some(token) = get("ATTENDANCE_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.remote_url()?;
        if self.delegate_reply_timeout_secs == 0 {
            return Err(CoreError::Config(
                "delegate_reply_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        // A delegated commit must finish before the delegate gives up on it.
        if self.request_timeout_secs >= self.delegate_reply_timeout_secs {
            return Err(CoreError::Config(format!(
                "request_timeout_secs ({}) must be shorter than delegate_reply_timeout_secs ({})",
                self.request_timeout_secs, self.delegate_reply_timeout_secs
            )));
        }
        Ok(())
    }

    /// Get the remote URL as a parsed URL.
    pub fn remote_url(&self) -> CoreResult<Url> {
        Url::parse(&self.remote_url).map_err(CoreError::from)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn delegate_reply_timeout(&self) -> Duration {
        Duration::from_secs(self.delegate_reply_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
