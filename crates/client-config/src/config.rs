//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via THREADLINE_API_BASE_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("THREADLINE_API_BASE_URL") {
    Some(url) => url,
    None => "http://localhost:8000",
};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RECOVERY_WAIT_TIMEOUT_SECS: u64 = 30;

/// Path prefixes for each backend service, joined onto the API base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePaths {
    /// Users service (register, login, profile).
    pub users: String,
    /// Posts service (posts, comments, votes).
    pub posts: String,
    /// Communities service.
    pub communities: String,
    /// Notifications service.
    pub notifications: String,
    /// AI service (fact checking).
    pub ai: String,
}

impl Default for ServicePaths {
    fn default() -> Self {
        Self {
            users: String::new(),
            posts: String::new(),
            communities: String::new(),
            notifications: "/notifications".to_string(),
            ai: String::new(),
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL every API path is resolved against.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Default timeout for JSON requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for multipart uploads.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    /// Upper bound on how long a request waits for another caller's session recovery.
    #[serde(default = "default_recovery_wait_timeout_secs")]
    pub recovery_wait_timeout_secs: u64,
    /// Per-service path prefixes.
    #[serde(default)]
    pub services: ServicePaths,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_upload_timeout_secs() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_SECS
}

fn default_recovery_wait_timeout_secs() -> u64 {
    DEFAULT_RECOVERY_WAIT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            log_level: default_log_level(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            recovery_wait_timeout_secs: DEFAULT_RECOVERY_WAIT_TIMEOUT_SECS,
            services: ServicePaths::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = non_empty("THREADLINE_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(level) = non_empty("THREADLINE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(secs) = non_empty("THREADLINE_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.request_timeout_secs = secs;
        }
    }

    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.request_timeout_secs == 0
            || self.upload_timeout_secs == 0
            || self.recovery_wait_timeout_secs == 0
        {
            return Err(CoreError::Config(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// Default timeout for JSON requests.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout for multipart uploads.
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Bound on waiting for an in-flight session recovery.
    pub fn recovery_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_wait_timeout_secs)
    }
}
