//! Configuration settings and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Main configuration for the Courier service.
///
/// Loaded once at startup and immutable for the process lifetime.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Folder to watch for incoming XML files.
    pub watch_folder: PathBuf,

    /// Upload endpoint settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// File matching and post-processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Concurrency and polling settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upload endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Endpoint URL for multipart uploads.
    #[serde(default)]
    pub endpoint: String,

    /// Authentication for the endpoint.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Total upload attempts per job (first attempt included).
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay between retries, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

/// Authentication variants, tagged by `type` in YAML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// No Authorization header.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// Standard HTTP Basic credentials.
    Basic { username: String, password: String },
}

/// File matching and post-processing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Glob patterns matched against file names.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Queue files already present in the watch folder at startup.
    #[serde(default)]
    pub process_existing: bool,

    /// Delete the source file after a successful upload.
    #[serde(default)]
    pub delete_after_upload: bool,

    /// Move uploaded files here instead (ignored when deleting).
    #[serde(default)]
    pub processed_folder: Option<PathBuf>,
}

/// Concurrency and polling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Watch subdirectories recursively.
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Maximum number of concurrent uploads.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_uploads: usize,

    /// Stability polling interval in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,

    /// Maximum seconds to wait for a file to stop changing.
    #[serde(default = "default_stability_timeout")]
    pub stability_timeout: u64,

    /// Seconds a completed or failed job stays in the ledger to absorb
    /// duplicate events for the same path.
    #[serde(default = "default_retention")]
    pub retention: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON log output.
    #[serde(default)]
    pub json: bool,
}

const fn default_timeout() -> u64 {
    30
}

const fn default_retry_attempts() -> u32 {
    3
}

const fn default_retry_delay() -> u64 {
    5
}

fn default_patterns() -> Vec<String> {
    vec!["*.xml".to_string(), "*.XML".to_string()]
}

const fn default_true() -> bool {
    true
}

const fn default_max_concurrent() -> usize {
    5
}

const fn default_check_interval() -> f64 {
    1.0
}

const fn default_stability_timeout() -> u64 {
    60
}

const fn default_retention() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            auth: AuthConfig::None,
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            process_existing: false,
            delete_after_upload: false,
            processed_folder: None,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            recursive: default_true(),
            max_concurrent_uploads: default_max_concurrent(),
            check_interval: default_check_interval(),
            stability_timeout: default_stability_timeout(),
            retention: default_retention(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;

        serde_yaml::from_str(&raw)
            .map_err(|e| Error::config(format!("invalid YAML in '{}': {e}", path.display())))
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.watch_folder.as_os_str().is_empty() {
            return Err(Error::config("watch_folder is required"));
        }

        if !self.watch_folder.exists() {
            return Err(Error::config(format!(
                "watch folder does not exist: {}",
                self.watch_folder.display()
            )));
        }

        if !self.watch_folder.is_dir() {
            return Err(Error::config(format!(
                "watch folder is not a directory: {}",
                self.watch_folder.display()
            )));
        }

        if self.api.endpoint.is_empty() {
            return Err(Error::config("api.endpoint is required"));
        }

        if !self.api.endpoint.starts_with("http://") && !self.api.endpoint.starts_with("https://") {
            return Err(Error::config(format!(
                "api.endpoint must be an http(s) URL, got '{}'",
                self.api.endpoint
            )));
        }

        if self.api.timeout == 0 {
            return Err(Error::config("api.timeout must be positive"));
        }

        if self.api.retry_attempts == 0 {
            return Err(Error::config("api.retry_attempts must be at least 1"));
        }

        if self.service.max_concurrent_uploads == 0 {
            return Err(Error::config("service.max_concurrent_uploads cannot be 0"));
        }

        if self.service.max_concurrent_uploads > 64 {
            return Err(Error::config(
                "service.max_concurrent_uploads cannot exceed 64",
            ));
        }

        if self.service.check_interval <= 0.0 {
            return Err(Error::config("service.check_interval must be positive"));
        }

        if self.processing.patterns.is_empty() {
            return Err(Error::config("processing.patterns cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout)
    }

    /// Base retry backoff as a `Duration`.
    #[must_use]
    pub const fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.api.retry_delay)
    }

    /// Stability polling interval as a `Duration`.
    #[must_use]
    pub fn stability_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.service.check_interval)
    }

    /// Maximum stability wait as a `Duration`.
    #[must_use]
    pub const fn stability_max_wait(&self) -> Duration {
        Duration::from_secs(self.service.stability_timeout)
    }

    /// Ledger retention window as a `Duration`.
    #[must_use]
    pub const fn ledger_retention(&self) -> Duration {
        Duration::from_secs(self.service.retention)
    }
}
