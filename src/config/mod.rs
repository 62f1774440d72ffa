//! Configuration management for Courier.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - YAML configuration file (lowest priority)

mod settings;

pub use settings::{ApiConfig, AuthConfig, Config, LoggingConfig, ProcessingConfig, ServiceConfig};
