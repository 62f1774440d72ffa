//! Courier Library
//!
//! Watches a directory tree for newly created XML files and delivers each one
//! to a remote HTTP endpoint with bounded concurrency, retries, and
//! configurable post-processing.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod upload;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
