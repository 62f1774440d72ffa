//! Watch event types and file name matching.

use std::path::{Path, PathBuf};
use std::time::Instant;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::WatcherError;
use crate::Result;

/// A file detected in the watch set.
///
/// Ephemeral: events are never persisted and may legitimately be emitted
/// more than once for the same path.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Absolute path of the detected file.
    pub path: PathBuf,
    /// When the event was observed.
    pub detected_at: Instant,
}

impl WatchEvent {
    /// Create an event for a path observed now.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            detected_at: Instant::now(),
        }
    }
}

/// Matches file names against the configured glob patterns.
///
/// Patterns apply to the file name only, never the directory part, so
/// `*.xml` matches at any depth of the watch tree.
#[derive(Debug, Clone)]
pub struct FileMatcher {
    set: GlobSet,
}

impl FileMatcher {
    /// Build a matcher from glob patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is not a valid glob.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| WatcherError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }

        let set = builder.build().map_err(|e| WatcherError::InvalidPattern {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self { set })
    }

    /// Check whether a path's file name matches any pattern.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| self.set.is_match(name))
    }
}
