//! Startup scan for files already present in the watch folder.
//!
//! Walks the watch root and queues matching files as synthetic events,
//! oldest modification time first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::mpsc;
use walkdir::WalkDir;

use super::events::{FileMatcher, WatchEvent};
use crate::error::WatcherError;
use crate::Result;

/// Scan statistics.
#[derive(Debug, Default)]
pub struct ScanStats {
    pub files_found: AtomicU64,
    pub files_queued: AtomicU64,
    pub files_skipped: AtomicU64,
    pub errors: AtomicU64,
}

impl ScanStats {
    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            files_found: self.files_found.load(Ordering::Relaxed),
            files_queued: self.files_queued.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan stats.
#[derive(Debug, Clone, Copy)]
pub struct ScanStatsSnapshot {
    pub files_found: u64,
    pub files_queued: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

/// Scan a directory and queue matching files as watch events.
///
/// Files are queued ordered by modification time, oldest first. The ordering
/// is best-effort; files whose metadata cannot be read sort last.
///
/// # Errors
///
/// Returns an error if the scan root cannot be walked at all. Per-entry
/// errors are counted and logged, not fatal.
pub fn scan_existing(
    root: &Path,
    recursive: bool,
    matcher: &FileMatcher,
    event_tx: &mpsc::Sender<WatchEvent>,
) -> Result<ScanStatsSnapshot> {
    let stats = ScanStats::default();

    tracing::info!(path = %root.display(), "Scanning for existing files");

    if !root.is_dir() {
        return Err(WatcherError::ScanFailed {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let mut walker = WalkDir::new(root);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut matched: Vec<(PathBuf, SystemTime)> = Vec::new();

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if !entry.file_type().is_file() {
                    continue;
                }

                stats.files_found.fetch_add(1, Ordering::Relaxed);

                if !matcher.matches(path) {
                    stats.files_skipped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let mtime = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                matched.push((path.to_path_buf(), mtime));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking watch folder");
                stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    matched.sort_by_key(|(_, mtime)| *mtime);

    for (path, _) in matched {
        if event_tx.blocking_send(WatchEvent::new(path)).is_err() {
            tracing::warn!("Event channel closed during scan");
            break;
        }
        stats.files_queued.fetch_add(1, Ordering::Relaxed);
    }

    let snapshot = stats.snapshot();
    tracing::info!(
        path = %root.display(),
        found = snapshot.files_found,
        queued = snapshot.files_queued,
        skipped = snapshot.files_skipped,
        errors = snapshot.errors,
        "Scan complete"
    );

    Ok(snapshot)
}

/// Async version of the startup scan.
///
/// # Errors
///
/// Returns an error if the scan fails or the blocking task panics.
pub async fn scan_existing_async(
    root: PathBuf,
    recursive: bool,
    matcher: FileMatcher,
    event_tx: mpsc::Sender<WatchEvent>,
) -> Result<ScanStatsSnapshot> {
    tokio::task::spawn_blocking(move || scan_existing(&root, recursive, &matcher, &event_tx))
        .await
        .map_err(|e| crate::Error::internal(format!("scan task failed: {e}")))?
}
