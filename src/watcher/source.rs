//! File system event source using notify-rs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;

use super::events::{FileMatcher, WatchEvent};
use crate::error::WatcherError;
use crate::Result;

/// Debounce duration for file events.
const DEBOUNCE_DURATION: Duration = Duration::from_millis(500);

/// Messages emitted by the event source.
#[derive(Debug)]
pub enum SourceMessage {
    /// A matching file was created, modified, or renamed into the watch set.
    Candidate(WatchEvent),
    /// The watch root disappeared. Monitoring cannot continue.
    RootLost(PathBuf),
}

/// Debounced file system event source.
///
/// Emits a candidate for every matching file that changes under the watch
/// root. Rapid repeated notifications for the same path are coalesced by the
/// debouncer; remaining duplicates are legal and handled by the ledger
/// downstream.
pub struct FileEventSource {
    _debouncer: Debouncer<RecommendedWatcher>,
    event_rx: mpsc::Receiver<SourceMessage>,
    root: PathBuf,
}

impl FileEventSource {
    /// Start watching `root` for files matching `matcher`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or the watcher cannot be
    /// created.
    pub fn new(root: impl AsRef<Path>, recursive: bool, matcher: FileMatcher) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let (event_tx, event_rx) = mpsc::channel(256);
        let callback_root = root.clone();

        let mut debouncer = new_debouncer(
            DEBOUNCE_DURATION,
            move |result: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| {
                match result {
                    Ok(events) => {
                        // inotify reports deletion of the watch root itself
                        // as ordinary events, not as a watch error.
                        if !callback_root.is_dir() {
                            let _ = event_tx
                                .blocking_send(SourceMessage::RootLost(callback_root.clone()));
                            return;
                        }
                        for event in events {
                            if !matches!(event.kind, DebouncedEventKind::Any) {
                                continue;
                            }
                            // Directories and paths deleted since the event
                            // fired are not candidates.
                            if !event.path.is_file() || !matcher.matches(&event.path) {
                                continue;
                            }
                            tracing::debug!(path = %event.path.display(), "Detected candidate file");
                            let _ = event_tx
                                .blocking_send(SourceMessage::Candidate(WatchEvent::new(event.path)));
                        }
                    }
                    Err(e) => {
                        if callback_root.is_dir() {
                            // Transient; monitoring continues.
                            tracing::error!(error = ?e, "Watch error");
                        } else {
                            let _ = event_tx
                                .blocking_send(SourceMessage::RootLost(callback_root.clone()));
                        }
                    }
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        debouncer
            .watcher()
            .watch(&root, mode)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %root.display(), recursive, "Watching directory");

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
            root,
        })
    }

    /// Receive the next message.
    ///
    /// Returns `None` if the source has been dropped.
    pub async fn recv(&mut self) -> Option<SourceMessage> {
        self.event_rx.recv().await
    }

    /// The watched root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
