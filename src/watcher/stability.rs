//! Write-completion gate.
//!
//! Filesystem create events fire before content is fully flushed, and
//! uploading a half-written file delivers a corrupt payload. A file is only
//! ready for upload once its size and mtime hold steady across two
//! consecutive polls.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// Outcome of waiting for a file to stabilize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// The file stopped changing; safe to read.
    Ready {
        /// Size observed on the final poll.
        size: u64,
    },
    /// The file never became uploadable.
    Abandoned { reason: AbandonReason },
}

/// Why a candidate was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The file was deleted or moved away before stabilizing.
    Vanished,
    /// The file kept changing past the maximum wait.
    TimedOut,
}

/// Poll size and mtime until two consecutive polls agree.
///
/// Returns `Abandoned` if the file disappears or `max_wait` elapses before
/// the file settles.
pub async fn wait_for_stable(path: &Path, poll_interval: Duration, max_wait: Duration) -> Stability {
    let deadline = tokio::time::Instant::now() + max_wait;
    let mut previous: Option<(u64, SystemTime)> = None;

    loop {
        let observed = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {
                // mtime can be unavailable on exotic filesystems; size alone
                // still gates correctly.
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                (meta.len(), mtime)
            }
            _ => {
                return Stability::Abandoned {
                    reason: AbandonReason::Vanished,
                }
            }
        };

        if previous == Some(observed) {
            return Stability::Ready { size: observed.0 };
        }
        previous = Some(observed);

        if tokio::time::Instant::now() + poll_interval > deadline {
            return Stability::Abandoned {
                reason: AbandonReason::TimedOut,
            };
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_stable_file_is_ready() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("done.xml");
        fs::write(&path, "<done/>").unwrap();

        let verdict = wait_for_stable(&path, POLL, Duration::from_secs(5)).await;
        assert_eq!(verdict, Stability::Ready { size: 7 });
    }

    #[tokio::test]
    async fn test_missing_file_is_abandoned() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ghost.xml");

        let verdict = wait_for_stable(&path, POLL, Duration::from_secs(1)).await;
        assert_eq!(
            verdict,
            Stability::Abandoned {
                reason: AbandonReason::Vanished
            }
        );
    }

    #[tokio::test]
    async fn test_chunked_write_waits_for_final_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("slow.xml");
        fs::write(&path, "<doc>").unwrap();

        // Pauses between chunks stay well under the poll interval so the
        // gate can never observe two identical sizes mid-write.
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let mut file = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .await
                    .unwrap();
                file.write_all(b"<item/>").await.unwrap();
                file.flush().await.unwrap();
            }
        });

        let verdict =
            wait_for_stable(&path, Duration::from_millis(100), Duration::from_secs(10)).await;
        writer.await.unwrap();

        let final_size = fs::metadata(&path).unwrap().len();
        assert_eq!(final_size, 33);
        assert_eq!(verdict, Stability::Ready { size: final_size });
    }

    #[tokio::test]
    async fn test_endless_writer_times_out() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("endless.xml");
        fs::write(&path, "<x>").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let Ok(mut file) = tokio::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .await
                else {
                    return;
                };
                let _ = file.write_all(b"more").await;
            }
        });

        let verdict = wait_for_stable(&path, POLL, Duration::from_millis(200)).await;
        writer.abort();

        assert_eq!(
            verdict,
            Stability::Abandoned {
                reason: AbandonReason::TimedOut
            }
        );
    }

    #[tokio::test]
    async fn test_file_deleted_mid_wait_is_abandoned() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fleeting.xml");
        fs::write(&path, "<f/>").unwrap();

        let delete_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = tokio::fs::remove_file(&delete_path).await;
        });

        // Long poll so the deletion lands between polls.
        let verdict =
            wait_for_stable(&path, Duration::from_millis(50), Duration::from_secs(5)).await;
        assert_eq!(
            verdict,
            Stability::Abandoned {
                reason: AbandonReason::Vanished
            }
        );
    }
}
