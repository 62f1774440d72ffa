//! In-memory job ledger.
//!
//! The one shared-mutable structure in the pipeline. Admission must be
//! atomic with the lookup: a double-admit means a duplicate upload side
//! effect that cannot be undone, so every transition happens under a single
//! mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Job lifecycle states tracked per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Admitted and queued, no worker has picked it up yet.
    Pending,
    /// A worker is attempting (or retrying) the upload.
    InFlight,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
}

impl JobState {
    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug)]
struct LedgerEntry {
    state: JobState,
    finished_at: Option<Instant>,
}

impl LedgerEntry {
    fn expired(&self, retention: Duration) -> bool {
        self.finished_at
            .is_some_and(|at| at.elapsed() >= retention)
    }
}

/// Tracks in-flight and recently finished jobs, one entry per path.
///
/// Invariant: at most one non-terminal job per distinct path. Terminal
/// entries are retained for `retention` to absorb duplicate events from the
/// same write burst, then evicted; a fresh event for an evicted path starts
/// a new, independent job.
#[derive(Debug)]
pub struct JobLedger {
    entries: Mutex<HashMap<PathBuf, LedgerEntry>>,
    retention: Duration,
}

impl JobLedger {
    /// Create a ledger with the given terminal-entry retention window.
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Try to admit a path for upload.
    ///
    /// Denied while a job for the path is `Pending` or `InFlight`, and while
    /// a terminal entry is younger than the retention window. Expired
    /// terminal entries are replaced by the new admission.
    pub fn try_admit(&self, path: &Path) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.expired(self.retention));

        if entries.contains_key(path) {
            return false;
        }

        entries.insert(
            path.to_path_buf(),
            LedgerEntry {
                state: JobState::Pending,
                finished_at: None,
            },
        );
        true
    }

    /// Mark an admitted path as actively being uploaded.
    pub fn mark_in_flight(&self, path: &Path) {
        if let Some(entry) = self.entries.lock().get_mut(path) {
            entry.state = JobState::InFlight;
        }
    }

    /// Record the terminal outcome for a path.
    ///
    /// The entry stays in the ledger for the retention window, then is
    /// evicted lazily.
    pub fn mark_result(&self, path: &Path, outcome: JobState) {
        debug_assert!(outcome.is_terminal());
        if let Some(entry) = self.entries.lock().get_mut(path) {
            entry.state = outcome;
            entry.finished_at = Some(Instant::now());
        }
    }

    /// Remove a path's entry outright, undoing an admission whose job never
    /// reached the upload queue.
    pub fn release(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    /// Current state for a path, if tracked.
    #[must_use]
    pub fn state(&self, path: &Path) -> Option<JobState> {
        self.entries.lock().get(path).map(|entry| entry.state)
    }

    /// Number of non-terminal jobs.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.state.is_terminal())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const RETENTION: Duration = Duration::from_secs(60);

    #[test]
    fn test_admit_once() {
        let ledger = JobLedger::new(RETENTION);
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        assert!(!ledger.try_admit(path));
        assert_eq!(ledger.state(path), Some(JobState::Pending));
    }

    #[test]
    fn test_denied_while_in_flight() {
        let ledger = JobLedger::new(RETENTION);
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        ledger.mark_in_flight(path);
        assert!(!ledger.try_admit(path));
        assert_eq!(ledger.state(path), Some(JobState::InFlight));
        assert_eq!(ledger.active_count(), 1);
    }

    #[test]
    fn test_denied_within_retention_after_completion() {
        let ledger = JobLedger::new(RETENTION);
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        ledger.mark_in_flight(path);
        ledger.mark_result(path, JobState::Completed);

        assert!(!ledger.try_admit(path));
        assert_eq!(ledger.state(path), Some(JobState::Completed));
        assert_eq!(ledger.active_count(), 0);
    }

    #[test]
    fn test_readmitted_after_retention_expires() {
        let ledger = JobLedger::new(Duration::from_millis(20));
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        ledger.mark_result(path, JobState::Failed);
        assert!(!ledger.try_admit(path));

        std::thread::sleep(Duration::from_millis(40));
        assert!(ledger.try_admit(path));
        assert_eq!(ledger.state(path), Some(JobState::Pending));
    }

    #[test]
    fn test_zero_retention_allows_immediate_readmission() {
        let ledger = JobLedger::new(Duration::ZERO);
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        ledger.mark_result(path, JobState::Completed);
        assert!(ledger.try_admit(path));
    }

    #[test]
    fn test_release_undoes_admission() {
        let ledger = JobLedger::new(RETENTION);
        let path = Path::new("/inbox/a.xml");

        assert!(ledger.try_admit(path));
        ledger.release(path);

        // No stuck Pending entry; the path can be admitted again.
        assert_eq!(ledger.state(path), None);
        assert_eq!(ledger.active_count(), 0);
        assert!(ledger.try_admit(path));
    }

    #[test]
    fn test_distinct_paths_are_independent() {
        let ledger = JobLedger::new(RETENTION);
        assert!(ledger.try_admit(Path::new("/inbox/a.xml")));
        assert!(ledger.try_admit(Path::new("/inbox/b.xml")));
        assert_eq!(ledger.active_count(), 2);
    }

    #[test]
    fn test_at_most_one_admission_under_contention() {
        let ledger = Arc::new(JobLedger::new(RETENTION));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if ledger.try_admit(Path::new("/inbox/contended.xml")) {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mark_result_for_untracked_path_is_noop() {
        let ledger = JobLedger::new(RETENTION);
        ledger.mark_result(Path::new("/inbox/nobody.xml"), JobState::Failed);
        assert_eq!(ledger.state(Path::new("/inbox/nobody.xml")), None);
    }
}
