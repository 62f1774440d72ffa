//! File system watching and upload admission.
//!
//! This module provides:
//! - Debounced directory watching using notify-rs
//! - Glob-based candidate matching
//! - Write-completion gating before a file is considered uploadable
//! - The job ledger that deduplicates concurrent work per path

mod events;
mod ledger;
mod scanner;
mod source;
mod stability;
mod stats;

pub use events::{FileMatcher, WatchEvent};
pub use ledger::{JobLedger, JobState};
pub use scanner::{scan_existing, scan_existing_async, ScanStatsSnapshot};
pub use source::{FileEventSource, SourceMessage};
pub use stability::{wait_for_stable, AbandonReason, Stability};
pub use stats::{PipelineStats, StatsSnapshot};
