//! Upload protocol, retry policy, worker pool, and post-processing.

mod client;
mod pool;
mod post;
mod retry;

pub use client::{ApiClient, UploadResponse};
pub use pool::{UploadJob, UploadWorkerPool};
pub use post::PostProcess;
pub use retry::{RetryDecision, RetryPolicy};
