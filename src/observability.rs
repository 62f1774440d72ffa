//! Structured logging configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels via config or `RUST_LOG`

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Initialize tracing with the given configuration.
///
/// Sets up the tracing subscriber with the configured log level and either
/// plain text or JSON output. `RUST_LOG` takes precedence over `level` when
/// set.
///
/// # Panics
///
/// Panics if a tracing subscriber has already been initialized in this
/// process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Span helpers for the upload pipeline.
pub mod spans {
    use std::path::Path;

    use tracing::{info_span, Span};

    /// Create a span covering one upload attempt.
    #[must_use]
    pub fn upload_span(path: &Path, attempt: u32) -> Span {
        info_span!(
            "upload",
            path = %path.display(),
            attempt,
        )
    }

    /// Create a span covering post-processing of an uploaded file.
    #[must_use]
    pub fn post_process_span(path: &Path) -> Span {
        info_span!(
            "post_process",
            path = %path.display(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_upload_span_creation() {
        let span = spans::upload_span(Path::new("/tmp/inbox/a.xml"), 1);
        let _guard = span.enter();
    }

    #[test]
    fn test_post_process_span_creation() {
        let span = spans::post_process_span(Path::new("/tmp/inbox/a.xml"));
        let _guard = span.enter();
    }
}
