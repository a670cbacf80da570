//! Injectable progress/logging capability.
//!
//! Replaces ad-hoc `print`/`eprintln` calls with a trait the batch driver and
//! signal extractors call into. Production code forwards to `tracing`;
//! tests substitute [`RecordingReporter`] to assert on what was emitted.

use std::sync::Mutex;

/// Capability for reporting progress, degraded signals, and per-image
/// verbosity out of the classification pipeline.
pub trait Reporter: Send + Sync {
    /// One-line progress update (e.g. "processing 12/50").
    fn progress(&self, message: &str);

    /// A signal degraded to neutral, or some other recoverable problem.
    fn warn(&self, message: &str);

    /// Per-image classification detail, shown only under verbose logging.
    fn verbose(&self, message: &str);

    /// End-of-batch summary line.
    fn summary(&self, message: &str);
}

/// Forwards all calls to `tracing`, matching the severity conventions used
/// elsewhere in the codebase: `info!` for lifecycle events, `warn!` for
/// degraded-but-recovered conditions, `debug!` for verbose detail.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn progress(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn verbose(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn summary(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// In-memory reporter for tests: captures every call in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    progress: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    verbose: Mutex<Vec<String>>,
    summaries: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress_calls(&self) -> Vec<String> {
        self.progress.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn verbose_calls(&self) -> Vec<String> {
        self.verbose.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<String> {
        self.summaries.lock().unwrap().clone()
    }
}

impl Reporter for RecordingReporter {
    fn progress(&self, message: &str) {
        self.progress.lock().unwrap().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn verbose(&self, message: &str) {
        self.verbose.lock().unwrap().push(message.to_string());
    }

    fn summary(&self, message: &str) {
        self.summaries.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_reporter_captures_each_channel_independently() {
        let reporter = RecordingReporter::new();
        reporter.progress("loading");
        reporter.warn("model missing");
        reporter.verbose("a.jpg -> safe");
        reporter.summary("10 images, 2 nsfw");

        assert_eq!(reporter.progress_calls(), vec!["loading"]);
        assert_eq!(reporter.warnings(), vec!["model missing"]);
        assert_eq!(reporter.verbose_calls(), vec!["a.jpg -> safe"]);
        assert_eq!(reporter.summaries(), vec!["10 images, 2 nsfw"]);
    }
}
