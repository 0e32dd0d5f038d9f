use crate::crawler::RunOutcome;
use crate::output::traits::{Category, ProgressSink, Severity};

/// Progress sink that forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn progress(&self, category: Category, count: u64) {
        tracing::debug!(category = category.as_str(), count, "progress");
    }

    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warn => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }

    fn finished(&self, outcome: &RunOutcome) {
        if outcome.success {
            tracing::info!("Run finished: {}", outcome.message);
        } else {
            tracing::error!("Run failed: {}", outcome.message);
        }
    }
}
