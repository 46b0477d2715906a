//! Progress reporting hooks.

use crate::plugin::Phase;
use tracing::{debug, info};

/// Receives progress notifications. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn phase_started(&self, _phase: Phase) {}

    /// Number of files the analysis phase will process.
    fn files_planned(&self, _total: usize) {}

    fn file_done(&self, _file: &str) {}

    fn phase_finished(&self, _phase: Phase) {}
}

/// Ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Logs notifications through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn phase_started(&self, phase: Phase) {
        info!("Phase {} started", phase);
    }

    fn files_planned(&self, total: usize) {
        info!("Analyzing {} files", total);
    }

    fn file_done(&self, file: &str) {
        debug!("Processed {}", file);
    }

    fn phase_finished(&self, phase: Phase) {
        debug!("Phase {} finished", phase);
    }
}
