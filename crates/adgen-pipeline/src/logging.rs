//! Structured run logging.
//!
//! Every lifecycle message of a pipeline run carries the run ID and the
//! current step so a single ad can be followed through the logs.

use adgen_models::RunId;
use tracing::{error, info, warn, Span};

/// Logger bound to one pipeline run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    step: String,
}

impl RunLogger {
    pub fn new(run_id: &RunId, step: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            step: step.to_string(),
        }
    }

    /// Same run, different step.
    pub fn step(&self, step: &str) -> Self {
        Self {
            run_id: self.run_id.clone(),
            step: step.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, step = %self.step, "Run started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_id = %self.run_id, step = %self.step, "Run progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, step = %self.step, "Run degraded: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, step = %self.step, "Run failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, step = %self.step, "Run completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn current_step(&self) -> &str {
        &self.step
    }

    /// Span wrapping the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id)
    }
}
