// fulfillment/src/pipeline/control.rs

/// Returned by a handler to continue with the next step or halt the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  Completed,
  Stopped,
}

/// A handler failure that was swallowed because its step is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
  pub step: String,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
  pub result: PipelineResult,
  pub failures: Vec<StepFailure>,
}
