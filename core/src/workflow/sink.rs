// fulfillment/src/workflow/sink.rs

//! Where swallowed workflow failures go. Nothing the engine recovers from is
//! dropped silently; operators watch this sink to find stuck orders.

use crate::error::FulfillmentError;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectFailure {
  pub order_id: Uuid,
  pub task_id: Option<Uuid>,
  pub step: String,
  pub error: String,
}

impl SideEffectFailure {
  pub fn to_error(&self) -> FulfillmentError {
    FulfillmentError::WorkflowSideEffect {
      step: self.step.clone(),
      message: self.error.clone(),
    }
  }
}

pub trait SideEffectSink: Send + Sync {
  fn record(&self, failure: SideEffectFailure);
}

/// Emits one structured `warn` event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl SideEffectSink for TracingSink {
  fn record(&self, failure: SideEffectFailure) {
    tracing::warn!(
      target: "fulfillment::side_effects",
      order_id = %failure.order_id,
      task_id = ?failure.task_id,
      step = %failure.step,
      error = %failure.to_error(),
      "Workflow side effect failed; order may need repair."
    );
  }
}

/// Keeps failures in memory and forwards them to the tracing sink.
#[derive(Debug, Default)]
pub struct RecordingSink {
  failures: Mutex<Vec<SideEffectFailure>>,
}

impl RecordingSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn failures(&self) -> Vec<SideEffectFailure> {
    self.failures.lock().clone()
  }

  pub fn clear(&self) {
    self.failures.lock().clear();
  }
}

impl SideEffectSink for RecordingSink {
  fn record(&self, failure: SideEffectFailure) {
    TracingSink.record(failure.clone());
    self.failures.lock().push(failure);
  }
}
