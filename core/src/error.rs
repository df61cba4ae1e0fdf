// fulfillment/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Errors raised by the pipeline runner itself (as opposed to its handlers).
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for required step: {step_name}")]
  HandlerMissing { step_name: String },
}

/// Failures reported by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{entity} not found: {key}")]
  NotFound { entity: &'static str, key: String },

  #[error("Conflict on {entity}: {message}")]
  Conflict { entity: &'static str, message: String },

  #[error("Store unavailable. Source: {source}")]
  Unavailable {
    #[source]
    source: AnyhowError,
  },

  #[error("Store backend error. Source: {source}")]
  Backend {
    #[source]
    source: AnyhowError,
  },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The error taxonomy surfaced to callers of the fulfillment core.
#[derive(Debug, Error)]
pub enum FulfillmentError {
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Not authorized: {0}")]
  Authorization(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Store unavailable: {source}")]
  StoreUnavailable {
    #[source]
    source: AnyhowError,
  },

  /// Only ever produced inside the workflow engine; it is recorded on the
  /// side-effect sink and never returned from a public entry point.
  #[error("Workflow side effect '{step}' failed: {message}")]
  WorkflowSideEffect { step: String, message: String },

  #[error("Pipeline error: {source}")]
  Pipeline {
    #[from]
    source: PipelineError,
  },

  #[error("Internal error: {0}")]
  Internal(String),
}

impl FulfillmentError {
  /// Stable snake_case code used in HTTP error bodies.
  pub fn code(&self) -> &'static str {
    match self {
      FulfillmentError::Validation(_) => "validation_error",
      FulfillmentError::Authorization(_) => "authorization_error",
      FulfillmentError::NotFound(_) => "not_found",
      FulfillmentError::Conflict(_) => "conflict",
      FulfillmentError::StoreUnavailable { .. } => "store_unavailable",
      FulfillmentError::WorkflowSideEffect { .. } => "workflow_side_effect",
      FulfillmentError::Pipeline { .. } => "pipeline_error",
      FulfillmentError::Internal(_) => "internal_error",
    }
  }
}

impl From<StoreError> for FulfillmentError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::NotFound { entity, key } => FulfillmentError::NotFound(format!("{} '{}'", entity, key)),
      StoreError::Conflict { entity, message } => FulfillmentError::Conflict(format!("{}: {}", entity, message)),
      StoreError::Unavailable { source } => FulfillmentError::StoreUnavailable { source },
      StoreError::Backend { source } => FulfillmentError::Internal(format!("{:#}", source)),
    }
  }
}

impl From<AnyhowError> for FulfillmentError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<StoreError>() {
      Ok(store_err) => store_err.into(),
      Err(other) => FulfillmentError::Internal(format!("{:#}", other)),
    }
  }
}

pub type FulfillmentResult<T, E = FulfillmentError> = std::result::Result<T, E>;
