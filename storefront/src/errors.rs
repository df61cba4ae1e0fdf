// storefront/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use fulfillment::FulfillmentError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Fulfillment(#[from] FulfillmentError),

  /// Missing or malformed caller identity headers.
  #[error("Authentication required: {0}")]
  Auth(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
  pub fn code(&self) -> &'static str {
    match self {
      AppError::Fulfillment(e) => e.code(),
      AppError::Auth(_) => "authentication_required",
      AppError::BadRequest(_) => "validation_error",
      AppError::Config(_) => "configuration_error",
      AppError::Sqlx(_) | AppError::Migration(_) => "database_error",
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Fulfillment(e) => match e {
        FulfillmentError::Validation(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::Authorization(_) => StatusCode::FORBIDDEN,
        FulfillmentError::NotFound(_) => StatusCode::NOT_FOUND,
        FulfillmentError::Conflict(_) => StatusCode::CONFLICT,
        FulfillmentError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        FulfillmentError::WorkflowSideEffect { .. }
        | FulfillmentError::Pipeline { .. }
        | FulfillmentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, code = self.code(), "Responding with error");
    } else {
      tracing::debug!(application_error = %self, code = self.code(), "Responding with error");
    }
    // Server-side details stay in the log.
    let message = match self {
      AppError::Fulfillment(FulfillmentError::Internal(_))
      | AppError::Fulfillment(FulfillmentError::Pipeline { .. })
      | AppError::Sqlx(_)
      | AppError::Migration(_)
      | AppError::Config(_) => "An internal error occurred".to_string(),
      AppError::Fulfillment(FulfillmentError::StoreUnavailable { .. }) => "Service temporarily unavailable".to_string(),
      other => other.to_string(),
    };
    HttpResponse::build(status).json(json!({ "error": message, "code": self.code() }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
