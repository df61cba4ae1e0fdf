// storefront/src/web/handlers/task_handlers.rs

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::Actor;
use actix_web::{web, HttpResponse};
use fulfillment::TaskPatch;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Responds with the stored task. Completion side effects are reported
/// alongside it but never change the status code.
#[instrument(name = "handler::update_task", skip(app_state, payload, actor), fields(actor = %actor.0.id))]
pub async fn update_task_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<TaskPatch>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let update = app_state
    .service
    .update_task(path.into_inner(), payload.into_inner(), actor.principal())
    .await?;
  if let Some(report) = &update.completion {
    if !report.failures.is_empty() {
      warn!(task_id = %update.task.id, failures = report.failures.len(), "Task saved with failed follow-up steps.");
    }
  }
  Ok(HttpResponse::Ok().json(update))
}

#[instrument(name = "handler::delete_task", skip(app_state, actor), fields(actor = %actor.0.id))]
pub async fn delete_task_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  app_state.service.delete_task(path.into_inner(), actor.principal()).await?;
  Ok(HttpResponse::NoContent().finish())
}
