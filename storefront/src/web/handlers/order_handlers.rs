// storefront/src/web/handlers/order_handlers.rs

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::Actor;
use actix_web::{web, HttpResponse};
use fulfillment::{NewOrder, OrderFilter, OrderPatch, TaskPriority};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

pub const CACHE_HEADER: &str = "X-Cache";

#[derive(Deserialize, Debug)]
pub struct StartFulfillmentPayload {
  pub assigned_to: String,
  #[serde(default)]
  pub priority: TaskPriority,
}

/// Checkout. Open to the storefront, so no identity is required.
#[instrument(name = "handler::create_order", skip(app_state, payload))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.service.create_order(payload.into_inner()).await?;
  info!(order_number = %order.order_number, total = %order.total, "Order placed.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::list_orders", skip(app_state, actor), fields(actor = %actor.0.id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderFilter>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let listing = app_state.service.list_orders(query.into_inner(), actor.principal()).await?;
  Ok(
    HttpResponse::Ok()
      .insert_header((CACHE_HEADER, listing.cache.as_str()))
      .json(listing),
  )
}

#[instrument(name = "handler::get_order", skip(app_state, actor), fields(actor = %actor.0.id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let order = app_state.service.get_order(path.into_inner(), actor.principal()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::update_order", skip(app_state, payload, actor), fields(actor = %actor.0.id))]
pub async fn update_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<OrderPatch>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .service
    .update_order(path.into_inner(), payload.into_inner(), actor.principal())
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(
  name = "handler::start_fulfillment",
  skip(app_state, payload, actor),
  fields(actor = %actor.0.id, assignee = %payload.assigned_to)
)]
pub async fn start_fulfillment_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<StartFulfillmentPayload>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let start = app_state
    .service
    .start_fulfillment(path.into_inner(), &payload.assigned_to, payload.priority, actor.principal())
    .await?;
  Ok(HttpResponse::Created().json(start))
}

#[instrument(name = "handler::order_tasks", skip(app_state, actor), fields(actor = %actor.0.id))]
pub async fn order_tasks_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let tasks = app_state.service.tasks_for_order(path.into_inner(), actor.principal()).await?;
  Ok(HttpResponse::Ok().json(json!({ "tasks": tasks })))
}

#[instrument(name = "handler::repair_order", skip(app_state, actor), fields(actor = %actor.0.id))]
pub async fn repair_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let report = app_state.service.repair_order(path.into_inner(), actor.principal()).await?;
  info!(
    order_id = %report.order_id,
    created = report.created_tasks.len(),
    failures = report.failures.len(),
    "Order repair finished."
  );
  Ok(HttpResponse::Ok().json(report))
}
