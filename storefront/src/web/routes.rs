// storefront/src/web/routes.rs

use crate::errors::AppError;
use crate::web::handlers::{health, offer_handlers, order_handlers, task_handlers};
use actix_web::{error, web, HttpRequest};

fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
  AppError::BadRequest(format!("invalid JSON body: {}", err)).into()
}

fn query_error_handler(err: error::QueryPayloadError, _req: &HttpRequest) -> error::Error {
  AppError::BadRequest(format!("invalid query string: {}", err)).into()
}

fn path_error_handler(err: error::PathError, _req: &HttpRequest) -> error::Error {
  AppError::BadRequest(format!("invalid path: {}", err)).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
    .app_data(web::QueryConfig::default().error_handler(query_error_handler))
    .app_data(web::PathConfig::default().error_handler(path_error_handler))
    .route("/health", web::get().to(health::health_check_handler))
    .service(
      web::scope("/orders")
        .route("", web::get().to(order_handlers::list_orders_handler))
        .route("", web::post().to(order_handlers::create_order_handler))
        .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
        .route("/{order_id}", web::put().to(order_handlers::update_order_handler))
        .route(
          "/{order_id}/fulfillment",
          web::post().to(order_handlers::start_fulfillment_handler),
        )
        .route("/{order_id}/tasks", web::get().to(order_handlers::order_tasks_handler))
        .route("/{order_id}/repair", web::post().to(order_handlers::repair_order_handler)),
    )
    .service(
      web::scope("/tasks")
        .route("/{task_id}", web::put().to(task_handlers::update_task_handler))
        .route("/{task_id}", web::delete().to(task_handlers::delete_task_handler)),
    )
    .service(
      web::scope("/offers")
        .route("", web::post().to(offer_handlers::create_offer_handler))
        .route("/validate", web::post().to(offer_handlers::validate_offer_handler)),
    );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::AppState;
  use crate::web::extractors::{USER_ID_HEADER, USER_ROLE_HEADER};
  use actix_web::http::StatusCode;
  use actix_web::{test, App};
  use fulfillment::{FulfillmentConfig, FulfillmentService, Stores};
  use serde_json::{json, Value};
  use sqlx::postgres::PgPoolOptions;
  use std::sync::Arc;

  // The pool is never used by these routes; the service runs on the in-memory store.
  fn state() -> AppState {
    let db_pool = PgPoolOptions::new()
      .connect_lazy("postgres://localhost/unused")
      .expect("lazy pool");
    AppState {
      db_pool,
      service: Arc::new(FulfillmentService::new(Stores::memory(), FulfillmentConfig::default())),
    }
  }

  fn checkout_body() -> Value {
    json!({
      "items": [{ "product_id": "p1", "sku": "TEE", "title": "Tee", "quantity": 2, "price": 1000 }],
      "shipping": 50,
      "customer": { "name": "Asha", "email": "asha@example.com" },
      "shipping_address": {
        "line1": "12 MG Road", "city": "Bengaluru", "state": "KA", "postal_code": "560001", "country": "IN"
      },
      "payment_method": "upi"
    })
  }

  #[actix_web::test]
  async fn checkout_then_fulfil_over_http() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(configure_app_routes)).await;

    let req = test::TestRequest::post().uri("/orders").set_json(checkout_body()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = test::read_body_json(resp).await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));

    let req = test::TestRequest::post()
      .uri(&format!("/orders/{}/fulfillment", order_id))
      .insert_header((USER_ID_HEADER, "root"))
      .insert_header((USER_ROLE_HEADER, "superuser"))
      .set_json(json!({ "assigned_to": "w1" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let start: Value = test::read_body_json(resp).await;
    let task_id = start["task"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
      .uri(&format!("/tasks/{}", task_id))
      .insert_header((USER_ID_HEADER, "w1"))
      .insert_header((USER_ROLE_HEADER, "worker"))
      .set_json(json!({ "status": "completed" }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let update: Value = test::read_body_json(resp).await;
    assert_eq!(update["task"]["status"], "completed");
    assert_eq!(update["completion"]["created_task"]["type"], "quality_check");

    let req = test::TestRequest::get()
      .uri("/orders")
      .insert_header((USER_ID_HEADER, "w1"))
      .insert_header((USER_ROLE_HEADER, "worker"))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Cache").unwrap(), "MISS");
    let listing: Value = test::read_body_json(resp).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["orders"][0]["status"], "processing");
  }

  #[actix_web::test]
  async fn back_office_routes_need_an_identity() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "authentication_required");
  }

  #[actix_web::test]
  async fn rejected_offer_is_unprocessable() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(configure_app_routes)).await;
    let now = chrono::Utc::now();
    let req = test::TestRequest::post()
      .uri("/offers")
      .insert_header((USER_ID_HEADER, "root"))
      .insert_header((USER_ROLE_HEADER, "superuser"))
      .set_json(json!({
        "code": "BIG",
        "discount_type": "fixed",
        "discount_value": 300,
        "min_order_amount": 1000,
        "valid_from": now - chrono::Duration::days(1),
        "valid_until": now + chrono::Duration::days(1)
      }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
      .uri("/offers/validate")
      .set_json(json!({ "offer_code": "big", "subtotal": 500 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["valid"], false);
    assert!(body["reason"].as_str().unwrap().contains("minimum order amount"));

    let req = test::TestRequest::post()
      .uri("/offers/validate")
      .set_json(json!({ "offer_code": "BIG", "subtotal": 1500 }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["discount"], 300.0);
  }

  #[actix_web::test]
  async fn malformed_json_is_a_bad_request() {
    let app = test::init_service(App::new().app_data(web::Data::new(state())).configure(configure_app_routes)).await;
    let req = test::TestRequest::post()
      .uri("/offers/validate")
      .insert_header(("content-type", "application/json"))
      .set_payload("{not json")
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }
}
