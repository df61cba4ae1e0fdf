// storefront/src/state.rs
use fulfillment::FulfillmentService;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub db_pool: PgPool,
  pub service: Arc<FulfillmentService>,
}
