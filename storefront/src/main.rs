// storefront/src/main.rs

mod config;
mod db;
mod errors;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::db::PgStore;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use fulfillment::{FulfillmentConfig, FulfillmentService, Stores};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Pretty => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env()?;
  init_tracing(app_config.log_format);
  tracing::info!("Starting storefront fulfillment server...");

  let db_pool = db::connect(&app_config).await.map_err(|e| {
    tracing::error!(error = %e, "Failed to prepare the database.");
    e
  })?;

  let service = FulfillmentService::new(
    Stores::from_shared(Arc::new(PgStore::new(db_pool.clone()))),
    FulfillmentConfig {
      cache_ttl: app_config.order_cache_ttl,
      ..Default::default()
    },
  );
  tracing::info!(
    steps = service.engine().definition().steps().len(),
    "Fulfillment workflow loaded."
  );

  let app_state = AppState {
    db_pool,
    service: Arc::new(service),
  };

  let server_address = app_config.server_address();
  tracing::info!("Binding server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;
  Ok(())
}
