// storefront/src/db/mod.rs

//! PostgreSQL implementations of the fulfillment store traits.

mod offers;
mod orders;
mod tasks;

use crate::config::AppConfig;
use crate::errors::Result;
use fulfillment::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// One pool-backed store implementing every store trait.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

pub async fn connect(config: &AppConfig) -> Result<PgPool> {
  let pool = PgPoolOptions::new()
    .max_connections(config.database_max_connections)
    .connect(&config.database_url)
    .await?;
  info!(max_connections = config.database_max_connections, "Connected to the database.");

  if config.run_migrations {
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied.");
  }
  Ok(pool)
}

/// Maps driver errors onto the store taxonomy: unique violations become
/// conflicts, connectivity problems become `Unavailable`.
pub(crate) fn store_error(entity: &'static str, err: sqlx::Error) -> StoreError {
  if let sqlx::Error::Database(db) = &err {
    if db.is_unique_violation() {
      return StoreError::Conflict {
        entity,
        message: db.message().to_string(),
      };
    }
  }
  match err {
    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
      StoreError::Unavailable { source: err.into() }
    }
    other => StoreError::Backend { source: other.into() },
  }
}
