// storefront/src/db/offers.rs

use super::{store_error, PgStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::model::{DiscountType, Offer, OfferDraft};
use fulfillment::{OfferConsumption, OfferStore, RedemptionLedger, StoreError, StoreResult};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

const OFFER_COLUMNS: &str = "id, code, discount_type, discount_value, min_order_amount, max_discount, valid_from, \
   valid_until, is_active, usage_limit, used_count, one_time_per_user, customer_emails, customer_ids, created_at";

#[derive(sqlx::FromRow)]
struct OfferRow {
  id: Uuid,
  code: String,
  discount_type: DiscountType,
  discount_value: Decimal,
  min_order_amount: Option<Decimal>,
  max_discount: Option<Decimal>,
  valid_from: DateTime<Utc>,
  valid_until: DateTime<Utc>,
  is_active: bool,
  usage_limit: Option<i64>,
  used_count: i64,
  one_time_per_user: bool,
  customer_emails: Vec<String>,
  customer_ids: Vec<String>,
  created_at: DateTime<Utc>,
}

impl From<OfferRow> for Offer {
  fn from(row: OfferRow) -> Self {
    Offer {
      id: row.id,
      code: row.code,
      discount_type: row.discount_type,
      discount_value: row.discount_value,
      min_order_amount: row.min_order_amount,
      max_discount: row.max_discount,
      valid_from: row.valid_from,
      valid_until: row.valid_until,
      is_active: row.is_active,
      usage_limit: row.usage_limit,
      used_count: row.used_count,
      one_time_per_user: row.one_time_per_user,
      customer_emails: row.customer_emails,
      customer_ids: row.customer_ids,
      created_at: row.created_at,
    }
  }
}

#[async_trait]
impl OfferStore for PgStore {
  #[instrument(name = "PgStore::insert_offer", skip(self, draft), fields(code = %draft.code), err(Display))]
  async fn insert(&self, draft: OfferDraft) -> StoreResult<Offer> {
    let offer = draft.into_offer(Uuid::new_v4());
    sqlx::query(
      "INSERT INTO offers (id, code, discount_type, discount_value, min_order_amount, max_discount, valid_from,
         valid_until, is_active, usage_limit, used_count, one_time_per_user, customer_emails, customer_ids, created_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(offer.id)
    .bind(&offer.code)
    .bind(offer.discount_type)
    .bind(offer.discount_value)
    .bind(offer.min_order_amount)
    .bind(offer.max_discount)
    .bind(offer.valid_from)
    .bind(offer.valid_until)
    .bind(offer.is_active)
    .bind(offer.usage_limit)
    .bind(offer.used_count)
    .bind(offer.one_time_per_user)
    .bind(&offer.customer_emails)
    .bind(&offer.customer_ids)
    .bind(offer.created_at)
    .execute(&self.pool)
    .await
    .map_err(|e| store_error("offer", e))?;
    Ok(offer)
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Offer>> {
    let row = sqlx::query_as::<_, OfferRow>(&format!("SELECT {} FROM offers WHERE id = $1", OFFER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(|e| store_error("offer", e))?;
    Ok(row.map(Offer::from))
  }

  async fn get_by_code(&self, code: &str) -> StoreResult<Option<Offer>> {
    let row = sqlx::query_as::<_, OfferRow>(&format!(
      "SELECT {} FROM offers WHERE LOWER(code) = LOWER($1)",
      OFFER_COLUMNS
    ))
    .bind(code.trim())
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| store_error("offer", e))?;
    Ok(row.map(Offer::from))
  }

  /// Ledger row and counter bump commit together or not at all.
  #[instrument(name = "PgStore::consume_offer", skip(self, customer_key), err(Display))]
  async fn consume(
    &self,
    id: Uuid,
    customer_key: Option<&str>,
    order_id: Option<Uuid>,
  ) -> StoreResult<OfferConsumption> {
    let mut tx = self.pool.begin().await.map_err(|e| store_error("offer", e))?;

    if let Some(key) = customer_key {
      let recorded = sqlx::query(
        "INSERT INTO offer_redemptions (offer_id, customer_key, order_id) VALUES ($1, $2, $3)
         ON CONFLICT (offer_id, customer_key) DO NOTHING",
      )
      .bind(id)
      .bind(key)
      .bind(order_id)
      .execute(&mut *tx)
      .await
      .map_err(|e| store_error("offer_redemption", e))?;
      if recorded.rows_affected() == 0 {
        tx.rollback().await.map_err(|e| store_error("offer", e))?;
        return Ok(OfferConsumption::AlreadyRedeemed);
      }
    }

    let bumped = sqlx::query(
      "UPDATE offers SET used_count = used_count + 1
       WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| store_error("offer", e))?;
    if bumped.rows_affected() == 1 {
      tx.commit().await.map_err(|e| store_error("offer", e))?;
      return Ok(OfferConsumption::Consumed);
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM offers WHERE id = $1)")
      .bind(id)
      .fetch_one(&mut *tx)
      .await
      .map_err(|e| store_error("offer", e))?;
    tx.rollback().await.map_err(|e| store_error("offer", e))?;
    if exists {
      Ok(OfferConsumption::LimitReached)
    } else {
      Err(StoreError::NotFound {
        entity: "offer",
        key: id.to_string(),
      })
    }
  }
}

#[async_trait]
impl RedemptionLedger for PgStore {
  async fn has_redeemed(&self, offer_id: Uuid, customer_key: &str) -> StoreResult<bool> {
    sqlx::query_scalar::<_, bool>(
      "SELECT EXISTS (SELECT 1 FROM offer_redemptions WHERE offer_id = $1 AND customer_key = $2)",
    )
    .bind(offer_id)
    .bind(customer_key)
    .fetch_one(&self.pool)
    .await
    .map_err(|e| store_error("offer_redemption", e))
  }
}
