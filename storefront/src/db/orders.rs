// storefront/src/db/orders.rs

use super::{store_error, PgStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::model::{
  Customer, Order, OrderDraft, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, RefundStatus, ShippingAddress,
};
use fulfillment::{OrderStore, StoreError, StoreResult};
use rust_decimal::Decimal;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, items, subtotal, discount, shipping, total, customer, shipping_address, \
   payment_method, payment_status, status, assigned_to, offer_id, refund_status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
  id: Uuid,
  order_number: String,
  items: Json<Vec<OrderItem>>,
  subtotal: Decimal,
  discount: Option<Decimal>,
  shipping: Decimal,
  total: Decimal,
  customer: Json<Customer>,
  shipping_address: Json<ShippingAddress>,
  payment_method: PaymentMethod,
  payment_status: PaymentStatus,
  status: OrderStatus,
  assigned_to: Option<String>,
  offer_id: Option<Uuid>,
  refund_status: Option<RefundStatus>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: row.id,
      order_number: row.order_number,
      items: row.items.0,
      subtotal: row.subtotal,
      discount: row.discount,
      shipping: row.shipping,
      total: row.total,
      customer: row.customer.0,
      shipping_address: row.shipping_address.0,
      payment_method: row.payment_method,
      payment_status: row.payment_status,
      status: row.status,
      assigned_to: row.assigned_to,
      offer_id: row.offer_id,
      refund_status: row.refund_status,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[async_trait]
impl OrderStore for PgStore {
  async fn next_order_sequence(&self) -> StoreResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT nextval('order_number_seq')")
      .fetch_one(&self.pool)
      .await
      .map_err(|e| store_error("order", e))
  }

  #[instrument(name = "PgStore::insert_order", skip(self, draft), fields(order_number = %draft.order_number), err(Display))]
  async fn insert(&self, draft: OrderDraft) -> StoreResult<Order> {
    let order = draft.into_order(Uuid::new_v4());
    sqlx::query(
      "INSERT INTO orders (id, order_number, items, subtotal, discount, shipping, total, customer, shipping_address,
         payment_method, payment_status, status, assigned_to, offer_id, refund_status, created_at, updated_at)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(Json(&order.items))
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.shipping)
    .bind(order.total)
    .bind(Json(&order.customer))
    .bind(Json(&order.shipping_address))
    .bind(order.payment_method)
    .bind(order.payment_status)
    .bind(order.status)
    .bind(&order.assigned_to)
    .bind(order.offer_id)
    .bind(order.refund_status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&self.pool)
    .await
    .map_err(|e| store_error("order", e))?;
    Ok(order)
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(|e| store_error("order", e))?;
    Ok(row.map(Order::from))
  }

  async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE order_number = $1", ORDER_COLUMNS))
      .bind(order_number)
      .fetch_optional(&self.pool)
      .await
      .map_err(|e| store_error("order", e))?;
    Ok(row.map(Order::from))
  }

  #[instrument(name = "PgStore::list_orders", skip(self), err(Display))]
  async fn list_all(&self) -> StoreResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {} FROM orders ORDER BY created_at DESC, order_number DESC",
      ORDER_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await
    .map_err(|e| store_error("order", e))?;
    Ok(rows.into_iter().map(Order::from).collect())
  }

  #[instrument(name = "PgStore::update_order", skip(self, order), fields(order_id = %order.id), err(Display))]
  async fn update(&self, order: &Order) -> StoreResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
      "UPDATE orders SET status = $2, assigned_to = $3, payment_status = $4, refund_status = $5, updated_at = $6
       WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(order.status)
    .bind(&order.assigned_to)
    .bind(order.payment_status)
    .bind(order.refund_status)
    .bind(order.updated_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| store_error("order", e))?;
    row.map(Order::from).ok_or_else(|| StoreError::NotFound {
      entity: "order",
      key: order.id.to_string(),
    })
  }

  #[instrument(name = "PgStore::transition_order_status", skip(self, updated_at), err(Display))]
  async fn transition_status(
    &self,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    updated_at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
      "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2 RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(updated_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(|e| store_error("order", e))?;
    if let Some(row) = row {
      return Ok(Some(row.into()));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
      .bind(id)
      .fetch_one(&self.pool)
      .await
      .map_err(|e| store_error("order", e))?;
    if exists {
      Ok(None)
    } else {
      Err(StoreError::NotFound {
        entity: "order",
        key: id.to_string(),
      })
    }
  }
}
