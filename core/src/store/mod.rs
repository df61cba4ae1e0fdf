// fulfillment/src/store/mod.rs

//! Persistence seams. The engine only talks to these traits; the storefront
//! binary provides Postgres implementations and `MemoryStore` backs tests and
//! local runs.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::model::{Offer, OfferDraft, Order, OrderDraft, OrderStatus, Task, TaskDraft};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Next value of the monotonically increasing order-number sequence.
  async fn next_order_sequence(&self) -> StoreResult<i64>;

  /// Persists a new order and assigns its id. A duplicate `order_number`
  /// is a `StoreError::Conflict`.
  async fn insert(&self, draft: OrderDraft) -> StoreResult<Order>;

  async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

  async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;

  /// Every order, newest first.
  async fn list_all(&self) -> StoreResult<Vec<Order>>;

  /// Writes the mutable fields of `order` (status, assignment, payment and
  /// refund state, `updated_at`). Missing rows are `StoreError::NotFound`.
  async fn update(&self, order: &Order) -> StoreResult<Order>;

  /// Moves the order from `from` to `to`, touching nothing else. Applies
  /// only while the stored status still equals `from`; returns `None` when
  /// the guard missed. Missing rows are `StoreError::NotFound`.
  async fn transition_status(
    &self,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    updated_at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>>;
}

/// Result of an insert-if-absent keyed on `(order_id, type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInsert {
  Created(Task),
  AlreadyExists,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
  /// Creates the task unless one with the same `(order_id, type)` exists.
  /// Must be atomic with respect to concurrent callers.
  async fn insert_if_absent(&self, draft: TaskDraft) -> StoreResult<TaskInsert>;

  async fn get(&self, id: Uuid) -> StoreResult<Option<Task>>;

  async fn for_order(&self, order_id: Uuid) -> StoreResult<Vec<Task>>;

  async fn update(&self, task: &Task) -> StoreResult<Task>;

  /// Returns `false` when no such task existed.
  async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait OfferStore: Send + Sync {
  /// A duplicate `code` is a `StoreError::Conflict`.
  async fn insert(&self, draft: OfferDraft) -> StoreResult<Offer>;

  async fn get(&self, id: Uuid) -> StoreResult<Option<Offer>>;

  async fn get_by_code(&self, code: &str) -> StoreResult<Option<Offer>>;

  /// Consumes one use of the offer as a single unit: bumps `used_count`
  /// unless `usage_limit` is reached and, when `customer_key` is given,
  /// records the per-customer redemption. Either both writes happen or
  /// neither does.
  async fn consume(
    &self,
    id: Uuid,
    customer_key: Option<&str>,
    order_id: Option<Uuid>,
  ) -> StoreResult<OfferConsumption>;
}

/// Result of `OfferStore::consume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferConsumption {
  Consumed,
  /// The customer's redemption was already on record; nothing changed.
  AlreadyRedeemed,
  /// `usage_limit` reached; nothing changed.
  LimitReached,
}

/// Per-customer redemption records for one-time offers.
#[async_trait]
pub trait RedemptionLedger: Send + Sync {
  async fn has_redeemed(&self, offer_id: Uuid, customer_key: &str) -> StoreResult<bool>;
}
