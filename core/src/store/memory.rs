// fulfillment/src/store/memory.rs

//! Process-local implementation of every store trait.

use super::{OfferConsumption, OfferStore, OrderStore, RedemptionLedger, TaskInsert, TaskStore};
use crate::error::{StoreError, StoreResult};
use crate::model::{Offer, OfferDraft, Order, OrderDraft, OrderStatus, Task, TaskDraft};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
  orders: RwLock<HashMap<Uuid, Order>>,
  tasks: RwLock<HashMap<Uuid, Task>>,
  offers: RwLock<HashMap<Uuid, Offer>>,
  redemptions: RwLock<HashSet<(Uuid, String)>>,
  order_sequence: AtomicI64,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn task_count(&self) -> usize {
    self.tasks.read().len()
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn next_order_sequence(&self) -> StoreResult<i64> {
    Ok(self.order_sequence.fetch_add(1, Ordering::SeqCst) + 1)
  }

  async fn insert(&self, draft: OrderDraft) -> StoreResult<Order> {
    let mut orders = self.orders.write();
    if orders.values().any(|o| o.order_number == draft.order_number) {
      return Err(StoreError::Conflict {
        entity: "order",
        message: format!("order_number '{}' already exists", draft.order_number),
      });
    }
    let order = draft.into_order(Uuid::new_v4());
    orders.insert(order.id, order.clone());
    Ok(order)
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.orders.read().get(&id).cloned())
  }

  async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
    Ok(self.orders.read().values().find(|o| o.order_number == order_number).cloned())
  }

  async fn list_all(&self) -> StoreResult<Vec<Order>> {
    let mut all: Vec<Order> = self.orders.read().values().cloned().collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.order_number.cmp(&a.order_number)));
    Ok(all)
  }

  async fn update(&self, order: &Order) -> StoreResult<Order> {
    let mut orders = self.orders.write();
    let stored = orders.get_mut(&order.id).ok_or_else(|| StoreError::NotFound {
      entity: "order",
      key: order.id.to_string(),
    })?;
    stored.status = order.status;
    stored.assigned_to = order.assigned_to.clone();
    stored.payment_status = order.payment_status;
    stored.refund_status = order.refund_status;
    stored.updated_at = order.updated_at;
    Ok(stored.clone())
  }

  async fn transition_status(
    &self,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    updated_at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    let mut orders = self.orders.write();
    let stored = orders.get_mut(&id).ok_or_else(|| StoreError::NotFound {
      entity: "order",
      key: id.to_string(),
    })?;
    if stored.status != from {
      return Ok(None);
    }
    stored.status = to;
    stored.updated_at = updated_at;
    Ok(Some(stored.clone()))
  }
}

#[async_trait]
impl TaskStore for MemoryStore {
  async fn insert_if_absent(&self, draft: TaskDraft) -> StoreResult<TaskInsert> {
    // One write guard covers the existence check and the insert.
    let mut tasks = self.tasks.write();
    if tasks
      .values()
      .any(|t| t.order_id == draft.order_id && t.task_type == draft.task_type)
    {
      return Ok(TaskInsert::AlreadyExists);
    }
    let task = draft.into_task(Uuid::new_v4());
    tasks.insert(task.id, task.clone());
    Ok(TaskInsert::Created(task))
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
    Ok(self.tasks.read().get(&id).cloned())
  }

  async fn for_order(&self, order_id: Uuid) -> StoreResult<Vec<Task>> {
    let mut tasks: Vec<Task> = self
      .tasks
      .read()
      .values()
      .filter(|t| t.order_id == order_id)
      .cloned()
      .collect();
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(tasks)
  }

  async fn update(&self, task: &Task) -> StoreResult<Task> {
    let mut tasks = self.tasks.write();
    let stored = tasks.get_mut(&task.id).ok_or_else(|| StoreError::NotFound {
      entity: "task",
      key: task.id.to_string(),
    })?;
    stored.status = task.status;
    stored.assigned_to = task.assigned_to.clone();
    stored.priority = task.priority;
    stored.completed_at = task.completed_at;
    stored.updated_at = task.updated_at;
    Ok(stored.clone())
  }

  async fn delete(&self, id: Uuid) -> StoreResult<bool> {
    Ok(self.tasks.write().remove(&id).is_some())
  }
}

#[async_trait]
impl OfferStore for MemoryStore {
  async fn insert(&self, draft: OfferDraft) -> StoreResult<Offer> {
    let mut offers = self.offers.write();
    if offers.values().any(|o| o.code.eq_ignore_ascii_case(&draft.code)) {
      return Err(StoreError::Conflict {
        entity: "offer",
        message: format!("code '{}' already exists", draft.code),
      });
    }
    let offer = draft.into_offer(Uuid::new_v4());
    offers.insert(offer.id, offer.clone());
    Ok(offer)
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Offer>> {
    Ok(self.offers.read().get(&id).cloned())
  }

  async fn get_by_code(&self, code: &str) -> StoreResult<Option<Offer>> {
    Ok(
      self
        .offers
        .read()
        .values()
        .find(|o| o.code.eq_ignore_ascii_case(code.trim()))
        .cloned(),
    )
  }

  async fn consume(
    &self,
    id: Uuid,
    customer_key: Option<&str>,
    _order_id: Option<Uuid>,
  ) -> StoreResult<OfferConsumption> {
    // Offers before redemptions, both held until the end.
    let mut offers = self.offers.write();
    let mut redemptions = self.redemptions.write();
    let offer = offers.get_mut(&id).ok_or_else(|| StoreError::NotFound {
      entity: "offer",
      key: id.to_string(),
    })?;
    let redemption = customer_key.map(|key| (id, key.to_string()));
    if redemption.as_ref().is_some_and(|r| redemptions.contains(r)) {
      return Ok(OfferConsumption::AlreadyRedeemed);
    }
    if offer.usage_limit.is_some_and(|limit| offer.used_count >= limit) {
      return Ok(OfferConsumption::LimitReached);
    }
    offer.used_count += 1;
    if let Some(r) = redemption {
      redemptions.insert(r);
    }
    Ok(OfferConsumption::Consumed)
  }
}

#[async_trait]
impl RedemptionLedger for MemoryStore {
  async fn has_redeemed(&self, offer_id: Uuid, customer_key: &str) -> StoreResult<bool> {
    Ok(self.redemptions.read().contains(&(offer_id, customer_key.to_string())))
  }
}
