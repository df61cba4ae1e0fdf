// fulfillment/src/service.rs

//! Entry points used by the HTTP layer. Every call takes the acting
//! `Principal` explicitly; nothing here reads ambient request state.

use crate::cache::{CacheStatus, InMemoryOrderCache, OrderCache, OrderFilter, DEFAULT_ORDER_CACHE_TTL};
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{
  CustomerRef, NewOffer, NewOrder, Offer, Order, OrderDraft, OrderPatch, OrderStatus, PaymentMethod, PaymentStatus,
  Principal, RefundStatus, Role, Task, TaskPatch, TaskPriority, TaskStatus,
};
use crate::offers::{OfferDecision, OfferLookup, OfferValidator, Redemption, ValidateOfferRequest};
use crate::store::memory::MemoryStore;
use crate::store::{OfferStore, OrderStore, RedemptionLedger, TaskStore};
use crate::workflow::access;
use crate::workflow::{
  CompletionReport, RepairReport, SideEffectFailure, SideEffectSink, TracingSink, WorkflowDefinition, WorkflowEngine,
};
use chrono::{Datelike, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const STEP_REDEEM_OFFER: &str = "redeem_offer";

/// The four backing stores.
#[derive(Clone)]
pub struct Stores {
  pub orders: Arc<dyn OrderStore>,
  pub tasks: Arc<dyn TaskStore>,
  pub offers: Arc<dyn OfferStore>,
  pub redemptions: Arc<dyn RedemptionLedger>,
}

impl Stores {
  /// All four backed by one shared `MemoryStore`.
  pub fn memory() -> Self {
    Self::from_shared(Arc::new(MemoryStore::new()))
  }

  pub fn from_shared<S>(store: Arc<S>) -> Self
  where
    S: OrderStore + TaskStore + OfferStore + RedemptionLedger + 'static,
  {
    Self {
      orders: store.clone(),
      tasks: store.clone(),
      offers: store.clone(),
      redemptions: store,
    }
  }
}

#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
  pub workflow: WorkflowDefinition,
  pub cache_ttl: Duration,
  pub order_number_prefix: String,
}

impl Default for FulfillmentConfig {
  fn default() -> Self {
    Self {
      workflow: WorkflowDefinition::standard(),
      cache_ttl: DEFAULT_ORDER_CACHE_TTL,
      order_number_prefix: "ORD".to_string(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderListing {
  pub orders: Vec<Order>,
  pub total: usize,
  #[serde(skip)]
  pub cache: CacheStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdate {
  pub task: Task,
  /// Present only when this update moved the task into `completed`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub completion: Option<CompletionReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentStart {
  pub order: Order,
  pub task: Task,
}

pub struct FulfillmentService {
  orders: Arc<dyn OrderStore>,
  tasks: Arc<dyn TaskStore>,
  cache: Arc<dyn OrderCache>,
  sink: Arc<dyn SideEffectSink>,
  engine: WorkflowEngine,
  offers: OfferValidator,
  order_number_prefix: String,
}

impl FulfillmentService {
  pub fn new(stores: Stores, config: FulfillmentConfig) -> Self {
    let cache = Arc::new(InMemoryOrderCache::new(config.cache_ttl));
    Self::with_components(stores, config, cache, Arc::new(TracingSink))
  }

  pub fn with_components(
    stores: Stores,
    config: FulfillmentConfig,
    cache: Arc<dyn OrderCache>,
    sink: Arc<dyn SideEffectSink>,
  ) -> Self {
    let engine = WorkflowEngine::new(
      config.workflow,
      stores.orders.clone(),
      stores.tasks.clone(),
      cache.clone(),
      sink.clone(),
    );
    Self {
      orders: stores.orders,
      tasks: stores.tasks,
      offers: OfferValidator::new(stores.offers, stores.redemptions),
      cache,
      sink,
      engine,
      order_number_prefix: config.order_number_prefix,
    }
  }

  pub fn engine(&self) -> &WorkflowEngine {
    &self.engine
  }

  pub fn offers(&self) -> &OfferValidator {
    &self.offers
  }

  pub fn cache(&self) -> &Arc<dyn OrderCache> {
    &self.cache
  }

  // --- Orders ---

  /// Checkout. Offer consumption happens after the order is stored and is
  /// best-effort.
  #[instrument(name = "FulfillmentService::create_order", skip(self, new_order), err(Display))]
  pub async fn create_order(&self, new_order: NewOrder) -> FulfillmentResult<Order> {
    validate_new_order(&new_order)?;

    let subtotal = round_money(new_order.items.iter().map(|i| i.line_total()).sum());
    let customer = CustomerRef::new(Some(new_order.customer.email.clone()), new_order.customer.id.clone());

    let lookup = match (new_order.offer_id, new_order.offer_code.as_deref().map(str::trim)) {
      (Some(id), _) => Some(OfferLookup::Id(id)),
      (None, Some(code)) if !code.is_empty() => Some(OfferLookup::Code(code.to_string())),
      _ => None,
    };
    let applied = match lookup {
      Some(lookup) => {
        let offer = self.offers.find(&lookup).await?;
        match self.offers.evaluate(&offer, subtotal, &customer, Utc::now()).await? {
          OfferDecision::Accepted { offer_id, discount } => Some((offer_id, discount)),
          OfferDecision::Rejected(reason) => return Err(FulfillmentError::Validation(reason.to_string())),
        }
      }
      None => None,
    };

    let discount = applied.map(|(_, d)| d);
    let shipping = round_money(new_order.shipping);
    let total = subtotal - discount.unwrap_or(Decimal::ZERO) + shipping;

    let sequence = self.orders.next_order_sequence().await?;
    let now = Utc::now();
    let draft = OrderDraft {
      order_number: format!("{}-{}-{:06}", self.order_number_prefix, now.year(), sequence),
      items: new_order.items,
      subtotal,
      discount,
      shipping,
      total,
      customer: new_order.customer,
      shipping_address: new_order.shipping_address,
      payment_method: new_order.payment_method,
      payment_status: new_order.payment_status.unwrap_or(PaymentStatus::Pending),
      status: OrderStatus::Pending,
      assigned_to: None,
      offer_id: applied.map(|(id, _)| id),
      created_at: now,
    };
    let order = self.orders.insert(draft).await?;
    self.cache.invalidate();
    info!(order_id = %order.id, order_number = %order.order_number, total = %order.total, "Order placed.");

    if let Some((offer_id, _)) = applied {
      match self.offers.redeem(offer_id, &customer, Some(order.id)).await {
        Ok(Redemption::Recorded) => debug!(%offer_id, "Offer redeemed."),
        Ok(Redemption::AlreadyRedeemed) => debug!(%offer_id, "Offer redemption already recorded."),
        Err(e) => self.sink.record(SideEffectFailure {
          order_id: order.id,
          task_id: None,
          step: STEP_REDEEM_OFFER.to_string(),
          error: e.to_string(),
        }),
      }
    }
    Ok(order)
  }

  #[instrument(name = "FulfillmentService::get_order", skip(self, principal), fields(actor = %principal.id), err(Display))]
  pub async fn get_order(&self, order_id: Uuid, principal: &Principal) -> FulfillmentResult<Order> {
    let order = self.load_order(order_id).await?;
    access::can_view_order(principal, &order)?;
    Ok(order)
  }

  /// Read-through listing. Workers only ever see orders assigned to them.
  #[instrument(name = "FulfillmentService::list_orders", skip(self, principal), fields(actor = %principal.id), err(Display))]
  pub async fn list_orders(&self, mut filter: OrderFilter, principal: &Principal) -> FulfillmentResult<OrderListing> {
    if principal.role == Role::Worker {
      filter.assigned_to = Some(principal.id.clone());
    }
    if filter.limit == Some(0) {
      return Err(FulfillmentError::Validation("limit must be at least 1".to_string()));
    }

    let (snapshot, cache) = match self.cache.get() {
      Some(snapshot) => (snapshot, CacheStatus::Hit),
      None => {
        let epoch = self.cache.epoch();
        let fresh = Arc::new(self.orders.list_all().await?);
        if !self.cache.set_if_epoch(epoch, Arc::clone(&fresh)) {
          debug!("Order list changed during refresh; not caching it.");
        }
        (fresh, CacheStatus::Miss)
      }
    };

    let (orders, total) = filter.apply(&snapshot);
    debug!(cache = cache.as_str(), returned = orders.len(), total, "Orders listed.");
    Ok(OrderListing { orders, total, cache })
  }

  /// Handles `PUT /orders/{id}`.
  #[instrument(name = "FulfillmentService::update_order", skip(self, patch, principal), fields(actor = %principal.id), err(Display))]
  pub async fn update_order(&self, order_id: Uuid, patch: OrderPatch, principal: &Principal) -> FulfillmentResult<Order> {
    if patch.is_empty() {
      return Err(FulfillmentError::Validation("no updatable order fields given".to_string()));
    }
    let mut order = self.load_order(order_id).await?;
    access::authorize_order_update(principal, &order, &patch)?;

    let previous = order.status;
    if let Some(status) = patch.status {
      if previous.is_terminal() && status != previous {
        return Err(FulfillmentError::Conflict(format!(
          "order {} is already {}",
          order.order_number, previous
        )));
      }
      order.status = status;
    }
    if let Some(assignee) = patch.assigned_to {
      order.assigned_to = match assignee.map(|a| a.trim().to_string()) {
        Some(a) if a.is_empty() => {
          return Err(FulfillmentError::Validation("assigned_to must not be blank".to_string()));
        }
        other => other,
      };
    }
    if let Some(payment_status) = patch.payment_status {
      order.payment_status = payment_status;
    }

    if order.status == OrderStatus::Cancelled
      && previous != OrderStatus::Cancelled
      && order.payment_status == PaymentStatus::Paid
      && order.payment_method != PaymentMethod::Cod
    {
      order.refund_status = Some(RefundStatus::Started);
      info!(order_number = %order.order_number, "Paid order cancelled; refund flagged.");
    }

    order.updated_at = Utc::now();
    let stored = self.orders.update(&order).await?;
    self.cache.invalidate();
    info!(order_number = %stored.order_number, from = %previous, to = %stored.status, "Order updated.");
    Ok(stored)
  }

  #[instrument(name = "FulfillmentService::start_fulfillment", skip(self, principal), fields(actor = %principal.id), err(Display))]
  pub async fn start_fulfillment(
    &self,
    order_id: Uuid,
    assignee: &str,
    priority: TaskPriority,
    principal: &Principal,
  ) -> FulfillmentResult<FulfillmentStart> {
    access::require_superuser(principal, "start fulfillment")?;
    let assignee = assignee.trim();
    if assignee.is_empty() {
      return Err(FulfillmentError::Validation("assignee is required".to_string()));
    }

    let mut order = self.load_order(order_id).await?;
    if order.status.is_terminal() {
      return Err(FulfillmentError::Conflict(format!(
        "order {} is already {}",
        order.order_number, order.status
      )));
    }
    order.assigned_to = Some(assignee.to_string());
    if order.status == OrderStatus::Pending {
      order.status = OrderStatus::Confirmed;
    }
    order.updated_at = Utc::now();
    let order = self.orders.update(&order).await?;
    self.cache.invalidate();

    let task = self.engine.start(&order, assignee, priority, principal).await?;
    Ok(FulfillmentStart { order, task })
  }

  #[instrument(name = "FulfillmentService::repair_order", skip(self, principal), fields(actor = %principal.id), err(Display))]
  pub async fn repair_order(&self, order_id: Uuid, principal: &Principal) -> FulfillmentResult<RepairReport> {
    access::require_privileged(principal, "repair orders")?;
    self.engine.repair(order_id, principal).await
  }

  // --- Tasks ---

  pub async fn tasks_for_order(&self, order_id: Uuid, principal: &Principal) -> FulfillmentResult<Vec<Task>> {
    let order = self.load_order(order_id).await?;
    access::can_view_order(principal, &order)?;
    Ok(self.tasks.for_order(order_id).await?)
  }

  /// Handles `PUT /tasks/{id}`. The workflow runs only when this write is
  /// the one that moves the task into `completed`.
  #[instrument(name = "FulfillmentService::update_task", skip(self, patch, principal), fields(actor = %principal.id), err(Display))]
  pub async fn update_task(&self, task_id: Uuid, patch: TaskPatch, principal: &Principal) -> FulfillmentResult<TaskUpdate> {
    if patch.is_empty() {
      return Err(FulfillmentError::Validation("no updatable task fields given".to_string()));
    }
    let mut task = self
      .tasks
      .get(task_id)
      .await?
      .ok_or_else(|| FulfillmentError::NotFound(format!("task '{}'", task_id)))?;
    access::authorize_task_update(principal, &task, &patch)?;

    let was_completed = task.is_completed();
    let now = Utc::now();
    if let Some(status) = patch.status {
      task.status = status;
      match (was_completed, status) {
        (false, TaskStatus::Completed) => task.completed_at = Some(now),
        (_, TaskStatus::Completed) => {}
        _ => task.completed_at = None,
      }
    }
    if let Some(assignee) = patch.assigned_to {
      let assignee = assignee.trim();
      if assignee.is_empty() {
        return Err(FulfillmentError::Validation("assigned_to must not be blank".to_string()));
      }
      task.assigned_to = assignee.to_string();
    }
    if let Some(priority) = patch.priority {
      task.priority = priority;
    }
    task.updated_at = now;

    let stored = self.tasks.update(&task).await?;
    let completion = if !was_completed && stored.is_completed() {
      Some(self.engine.on_task_completed(&stored, principal).await)
    } else {
      None
    };
    Ok(TaskUpdate {
      task: stored,
      completion,
    })
  }

  #[instrument(name = "FulfillmentService::delete_task", skip(self, principal), fields(actor = %principal.id), err(Display))]
  pub async fn delete_task(&self, task_id: Uuid, principal: &Principal) -> FulfillmentResult<()> {
    access::require_superuser(principal, "delete tasks")?;
    if self.tasks.delete(task_id).await? {
      info!(%task_id, "Task deleted.");
      Ok(())
    } else {
      Err(FulfillmentError::NotFound(format!("task '{}'", task_id)))
    }
  }

  // --- Offers ---

  pub async fn validate_offer(&self, request: &ValidateOfferRequest) -> FulfillmentResult<OfferDecision> {
    self.offers.validate(request).await
  }

  pub async fn create_offer(&self, new_offer: NewOffer, principal: &Principal) -> FulfillmentResult<Offer> {
    self.offers.create_offer(new_offer, principal).await
  }

  pub async fn redeem_offer(
    &self,
    offer_id: Uuid,
    customer: &CustomerRef,
    order_id: Option<Uuid>,
  ) -> FulfillmentResult<Redemption> {
    self.offers.redeem(offer_id, customer, order_id).await
  }

  async fn load_order(&self, order_id: Uuid) -> FulfillmentResult<Order> {
    self
      .orders
      .get(order_id)
      .await?
      .ok_or_else(|| FulfillmentError::NotFound(format!("order '{}'", order_id)))
  }
}

fn validate_new_order(new_order: &NewOrder) -> FulfillmentResult<()> {
  if new_order.items.is_empty() {
    return Err(FulfillmentError::Validation("order must contain at least one item".to_string()));
  }
  for item in &new_order.items {
    if item.quantity == 0 {
      return Err(FulfillmentError::Validation(format!("quantity for '{}' must be at least 1", item.sku)));
    }
    if item.price < Decimal::ZERO {
      return Err(FulfillmentError::Validation(format!("price for '{}' must not be negative", item.sku)));
    }
  }
  if new_order.customer.email.trim().is_empty() {
    return Err(FulfillmentError::Validation("customer email is required".to_string()));
  }
  if new_order.shipping < Decimal::ZERO {
    return Err(FulfillmentError::Validation("shipping must not be negative".to_string()));
  }
  if new_order.payment_method == PaymentMethod::Cod && new_order.payment_status == Some(PaymentStatus::Paid) {
    return Err(FulfillmentError::Validation(
      "cash-on-delivery orders cannot be placed as paid".to_string(),
    ));
  }
  Ok(())
}

pub(crate) fn round_money(amount: Decimal) -> Decimal {
  amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
