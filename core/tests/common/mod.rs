// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fulfillment::cache::InMemoryOrderCache;
use fulfillment::error::{StoreError, StoreResult};
use fulfillment::model::{
  Customer, DiscountType, NewOffer, NewOrder, Offer, OfferDraft, Order, OrderDraft, OrderItem, OrderStatus,
  PaymentMethod, PaymentStatus, RefundStatus, ShippingAddress, Task, TaskDraft,
};
use fulfillment::store::{MemoryStore, OfferConsumption, OfferStore, OrderStore, TaskInsert, TaskStore};
use fulfillment::{FulfillmentConfig, FulfillmentService, Principal, RecordingSink, Stores, TaskPriority};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

// --- Store wrapper with switchable failures ---

/// Delegates to a `MemoryStore` unless a failure switch is on.
#[derive(Default)]
pub struct FlakyStore {
  pub inner: Arc<MemoryStore>,
  pub fail_task_insert: AtomicBool,
  pub fail_order_update: AtomicBool,
  pub fail_list: AtomicBool,
  pub fail_offer_consume: AtomicBool,
  /// One-shot: the next order read is followed by a cancellation landing
  /// in the store, so the reader holds a stale copy.
  pub cancel_after_read: AtomicBool,
}

impl FlakyStore {
  pub fn new(inner: Arc<MemoryStore>) -> Self {
    Self {
      inner,
      ..Default::default()
    }
  }

  fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
      Err(StoreError::Unavailable {
        source: anyhow::anyhow!("injected failure: {}", what),
      })
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl OrderStore for FlakyStore {
  async fn next_order_sequence(&self) -> StoreResult<i64> {
    OrderStore::next_order_sequence(&*self.inner).await
  }

  async fn insert(&self, draft: OrderDraft) -> StoreResult<Order> {
    OrderStore::insert(&*self.inner, draft).await
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
    let read = OrderStore::get(&*self.inner, id).await?;
    if let Some(order) = &read {
      if self.cancel_after_read.swap(false, Ordering::SeqCst) {
        let mut cancelled = order.clone();
        cancelled.status = OrderStatus::Cancelled;
        cancelled.refund_status = Some(RefundStatus::Started);
        cancelled.updated_at = Utc::now();
        OrderStore::update(&*self.inner, &cancelled).await?;
      }
    }
    Ok(read)
  }

  async fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
    OrderStore::get_by_number(&*self.inner, order_number).await
  }

  async fn list_all(&self) -> StoreResult<Vec<Order>> {
    Self::check(&self.fail_list, "list orders")?;
    OrderStore::list_all(&*self.inner).await
  }

  async fn update(&self, order: &Order) -> StoreResult<Order> {
    Self::check(&self.fail_order_update, "update order")?;
    OrderStore::update(&*self.inner, order).await
  }

  async fn transition_status(
    &self,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    updated_at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    Self::check(&self.fail_order_update, "update order")?;
    OrderStore::transition_status(&*self.inner, id, from, to, updated_at).await
  }
}

#[async_trait]
impl TaskStore for FlakyStore {
  async fn insert_if_absent(&self, draft: TaskDraft) -> StoreResult<TaskInsert> {
    Self::check(&self.fail_task_insert, "insert task")?;
    TaskStore::insert_if_absent(&*self.inner, draft).await
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Task>> {
    TaskStore::get(&*self.inner, id).await
  }

  async fn for_order(&self, order_id: Uuid) -> StoreResult<Vec<Task>> {
    TaskStore::for_order(&*self.inner, order_id).await
  }

  async fn update(&self, task: &Task) -> StoreResult<Task> {
    TaskStore::update(&*self.inner, task).await
  }

  async fn delete(&self, id: Uuid) -> StoreResult<bool> {
    TaskStore::delete(&*self.inner, id).await
  }
}

#[async_trait]
impl OfferStore for FlakyStore {
  async fn insert(&self, draft: OfferDraft) -> StoreResult<Offer> {
    OfferStore::insert(&*self.inner, draft).await
  }

  async fn get(&self, id: Uuid) -> StoreResult<Option<Offer>> {
    OfferStore::get(&*self.inner, id).await
  }

  async fn get_by_code(&self, code: &str) -> StoreResult<Option<Offer>> {
    OfferStore::get_by_code(&*self.inner, code).await
  }

  async fn consume(
    &self,
    id: Uuid,
    customer_key: Option<&str>,
    order_id: Option<Uuid>,
  ) -> StoreResult<OfferConsumption> {
    Self::check(&self.fail_offer_consume, "consume offer")?;
    OfferStore::consume(&*self.inner, id, customer_key, order_id).await
  }
}

// --- Harness ---

pub struct Harness {
  pub service: FulfillmentService,
  pub stores: Stores,
  pub flaky: Arc<FlakyStore>,
  pub sink: Arc<RecordingSink>,
  pub cache: Arc<InMemoryOrderCache>,
}

pub fn harness() -> Harness {
  harness_with(FulfillmentConfig::default())
}

pub fn harness_with(config: FulfillmentConfig) -> Harness {
  setup_tracing();
  let memory = Arc::new(MemoryStore::new());
  let flaky = Arc::new(FlakyStore::new(memory.clone()));
  let stores = Stores {
    orders: flaky.clone(),
    tasks: flaky.clone(),
    offers: flaky.clone(),
    redemptions: memory,
  };
  let sink = Arc::new(RecordingSink::new());
  let cache = Arc::new(InMemoryOrderCache::new(config.cache_ttl));
  let service = FulfillmentService::with_components(stores.clone(), config, cache.clone(), sink.clone());
  Harness {
    service,
    stores,
    flaky,
    sink,
    cache,
  }
}

pub fn superuser() -> Principal {
  Principal::superuser("root")
}

pub fn admin() -> Principal {
  Principal::admin("ops-lead")
}

pub fn worker(id: &str) -> Principal {
  Principal::worker(id)
}

// --- Fixtures ---

pub fn item(sku: &str, quantity: u32, price: i64) -> OrderItem {
  OrderItem {
    product_id: format!("prod-{}", sku),
    sku: sku.to_string(),
    title: format!("Item {}", sku),
    quantity,
    price: Decimal::from(price),
    image: None,
  }
}

pub fn new_order(method: PaymentMethod, items: Vec<OrderItem>) -> NewOrder {
  NewOrder {
    items,
    shipping: Decimal::from(50),
    customer: Customer {
      name: "Asha Rao".to_string(),
      email: "asha@example.com".to_string(),
      phone: Some("+91 90000 00000".to_string()),
      id: None,
    },
    shipping_address: ShippingAddress {
      line1: "12 MG Road".to_string(),
      line2: None,
      city: "Bengaluru".to_string(),
      state: "KA".to_string(),
      postal_code: "560001".to_string(),
      country: "IN".to_string(),
    },
    payment_method: method,
    payment_status: None,
    offer_id: None,
    offer_code: None,
  }
}

pub async fn place_order(h: &Harness) -> Order {
  h.service
    .create_order(new_order(PaymentMethod::Upi, vec![item("TEE-M", 2, 1000), item("CAP", 1, 3000)]))
    .await
    .expect("order placed")
}

pub async fn place_paid_order(h: &Harness, method: PaymentMethod) -> Order {
  let mut req = new_order(method, vec![item("TEE-M", 1, 1500)]);
  if method != PaymentMethod::Cod {
    req.payment_status = Some(PaymentStatus::Paid);
  }
  h.service.create_order(req).await.expect("order placed")
}

/// Places an order and starts fulfillment for `assignee`; returns the order
/// and its first (packing) task.
pub async fn started_order(h: &Harness, assignee: &str) -> (Order, Task) {
  let order = place_order(h).await;
  let start = h
    .service
    .start_fulfillment(order.id, assignee, TaskPriority::High, &superuser())
    .await
    .expect("fulfillment started");
  (start.order, start.task)
}

pub async fn tasks_of(h: &Harness, order_id: Uuid) -> Vec<Task> {
  h.stores.tasks.for_order(order_id).await.expect("tasks listed")
}

pub async fn order_of(h: &Harness, order_id: Uuid) -> Order {
  h.stores.orders.get(order_id).await.expect("order read").expect("order exists")
}

pub fn task_of_type<'a>(tasks: &'a [Task], step: &str) -> Option<&'a Task> {
  tasks.iter().find(|t| t.task_type == step)
}

pub fn percentage_offer(code: &str, value: i64) -> NewOffer {
  let now = Utc::now();
  NewOffer {
    code: code.to_string(),
    discount_type: DiscountType::Percentage,
    discount_value: Decimal::from(value),
    min_order_amount: None,
    max_discount: None,
    valid_from: now - Duration::days(1),
    valid_until: now + Duration::days(7),
    is_active: true,
    usage_limit: None,
    one_time_per_user: false,
    customer_email: None,
    customer_emails: vec![],
    customer_id: None,
    customer_ids: vec![],
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
