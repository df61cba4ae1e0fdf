// fulfillment/src/cache.rs

//! Process-wide read cache of the full order list.
//!
//! The cache holds exactly one entry: the unfiltered set of all orders.
//! Filters and pagination are pure functions applied to that snapshot, so
//! a write only ever has one key to invalidate.

use crate::model::{Order, OrderStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_ORDER_CACHE_TTL: Duration = Duration::from_secs(30);

/// Swappable cache seam; a distributed implementation can replace the
/// in-memory one without touching callers.
pub trait OrderCache: Send + Sync {
  /// The current snapshot, or `None` when empty or expired.
  fn get(&self) -> Option<Arc<Vec<Order>>>;

  fn set(&self, orders: Vec<Order>);

  fn invalidate(&self);

  fn is_valid(&self) -> bool;

  /// Monotonic counter bumped by every `invalidate`.
  fn epoch(&self) -> u64;

  /// Stores `orders` only if no invalidation happened since `epoch` was
  /// read. Used by read-through fills so a slow fetch that started before
  /// a write cannot reinstate pre-write data.
  fn set_if_epoch(&self, epoch: u64, orders: Arc<Vec<Order>>) -> bool;
}

struct Snapshot {
  data: Arc<Vec<Order>>,
  timestamp: Instant,
}

/// Snapshots are replaced by reference and never mutated in place, so a
/// reader racing a writer sees either the old or the new list in full.
pub struct InMemoryOrderCache {
  ttl: Duration,
  slot: RwLock<Option<Arc<Snapshot>>>,
  epoch: AtomicU64,
}

impl InMemoryOrderCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      ttl,
      slot: RwLock::new(None),
      epoch: AtomicU64::new(0),
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn current(&self) -> Option<Arc<Snapshot>> {
    let snapshot = self.slot.read().clone()?;
    if snapshot.timestamp.elapsed() < self.ttl {
      Some(snapshot)
    } else {
      None
    }
  }

  fn store(&self, orders: Vec<Order>) {
    *self.slot.write() = Some(Arc::new(Snapshot {
      data: Arc::new(orders),
      timestamp: Instant::now(),
    }));
  }
}

impl Default for InMemoryOrderCache {
  fn default() -> Self {
    Self::new(DEFAULT_ORDER_CACHE_TTL)
  }
}

impl OrderCache for InMemoryOrderCache {
  fn get(&self) -> Option<Arc<Vec<Order>>> {
    self.current().map(|s| Arc::clone(&s.data))
  }

  fn set(&self, orders: Vec<Order>) {
    self.store(orders);
  }

  fn invalidate(&self) {
    let mut slot = self.slot.write();
    self.epoch.fetch_add(1, Ordering::SeqCst);
    *slot = None;
    tracing::debug!(target: "fulfillment::cache", "Order cache invalidated.");
  }

  fn is_valid(&self) -> bool {
    self.current().is_some()
  }

  fn epoch(&self) -> u64 {
    self.epoch.load(Ordering::SeqCst)
  }

  fn set_if_epoch(&self, epoch: u64, orders: Arc<Vec<Order>>) -> bool {
    // Invalidate bumps the epoch while holding this same lock.
    let mut slot = self.slot.write();
    if self.epoch.load(Ordering::SeqCst) != epoch {
      return false;
    }
    *slot = Some(Arc::new(Snapshot {
      data: orders,
      timestamp: Instant::now(),
    }));
    true
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
  Hit,
  Miss,
}

impl CacheStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      CacheStatus::Hit => "HIT",
      CacheStatus::Miss => "MISS",
    }
  }
}

/// In-memory filter over the cached order list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderFilter {
  #[serde(default)]
  pub status: Option<OrderStatus>,
  #[serde(default)]
  pub assigned_to: Option<String>,
  #[serde(default)]
  pub limit: Option<usize>,
  #[serde(default)]
  pub offset: Option<usize>,
}

impl OrderFilter {
  pub fn matches(&self, order: &Order) -> bool {
    self.status.map_or(true, |s| order.status == s)
      && self
        .assigned_to
        .as_deref()
        .map_or(true, |who| order.assigned_to.as_deref() == Some(who))
  }

  /// Returns `(page, total_matching)`. Input order is preserved.
  pub fn apply(&self, orders: &[Order]) -> (Vec<Order>, usize) {
    let matching: Vec<&Order> = orders.iter().filter(|o| self.matches(o)).collect();
    let total = matching.len();
    let page = matching
      .into_iter()
      .skip(self.offset.unwrap_or(0))
      .take(self.limit.unwrap_or(usize::MAX))
      .cloned()
      .collect();
    (page, total)
  }
}
