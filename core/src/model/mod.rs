// fulfillment/src/model/mod.rs

//! Documents and value types shared by the stores, the engine and the HTTP layer.

pub mod offer;
pub mod order;
pub mod principal;
pub mod task;

pub use offer::{CustomerRef, DiscountType, NewOffer, Offer, OfferDraft};
pub use order::{
  Customer, NewOrder, Order, OrderDraft, OrderItem, OrderPatch, OrderStatus, PaymentMethod, PaymentStatus,
  RefundStatus, ShippingAddress,
};
pub use principal::{Principal, Role};
pub use task::{Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};

use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// in partial-update bodies.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}
