// fulfillment/src/model/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle. The forward sequence runs `Pending` through `Delivered`;
/// `Cancelled` is a side branch reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "order_status", rename_all = "snake_case"))]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Packing,
  Packed,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 8] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Packing,
    OrderStatus::Packed,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  /// Position in the forward sequence; `None` for `Cancelled`.
  pub fn rank(self) -> Option<u8> {
    match self {
      OrderStatus::Pending => Some(0),
      OrderStatus::Confirmed => Some(1),
      OrderStatus::Processing => Some(2),
      OrderStatus::Packing => Some(3),
      OrderStatus::Packed => Some(4),
      OrderStatus::Shipped => Some(5),
      OrderStatus::Delivered => Some(6),
      OrderStatus::Cancelled => None,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
  }

  /// True when `next` is strictly later in the forward sequence.
  pub fn precedes(self, next: OrderStatus) -> bool {
    match (self.rank(), next.rank()) {
      (Some(a), Some(b)) => a < b,
      _ => false,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Processing => "processing",
      OrderStatus::Packing => "packing",
      OrderStatus::Packed => "packed",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .iter()
      .copied()
      .find(|status| status.as_str() == s.trim())
      .ok_or_else(|| format!("unknown order status '{}'", s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "payment_method", rename_all = "snake_case"))]
pub enum PaymentMethod {
  Cod,
  Razorpay,
  Upi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "payment_status", rename_all = "snake_case"))]
pub enum PaymentStatus {
  Pending,
  Paid,
  Refunded,
}

/// Refund progress. The core only ever writes `Started`; later states belong
/// to the external refund processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "refund_status", rename_all = "snake_case"))]
pub enum RefundStatus {
  Started,
  Completed,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
  pub product_id: String,
  pub sku: String,
  pub title: String,
  pub quantity: u32,
  pub price: Decimal,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

impl OrderItem {
  pub fn line_total(&self) -> Decimal {
    self.price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  /// Account id when the buyer was signed in.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub line1: String,
  #[serde(default)]
  pub line2: Option<String>,
  pub city: String,
  pub state: String,
  pub postal_code: String,
  pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub items: Vec<OrderItem>,
  pub subtotal: Decimal,
  pub discount: Option<Decimal>,
  pub shipping: Decimal,
  pub total: Decimal,
  pub customer: Customer,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub assigned_to: Option<String>,
  pub offer_id: Option<Uuid>,
  pub refund_status: Option<RefundStatus>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Everything of an order except the store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
  pub order_number: String,
  pub items: Vec<OrderItem>,
  pub subtotal: Decimal,
  pub discount: Option<Decimal>,
  pub shipping: Decimal,
  pub total: Decimal,
  pub customer: Customer,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub status: OrderStatus,
  pub assigned_to: Option<String>,
  pub offer_id: Option<Uuid>,
  pub created_at: DateTime<Utc>,
}

impl OrderDraft {
  pub fn into_order(self, id: Uuid) -> Order {
    Order {
      id,
      order_number: self.order_number,
      items: self.items,
      subtotal: self.subtotal,
      discount: self.discount,
      shipping: self.shipping,
      total: self.total,
      customer: self.customer,
      shipping_address: self.shipping_address,
      payment_method: self.payment_method,
      payment_status: self.payment_status,
      status: self.status,
      assigned_to: self.assigned_to,
      offer_id: self.offer_id,
      refund_status: None,
      created_at: self.created_at,
      updated_at: self.created_at,
    }
  }
}

/// Checkout request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
  pub items: Vec<OrderItem>,
  #[serde(default)]
  pub shipping: Decimal,
  pub customer: Customer,
  pub shipping_address: ShippingAddress,
  pub payment_method: PaymentMethod,
  /// Prepaid methods may arrive already captured.
  #[serde(default)]
  pub payment_status: Option<PaymentStatus>,
  #[serde(default)]
  pub offer_id: Option<Uuid>,
  #[serde(default)]
  pub offer_code: Option<String>,
}

/// Partial order update (`PUT /orders/{id}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
  #[serde(default)]
  pub status: Option<OrderStatus>,
  #[serde(default, deserialize_with = "super::double_option")]
  pub assigned_to: Option<Option<String>>,
  #[serde(default)]
  pub payment_status: Option<PaymentStatus>,
}

impl OrderPatch {
  pub fn is_empty(&self) -> bool {
    self.status.is_none() && self.assigned_to.is_none() && self.payment_status.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_sequence_ordering() {
    assert!(OrderStatus::Pending.precedes(OrderStatus::Confirmed));
    assert!(OrderStatus::Processing.precedes(OrderStatus::Packed));
    assert!(!OrderStatus::Packed.precedes(OrderStatus::Packing));
    assert!(!OrderStatus::Packed.precedes(OrderStatus::Cancelled));
    assert!(OrderStatus::Cancelled.is_terminal());
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(!OrderStatus::Shipped.is_terminal());
  }

  #[test]
  fn status_parses_from_query_strings() {
    assert_eq!("packing".parse::<OrderStatus>(), Ok(OrderStatus::Packing));
    assert!("packd".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn patch_distinguishes_null_from_absent() {
    let unassign: OrderPatch = serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
    assert_eq!(unassign.assigned_to, Some(None));

    let untouched: OrderPatch = serde_json::from_str(r#"{"status": "shipped"}"#).unwrap();
    assert_eq!(untouched.assigned_to, None);
    assert_eq!(untouched.status, Some(OrderStatus::Shipped));
  }
}
