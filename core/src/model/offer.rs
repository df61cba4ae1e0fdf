// fulfillment/src/model/offer.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "discount_type", rename_all = "snake_case"))]
pub enum DiscountType {
  Percentage,
  Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
  pub id: Uuid,
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  pub min_order_amount: Option<Decimal>,
  pub max_discount: Option<Decimal>,
  pub valid_from: DateTime<Utc>,
  pub valid_until: DateTime<Utc>,
  pub is_active: bool,
  pub usage_limit: Option<i64>,
  pub used_count: i64,
  pub one_time_per_user: bool,
  /// Lower-cased emails allowed to use the offer; empty means unrestricted.
  pub customer_emails: Vec<String>,
  /// Customer account ids allowed to use the offer; empty means unrestricted.
  pub customer_ids: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl Offer {
  pub fn restricts_customers(&self) -> bool {
    !self.customer_emails.is_empty() || !self.customer_ids.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferDraft {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  pub min_order_amount: Option<Decimal>,
  pub max_discount: Option<Decimal>,
  pub valid_from: DateTime<Utc>,
  pub valid_until: DateTime<Utc>,
  pub is_active: bool,
  pub usage_limit: Option<i64>,
  pub one_time_per_user: bool,
  pub customer_emails: Vec<String>,
  pub customer_ids: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl OfferDraft {
  pub fn into_offer(self, id: Uuid) -> Offer {
    Offer {
      id,
      code: self.code,
      discount_type: self.discount_type,
      discount_value: self.discount_value,
      min_order_amount: self.min_order_amount,
      max_discount: self.max_discount,
      valid_from: self.valid_from,
      valid_until: self.valid_until,
      is_active: self.is_active,
      usage_limit: self.usage_limit,
      used_count: 0,
      one_time_per_user: self.one_time_per_user,
      customer_emails: self.customer_emails,
      customer_ids: self.customer_ids,
      created_at: self.created_at,
    }
  }
}

/// Offer creation request. Eligibility may be given as a single value or a
/// list for both emails and customer ids; they are merged.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
  pub code: String,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  #[serde(default)]
  pub min_order_amount: Option<Decimal>,
  #[serde(default)]
  pub max_discount: Option<Decimal>,
  pub valid_from: DateTime<Utc>,
  pub valid_until: DateTime<Utc>,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default)]
  pub usage_limit: Option<i64>,
  #[serde(default)]
  pub one_time_per_user: bool,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub customer_emails: Vec<String>,
  #[serde(default)]
  pub customer_id: Option<String>,
  #[serde(default)]
  pub customer_ids: Vec<String>,
}

fn default_active() -> bool {
  true
}

impl NewOffer {
  pub fn eligible_emails(&self) -> Vec<String> {
    let mut emails: Vec<String> = self
      .customer_email
      .iter()
      .chain(self.customer_emails.iter())
      .map(|e| normalize_email(e))
      .filter(|e| !e.is_empty())
      .collect();
    emails.sort();
    emails.dedup();
    emails
  }

  pub fn eligible_ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self
      .customer_id
      .iter()
      .chain(self.customer_ids.iter())
      .map(|id| id.trim().to_string())
      .filter(|id| !id.is_empty())
      .collect();
    ids.sort();
    ids.dedup();
    ids
  }
}

pub(crate) fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

/// Who is asking for a discount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub id: Option<String>,
}

impl CustomerRef {
  pub fn new(email: Option<String>, id: Option<String>) -> Self {
    Self { email, id }
  }

  pub fn normalized_email(&self) -> Option<String> {
    self.email.as_deref().map(normalize_email).filter(|e| !e.is_empty())
  }

  /// Key under which per-customer redemptions are recorded: the account id
  /// when known, otherwise the normalized email.
  pub fn redemption_key(&self) -> Option<String> {
    self
      .id
      .as_deref()
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .map(|id| format!("id:{}", id))
      .or_else(|| self.normalized_email().map(|e| format!("email:{}", e)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn redemption_key_prefers_account_id() {
    let both = CustomerRef::new(Some("A@Example.com".into()), Some("cust-1".into()));
    assert_eq!(both.redemption_key().as_deref(), Some("id:cust-1"));

    let email_only = CustomerRef::new(Some(" A@Example.com ".into()), None);
    assert_eq!(email_only.redemption_key().as_deref(), Some("email:a@example.com"));

    assert_eq!(CustomerRef::default().redemption_key(), None);
  }
}
