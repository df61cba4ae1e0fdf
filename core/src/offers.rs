// fulfillment/src/offers.rs

//! Discount offer evaluation.
//!
//! Evaluation is side-effect free and can be repeated as often as the
//! checkout page likes. Consumption (`OfferValidator::redeem`) is a separate
//! call made once, after an order has been placed.

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{CustomerRef, DiscountType, NewOffer, Offer, OfferDraft, Principal};
use crate::store::{OfferConsumption, OfferStore, RedemptionLedger};
use crate::workflow::access;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const DISCOUNT_DECIMAL_PLACES: u32 = 2;

/// Why an offer was refused. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferRejection {
  Inactive,
  NotStarted,
  Expired,
  UsageLimitReached,
  CustomerRequired,
  AlreadyRedeemed,
  NotEligible,
  BelowMinimum { minimum: Decimal },
}

impl fmt::Display for OfferRejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      OfferRejection::Inactive => f.write_str("This offer is not active"),
      OfferRejection::NotStarted => f.write_str("This offer is not valid yet"),
      OfferRejection::Expired => f.write_str("This offer has expired"),
      OfferRejection::UsageLimitReached => f.write_str("This offer has reached its usage limit"),
      OfferRejection::CustomerRequired => f.write_str("Please sign in or provide your email to use this offer"),
      OfferRejection::AlreadyRedeemed => f.write_str("You have already used this offer"),
      OfferRejection::NotEligible => f.write_str("This offer is not available for your account"),
      OfferRejection::BelowMinimum { minimum } => {
        write!(f, "A minimum order amount of {} is required for this offer", minimum)
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferDecision {
  Accepted { offer_id: Uuid, discount: Decimal },
  Rejected(OfferRejection),
}

/// Outcome of the consumption step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
  Recorded,
  /// This customer's redemption was already on record; nothing changed.
  AlreadyRedeemed,
}

/// How the caller identifies the offer in a validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferLookup {
  Id(Uuid),
  Code(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateOfferRequest {
  #[serde(default)]
  pub offer_id: Option<Uuid>,
  #[serde(default)]
  pub offer_code: Option<String>,
  pub subtotal: Decimal,
  #[serde(default)]
  pub customer_email: Option<String>,
  #[serde(default)]
  pub customer_id: Option<String>,
}

impl ValidateOfferRequest {
  pub fn lookup(&self) -> FulfillmentResult<OfferLookup> {
    match (&self.offer_id, self.offer_code.as_deref().map(str::trim)) {
      (Some(id), _) => Ok(OfferLookup::Id(*id)),
      (None, Some(code)) if !code.is_empty() => Ok(OfferLookup::Code(code.to_string())),
      _ => Err(FulfillmentError::Validation("offer_id or offer_code is required".to_string())),
    }
  }

  pub fn customer(&self) -> CustomerRef {
    CustomerRef::new(self.customer_email.clone(), self.customer_id.clone())
  }
}

/// Discount for `subtotal`, clamped to `max_discount` (percentage) and to
/// the subtotal itself, rounded half-up to two places.
pub fn compute_discount(offer: &Offer, subtotal: Decimal) -> Decimal {
  let subtotal = subtotal.max(Decimal::ZERO);
  let raw = match offer.discount_type {
    DiscountType::Percentage => {
      let pct = subtotal * offer.discount_value / Decimal::ONE_HUNDRED;
      match offer.max_discount {
        Some(cap) => pct.min(cap),
        None => pct,
      }
    }
    DiscountType::Fixed => offer.discount_value,
  };
  raw
    .min(subtotal)
    .max(Decimal::ZERO)
    .round_dp_with_strategy(DISCOUNT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Runs the checks in their fixed order; the first failure wins.
///
/// `already_redeemed` is the answer of the redemption ledger for this
/// customer and is only consulted for one-time offers.
pub fn evaluate_offer(
  offer: &Offer,
  subtotal: Decimal,
  customer: &CustomerRef,
  already_redeemed: bool,
  now: DateTime<Utc>,
) -> Result<Decimal, OfferRejection> {
  if !offer.is_active {
    return Err(OfferRejection::Inactive);
  }
  if now < offer.valid_from {
    return Err(OfferRejection::NotStarted);
  }
  if now > offer.valid_until {
    return Err(OfferRejection::Expired);
  }
  if let Some(limit) = offer.usage_limit {
    if offer.used_count >= limit {
      return Err(OfferRejection::UsageLimitReached);
    }
  }
  if offer.one_time_per_user {
    if customer.redemption_key().is_none() {
      return Err(OfferRejection::CustomerRequired);
    }
    if already_redeemed {
      return Err(OfferRejection::AlreadyRedeemed);
    }
  }
  if offer.restricts_customers() && !is_eligible(offer, customer) {
    return Err(OfferRejection::NotEligible);
  }
  if let Some(minimum) = offer.min_order_amount {
    if subtotal < minimum {
      return Err(OfferRejection::BelowMinimum { minimum });
    }
  }
  Ok(compute_discount(offer, subtotal))
}

fn is_eligible(offer: &Offer, customer: &CustomerRef) -> bool {
  let email_match = customer
    .normalized_email()
    .is_some_and(|email| offer.customer_emails.iter().any(|allowed| allowed == &email));
  let id_match = customer
    .id
    .as_deref()
    .map(str::trim)
    .is_some_and(|id| offer.customer_ids.iter().any(|allowed| allowed == id));
  email_match || id_match
}

pub struct OfferValidator {
  offers: Arc<dyn OfferStore>,
  ledger: Arc<dyn RedemptionLedger>,
}

impl OfferValidator {
  pub fn new(offers: Arc<dyn OfferStore>, ledger: Arc<dyn RedemptionLedger>) -> Self {
    Self { offers, ledger }
  }

  pub async fn find(&self, lookup: &OfferLookup) -> FulfillmentResult<Offer> {
    let found = match lookup {
      OfferLookup::Id(id) => self.offers.get(*id).await?,
      OfferLookup::Code(code) => self.offers.get_by_code(code).await?,
    };
    found.ok_or_else(|| match lookup {
      OfferLookup::Id(id) => FulfillmentError::NotFound(format!("offer '{}'", id)),
      OfferLookup::Code(code) => FulfillmentError::NotFound(format!("offer code '{}'", code)),
    })
  }

  /// Handles `POST /offers/validate`.
  #[instrument(name = "OfferValidator::validate", skip(self, request), fields(subtotal = %request.subtotal), err(Display))]
  pub async fn validate(&self, request: &ValidateOfferRequest) -> FulfillmentResult<OfferDecision> {
    if request.subtotal < Decimal::ZERO {
      return Err(FulfillmentError::Validation("subtotal must not be negative".to_string()));
    }
    let offer = self.find(&request.lookup()?).await?;
    self.evaluate(&offer, request.subtotal, &request.customer(), Utc::now()).await
  }

  pub async fn evaluate(
    &self,
    offer: &Offer,
    subtotal: Decimal,
    customer: &CustomerRef,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<OfferDecision> {
    let already_redeemed = match (offer.one_time_per_user, customer.redemption_key()) {
      (true, Some(key)) => self.ledger.has_redeemed(offer.id, &key).await?,
      _ => false,
    };
    let decision = match evaluate_offer(offer, subtotal, customer, already_redeemed, now) {
      Ok(discount) => OfferDecision::Accepted {
        offer_id: offer.id,
        discount,
      },
      Err(rejection) => {
        tracing::debug!(offer_code = %offer.code, reason = %rejection, "Offer rejected.");
        OfferDecision::Rejected(rejection)
      }
    };
    Ok(decision)
  }

  /// Consumes one use of the offer for `customer`. Call once per placed order.
  #[instrument(name = "OfferValidator::redeem", skip(self, customer), fields(offer_id = %offer_id), err(Display))]
  pub async fn redeem(&self, offer_id: Uuid, customer: &CustomerRef, order_id: Option<Uuid>) -> FulfillmentResult<Redemption> {
    let offer = self.find(&OfferLookup::Id(offer_id)).await?;

    let key = if offer.one_time_per_user {
      Some(customer.redemption_key().ok_or_else(|| {
        FulfillmentError::Validation("customer email or id is required to redeem this offer".to_string())
      })?)
    } else {
      None
    };

    match self.offers.consume(offer.id, key.as_deref(), order_id).await? {
      OfferConsumption::Consumed => {}
      OfferConsumption::AlreadyRedeemed => return Ok(Redemption::AlreadyRedeemed),
      OfferConsumption::LimitReached => {
        return Err(FulfillmentError::Conflict(format!(
          "offer '{}' reached its usage limit",
          offer.code
        )));
      }
    }
    Ok(Redemption::Recorded)
  }

  #[instrument(name = "OfferValidator::create_offer", skip(self, new_offer, principal), fields(code = %new_offer.code), err(Display))]
  pub async fn create_offer(&self, new_offer: NewOffer, principal: &Principal) -> FulfillmentResult<Offer> {
    access::require_superuser(principal, "create offers")?;

    let code = new_offer.code.trim().to_string();
    if code.is_empty() {
      return Err(FulfillmentError::Validation("offer code is required".to_string()));
    }
    if new_offer.discount_value <= Decimal::ZERO {
      return Err(FulfillmentError::Validation("discount_value must be positive".to_string()));
    }
    if new_offer.discount_type == DiscountType::Percentage && new_offer.discount_value > Decimal::ONE_HUNDRED {
      return Err(FulfillmentError::Validation(
        "percentage discount cannot exceed 100".to_string(),
      ));
    }
    if new_offer.valid_from >= new_offer.valid_until {
      return Err(FulfillmentError::Validation(
        "valid_from must be before valid_until".to_string(),
      ));
    }
    if new_offer.usage_limit.is_some_and(|limit| limit < 1) {
      return Err(FulfillmentError::Validation("usage_limit must be at least 1".to_string()));
    }
    if new_offer.max_discount.is_some_and(|cap| cap <= Decimal::ZERO)
      || new_offer.min_order_amount.is_some_and(|min| min < Decimal::ZERO)
    {
      return Err(FulfillmentError::Validation(
        "max_discount must be positive and min_order_amount non-negative".to_string(),
      ));
    }

    let draft = OfferDraft {
      customer_emails: new_offer.eligible_emails(),
      customer_ids: new_offer.eligible_ids(),
      code,
      discount_type: new_offer.discount_type,
      discount_value: new_offer.discount_value,
      min_order_amount: new_offer.min_order_amount,
      max_discount: new_offer.max_discount,
      valid_from: new_offer.valid_from,
      valid_until: new_offer.valid_until,
      is_active: new_offer.is_active,
      usage_limit: new_offer.usage_limit,
      one_time_per_user: new_offer.one_time_per_user,
      created_at: Utc::now(),
    };
    Ok(self.offers.insert(draft).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn offer(discount_type: DiscountType, value: i64) -> Offer {
    let now = Utc::now();
    Offer {
      id: Uuid::new_v4(),
      code: "SAVE".into(),
      discount_type,
      discount_value: Decimal::from(value),
      min_order_amount: None,
      max_discount: None,
      valid_from: now - Duration::days(1),
      valid_until: now + Duration::days(1),
      is_active: true,
      usage_limit: None,
      used_count: 0,
      one_time_per_user: false,
      customer_emails: vec![],
      customer_ids: vec![],
      created_at: now,
    }
  }

  fn anyone() -> CustomerRef {
    CustomerRef::new(Some("buyer@example.com".into()), None)
  }

  #[test]
  fn percentage_is_capped_by_max_discount() {
    let mut o = offer(DiscountType::Percentage, 20);
    o.max_discount = Some(Decimal::from(500));
    assert_eq!(compute_discount(&o, Decimal::from(5000)), Decimal::from(500));
    assert_eq!(compute_discount(&o, Decimal::from(1000)), Decimal::from(200));
  }

  #[test]
  fn fixed_never_exceeds_subtotal() {
    let o = offer(DiscountType::Fixed, 300);
    assert_eq!(compute_discount(&o, Decimal::from(120)), Decimal::from(120));
    assert_eq!(compute_discount(&o, Decimal::from(1000)), Decimal::from(300));
    assert_eq!(compute_discount(&o, Decimal::ZERO), Decimal::ZERO);
  }

  #[test]
  fn rounds_half_up_to_two_places() {
    let mut o = offer(DiscountType::Percentage, 0);
    o.discount_value = Decimal::new(125, 1); // 12.5%
    // 12.5% of 0.20 = 0.025 -> 0.03
    assert_eq!(compute_discount(&o, Decimal::new(20, 2)), Decimal::new(3, 2));
    // 12.5% of 99.99 = 12.49875 -> 12.50
    assert_eq!(compute_discount(&o, Decimal::new(9999, 2)), Decimal::new(1250, 2));
  }

  #[test]
  fn discount_bounds_hold_over_a_grid() {
    for value in [1, 5, 33, 50, 100] {
      for cap in [None, Some(Decimal::from(7)), Some(Decimal::from(10_000))] {
        let mut o = offer(DiscountType::Percentage, value);
        o.max_discount = cap;
        for subtotal in [0, 1, 19, 250, 99_999] {
          let subtotal = Decimal::from(subtotal);
          let d = compute_discount(&o, subtotal);
          assert!(d >= Decimal::ZERO && d <= subtotal);
          if let Some(cap) = cap {
            assert!(d <= cap);
          }
        }
      }
    }
  }

  #[test]
  fn usage_limit_reached_is_rejected() {
    let mut o = offer(DiscountType::Fixed, 10);
    o.usage_limit = Some(1);
    o.used_count = 1;
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &anyone(), false, Utc::now()),
      Err(OfferRejection::UsageLimitReached)
    );
  }

  #[test]
  fn checks_run_in_fixed_order() {
    let mut o = offer(DiscountType::Fixed, 10);
    o.is_active = false;
    o.valid_until = Utc::now() - Duration::days(1);
    o.min_order_amount = Some(Decimal::from(1000));
    // Inactive wins over expired and minimum amount.
    assert_eq!(
      evaluate_offer(&o, Decimal::from(1), &anyone(), false, Utc::now()),
      Err(OfferRejection::Inactive)
    );

    o.is_active = true;
    assert_eq!(
      evaluate_offer(&o, Decimal::from(1), &anyone(), false, Utc::now()),
      Err(OfferRejection::Expired)
    );

    o.valid_until = Utc::now() + Duration::days(1);
    o.customer_emails = vec!["vip@example.com".into()];
    // Eligibility is checked before the minimum amount.
    assert_eq!(
      evaluate_offer(&o, Decimal::from(1), &anyone(), false, Utc::now()),
      Err(OfferRejection::NotEligible)
    );

    let vip = CustomerRef::new(Some("VIP@example.com".into()), None);
    assert_eq!(
      evaluate_offer(&o, Decimal::from(1), &vip, false, Utc::now()),
      Err(OfferRejection::BelowMinimum {
        minimum: Decimal::from(1000)
      })
    );
    assert_eq!(
      evaluate_offer(&o, Decimal::from(1000), &vip, false, Utc::now()),
      Ok(Decimal::from(10))
    );
  }

  #[test]
  fn not_started_offer_is_rejected() {
    let mut o = offer(DiscountType::Fixed, 10);
    o.valid_from = Utc::now() + Duration::hours(1);
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &anyone(), false, Utc::now()),
      Err(OfferRejection::NotStarted)
    );
  }

  #[test]
  fn one_time_offer_needs_identity_and_fresh_customer() {
    let mut o = offer(DiscountType::Fixed, 10);
    o.one_time_per_user = true;
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &CustomerRef::default(), false, Utc::now()),
      Err(OfferRejection::CustomerRequired)
    );
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &anyone(), true, Utc::now()),
      Err(OfferRejection::AlreadyRedeemed)
    );
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &anyone(), false, Utc::now()),
      Ok(Decimal::from(10))
    );
  }

  #[test]
  fn eligibility_by_customer_id() {
    let mut o = offer(DiscountType::Fixed, 10);
    o.customer_ids = vec!["cust-9".into()];
    let stranger = CustomerRef::new(None, Some("cust-1".into()));
    let member = CustomerRef::new(None, Some("cust-9".into()));
    assert_eq!(
      evaluate_offer(&o, Decimal::from(100), &stranger, false, Utc::now()),
      Err(OfferRejection::NotEligible)
    );
    assert!(evaluate_offer(&o, Decimal::from(100), &member, false, Utc::now()).is_ok());
  }
}
