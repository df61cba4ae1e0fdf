// tests/offer_tests.rs
mod common;

use common::*;
use fulfillment::model::{CustomerRef, PaymentMethod};
use fulfillment::store::{OfferStore, RedemptionLedger};
use fulfillment::{FulfillmentError, OfferDecision, OfferRejection, Redemption, ValidateOfferRequest};
use rust_decimal::Decimal;
use serial_test::serial;
use std::sync::atomic::Ordering;

fn validate_code(code: &str, subtotal: i64) -> ValidateOfferRequest {
  ValidateOfferRequest {
    offer_id: None,
    offer_code: Some(code.to_string()),
    subtotal: Decimal::from(subtotal),
    customer_email: Some("asha@example.com".to_string()),
    customer_id: None,
  }
}

#[tokio::test]
#[serial]
async fn only_superusers_create_offers_and_codes_are_unique() {
  let h = harness();
  let err = h.service.create_offer(percentage_offer("FEST20", 20), &admin()).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Authorization(_)));

  let offer = h.service.create_offer(percentage_offer("FEST20", 20), &superuser()).await.unwrap();
  assert_eq!(offer.used_count, 0);

  let err = h.service.create_offer(percentage_offer("fest20", 10), &superuser()).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Conflict(_)));

  let mut bad = percentage_offer("TOO-MUCH", 120);
  let err = h.service.create_offer(bad.clone(), &superuser()).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Validation(_)));
  bad.discount_value = Decimal::from(10);
  bad.valid_until = bad.valid_from;
  let err = h.service.create_offer(bad, &superuser()).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn percentage_discount_is_capped() {
  let h = harness();
  let mut new_offer = percentage_offer("BIG20", 20);
  new_offer.max_discount = Some(Decimal::from(500));
  let offer = h.service.create_offer(new_offer, &superuser()).await.unwrap();

  let decision = h.service.validate_offer(&validate_code("big20", 5000)).await.unwrap();
  assert_eq!(
    decision,
    OfferDecision::Accepted {
      offer_id: offer.id,
      discount: Decimal::from(500)
    }
  );
}

#[tokio::test]
#[serial]
async fn validation_does_not_consume_and_redeem_enforces_the_limit() {
  let h = harness();
  let mut new_offer = percentage_offer("ONCE", 10);
  new_offer.usage_limit = Some(1);
  let offer = h.service.create_offer(new_offer, &superuser()).await.unwrap();

  for _ in 0..3 {
    let decision = h.service.validate_offer(&validate_code("ONCE", 1000)).await.unwrap();
    assert!(matches!(decision, OfferDecision::Accepted { .. }));
  }

  let customer = CustomerRef::new(Some("asha@example.com".into()), None);
  assert_eq!(
    h.service.redeem_offer(offer.id, &customer, None).await.unwrap(),
    Redemption::Recorded
  );
  let err = h.service.redeem_offer(offer.id, &customer, None).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Conflict(_)));

  let stored = h.stores.offers.get(offer.id).await.unwrap().unwrap();
  assert_eq!(stored.used_count, 1);
  let decision = h.service.validate_offer(&validate_code("ONCE", 1000)).await.unwrap();
  assert_eq!(decision, OfferDecision::Rejected(OfferRejection::UsageLimitReached));
}

#[tokio::test]
#[serial]
async fn validate_needs_a_known_offer() {
  let h = harness();
  let mut req = validate_code("NOPE", 100);
  let err = h.service.validate_offer(&req).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::NotFound(_)));

  req.offer_code = None;
  let err = h.service.validate_offer(&req).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn checkout_applies_and_consumes_the_offer() {
  let h = harness();
  let mut new_offer = percentage_offer("WELCOME", 10);
  new_offer.one_time_per_user = true;
  let offer = h.service.create_offer(new_offer, &superuser()).await.unwrap();

  let mut req = new_order(PaymentMethod::Upi, vec![item("TEE", 2, 1000)]);
  req.offer_code = Some("WELCOME".to_string());
  let order = h.service.create_order(req.clone()).await.unwrap();
  assert_eq!(order.offer_id, Some(offer.id));
  assert_eq!(order.discount, Some(Decimal::from(200)));
  assert_eq!(order.total, Decimal::from(1850));
  assert!(h.sink.failures().is_empty());

  let stored = h.stores.offers.get(offer.id).await.unwrap().unwrap();
  assert_eq!(stored.used_count, 1);

  // Same customer, second checkout: the one-time offer is refused.
  let err = h.service.create_order(req).await.unwrap_err();
  match err {
    FulfillmentError::Validation(message) => assert_eq!(message, OfferRejection::AlreadyRedeemed.to_string()),
    other => panic!("unexpected error: {other}"),
  }
}

#[tokio::test]
#[serial]
async fn checkout_rejects_ineligible_customers() {
  let h = harness();
  let mut new_offer = percentage_offer("VIP", 15);
  new_offer.customer_emails = vec!["VIP@Example.com".to_string()];
  h.service.create_offer(new_offer, &superuser()).await.unwrap();

  let mut req = new_order(PaymentMethod::Upi, vec![item("TEE", 1, 1000)]);
  req.offer_code = Some("VIP".to_string());
  let err = h.service.create_order(req.clone()).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Validation(_)));

  req.customer.email = "vip@example.com".to_string();
  let order = h.service.create_order(req).await.unwrap();
  assert_eq!(order.discount, Some(Decimal::from(150)));
}

#[tokio::test]
#[serial]
async fn failed_consumption_leaves_nothing_half_written() {
  let h = harness();
  let mut new_offer = percentage_offer("FIRST", 10);
  new_offer.one_time_per_user = true;
  new_offer.usage_limit = Some(5);
  let offer = h.service.create_offer(new_offer, &superuser()).await.unwrap();

  h.flaky.fail_offer_consume.store(true, Ordering::SeqCst);
  let mut req = new_order(PaymentMethod::Upi, vec![item("TEE", 1, 1000)]);
  req.offer_code = Some("FIRST".to_string());
  let order = h.service.create_order(req).await.unwrap();
  assert_eq!(order.discount, Some(Decimal::from(100)));

  let failures = h.sink.failures();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].step, "redeem_offer");
  assert_eq!(failures[0].order_id, order.id);

  let customer = CustomerRef::new(Some("asha@example.com".into()), None);
  let key = customer.redemption_key().unwrap();
  assert!(!h.stores.redemptions.has_redeemed(offer.id, &key).await.unwrap());
  assert_eq!(h.stores.offers.get(offer.id).await.unwrap().unwrap().used_count, 0);

  // Retrying once the store is back consumes exactly one use.
  h.flaky.fail_offer_consume.store(false, Ordering::SeqCst);
  assert_eq!(
    h.service.redeem_offer(offer.id, &customer, Some(order.id)).await.unwrap(),
    Redemption::Recorded
  );
  assert_eq!(
    h.service.redeem_offer(offer.id, &customer, Some(order.id)).await.unwrap(),
    Redemption::AlreadyRedeemed
  );
  assert_eq!(h.stores.offers.get(offer.id).await.unwrap().unwrap().used_count, 1);
  assert!(h.stores.redemptions.has_redeemed(offer.id, &key).await.unwrap());
}

#[tokio::test]
#[serial]
async fn limit_refusal_records_no_redemption() {
  let h = harness();
  let mut new_offer = percentage_offer("SOLO", 10);
  new_offer.one_time_per_user = true;
  new_offer.usage_limit = Some(1);
  let offer = h.service.create_offer(new_offer, &superuser()).await.unwrap();

  let first = CustomerRef::new(Some("asha@example.com".into()), None);
  let second = CustomerRef::new(Some("ravi@example.com".into()), None);
  assert_eq!(h.service.redeem_offer(offer.id, &first, None).await.unwrap(), Redemption::Recorded);

  let err = h.service.redeem_offer(offer.id, &second, None).await.unwrap_err();
  assert!(matches!(err, FulfillmentError::Conflict(_)));
  let second_key = second.redemption_key().unwrap();
  assert!(!h.stores.redemptions.has_redeemed(offer.id, &second_key).await.unwrap());
  assert_eq!(h.stores.offers.get(offer.id).await.unwrap().unwrap().used_count, 1);
}
