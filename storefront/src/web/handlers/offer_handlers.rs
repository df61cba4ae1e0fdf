// storefront/src/web/handlers/offer_handlers.rs

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::Actor;
use actix_web::{web, HttpResponse};
use fulfillment::{NewOffer, OfferDecision, ValidateOfferRequest};
use serde_json::json;
use tracing::{debug, instrument};

/// Checks an offer against a cart without consuming it.
#[instrument(name = "handler::validate_offer", skip(app_state, payload))]
pub async fn validate_offer_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ValidateOfferRequest>,
) -> Result<HttpResponse, AppError> {
  match app_state.service.validate_offer(&payload).await? {
    OfferDecision::Accepted { offer_id, discount } => Ok(HttpResponse::Ok().json(json!({
      "valid": true,
      "offer_id": offer_id,
      "discount": discount,
    }))),
    OfferDecision::Rejected(reason) => {
      debug!(reason = %reason, "Offer rejected.");
      Ok(HttpResponse::UnprocessableEntity().json(json!({
        "valid": false,
        "reason": reason.to_string(),
      })))
    }
  }
}

#[instrument(name = "handler::create_offer", skip(app_state, payload, actor), fields(actor = %actor.0.id, code = %payload.code))]
pub async fn create_offer_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<NewOffer>,
  actor: Actor,
) -> Result<HttpResponse, AppError> {
  let offer = app_state.service.create_offer(payload.into_inner(), actor.principal()).await?;
  Ok(HttpResponse::Created().json(offer))
}
