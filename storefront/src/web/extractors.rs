// storefront/src/web/extractors.rs

//! Caller identity. Authentication happens at the gateway in front of this
//! service, which forwards the verified user id and role as headers.

use crate::errors::AppError;
use actix_web::{FromRequest, HttpRequest};
use fulfillment::{Principal, Role};
use futures_util::future::{ready, Ready};
use tracing::warn;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// The authenticated back-office user making the request.
#[derive(Debug, Clone)]
pub struct Actor(pub Principal);

impl Actor {
  pub fn principal(&self) -> &Principal {
    &self.0
  }
}

fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
  req
    .headers()
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

fn principal_from(req: &HttpRequest) -> Result<Principal, AppError> {
  let id = header(req, USER_ID_HEADER)
    .ok_or_else(|| AppError::Auth(format!("missing {} header", USER_ID_HEADER)))?;
  let role = header(req, USER_ROLE_HEADER)
    .ok_or_else(|| AppError::Auth(format!("missing {} header", USER_ROLE_HEADER)))?
    .parse::<Role>()
    .map_err(AppError::Auth)?;
  Ok(Principal::new(id, role))
}

impl FromRequest for Actor {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let result = principal_from(req).map(Actor);
    if let Err(e) = &result {
      warn!(path = %req.path(), error = %e, "Rejected request without a usable identity.");
    }
    ready(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::test::TestRequest;

  #[test]
  fn reads_identity_headers() {
    let req = TestRequest::default()
      .insert_header((USER_ID_HEADER, "w1"))
      .insert_header((USER_ROLE_HEADER, "Worker"))
      .to_http_request();
    assert_eq!(principal_from(&req).unwrap(), Principal::worker("w1"));
  }

  #[test]
  fn missing_or_unknown_role_is_unauthenticated() {
    let req = TestRequest::default().insert_header((USER_ID_HEADER, "w1")).to_http_request();
    assert!(matches!(principal_from(&req), Err(AppError::Auth(_))));

    let req = TestRequest::default()
      .insert_header((USER_ID_HEADER, "w1"))
      .insert_header((USER_ROLE_HEADER, "owner"))
      .to_http_request();
    assert!(matches!(principal_from(&req), Err(AppError::Auth(_))));
  }
}
