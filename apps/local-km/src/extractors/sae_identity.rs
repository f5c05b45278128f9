//! SAE identity resolution for the ETSI-shaped surface (§4.E, reused by G):
//! the `X-SAE-ID` header a terminating proxy or direct caller sets. TLS
//! termination itself is out of scope here, same as the KME binary.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use kme_core::errors::domain::DomainError;
use kme_core::AppError;

#[derive(Debug, Clone)]
pub struct SaeIdentity(pub String);

impl FromRequest for SaeIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match header_value(req, "X-SAE-ID") {
            Some(value) => ready(Ok(SaeIdentity(value))),
            None => ready(Err(DomainError::unknown_sae("missing X-SAE-ID header").into())),
        }
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}
