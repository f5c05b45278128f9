//! SAE identity resolution (§4.E): client-cert CN in TLS mode, else the
//! `X-SAE-ID` header, else the configured `ATTACHED_SAE_ID` as a last resort
//! ("direct cloud mode" — the KME has exactly one SAE wired to it). TLS
//! termination itself is out of scope here; in `USE_HTTPS` mode the CN is
//! read from the `X-SSL-Client-CN` header a terminating proxy is expected
//! to set, rather than this process doing certificate parsing itself.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use kme_core::errors::domain::DomainError;
use kme_core::AppError;

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct SaeIdentity(pub String);

impl FromRequest for SaeIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<actix_web::web::Data<AppState>>();

        if state.map(|s| s.config.use_https).unwrap_or(false) {
            if let Some(value) = header_value(req, "X-SSL-Client-CN") {
                return ready(Ok(SaeIdentity(value)));
            }
        }

        if let Some(value) = header_value(req, "X-SAE-ID") {
            return ready(Ok(SaeIdentity(value)));
        }

        if let Some(state) = state {
            return ready(Ok(SaeIdentity(state.config.attached_sae_id.clone())));
        }

        ready(Err(DomainError::unknown_sae(
            "no client certificate CN, X-SAE-ID header, or ATTACHED_SAE_ID fallback",
        )
        .into()))
    }
}

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}
