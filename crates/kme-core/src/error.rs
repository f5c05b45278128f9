//! HTTP-facing error type. Converts a [`DomainError`] into the status code and
//! Problem-Details-shaped body described in §7.

use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::errors::domain::DomainError;
use crate::errors::error_code::ErrorCode;
use crate::trace_ctx;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub trace_id: String,
}

#[derive(Error, Debug, Clone)]
#[error("{detail}")]
pub struct AppError {
    pub code: ErrorCode,
    pub detail: String,
    pub status: StatusCode,
    /// Present on [`ErrorCode::PartialResult`] so handlers can still surface
    /// whatever was delivered alongside the 206 response.
    pub partial_note: Option<String>,
}

impl AppError {
    pub fn new(code: ErrorCode, status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            status,
            detail: detail.into(),
            partial_note: None,
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    fn title(&self) -> &'static str {
        match self.code {
            ErrorCode::ValidationError | ErrorCode::BadRequest => "Bad Request",
            ErrorCode::UnknownSae => "Unknown SAE",
            ErrorCode::NotFound => "Not Found",
            ErrorCode::PartialResult => "Partial Content",
            ErrorCode::KeysUnavailable => "Keys Unavailable",
            ErrorCode::Busy => "Sync Already Running",
            ErrorCode::AlreadyExists => "Already Exists",
            ErrorCode::InsufficientKeys => "Insufficient Keys",
            ErrorCode::Forbidden => "Forbidden",
            ErrorCode::TransportError => "Upstream Transport Error",
            ErrorCode::ConfigError => "Configuration Error",
            ErrorCode::Internal => "Internal Server Error",
            ErrorCode::DbError => "Database Error",
        }
    }
}

/// Maps each [`DomainError`] kind onto the HTTP status codes fixed by §7's
/// "User-visible behaviour at the HTTP boundary" table.
impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let code = err.code();
        let status = match &err {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::UnknownSae(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(..) => StatusCode::NOT_FOUND,
            DomainError::PartialResult { .. } => StatusCode::PARTIAL_CONTENT,
            DomainError::KeysUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::Conflict(crate::errors::domain::ConflictKind::SyncInProgress, _) => {
                StatusCode::CONFLICT
            }
            DomainError::Conflict(_, _) => StatusCode::BAD_REQUEST,
            DomainError::InsufficientKeys { .. } => StatusCode::BAD_REQUEST,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Transport(_) => StatusCode::BAD_GATEWAY,
            DomainError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DomainError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(code, status, err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        let trace_id = trace_ctx::current();
        if self.status != StatusCode::SERVICE_UNAVAILABLE && self.status.is_server_error() {
            tracing::error!(code = %self.code, trace_id = %trace_id, "{}", self.detail);
        } else {
            tracing::warn!(code = %self.code, trace_id = %trace_id, "{}", self.detail);
        }

        let body = ProblemDetails {
            type_: format!("https://etsi-qkd-014.local/errors/{}", self.code.as_str().to_lowercase()),
            title: self.title().to_string(),
            status: self.status.as_u16(),
            detail: self.detail.clone(),
            code: self.code.as_str().to_string(),
            trace_id: trace_id.to_string(),
        };

        HttpResponse::build(self.status)
            .content_type("application/problem+json")
            .insert_header(("x-trace-id", trace_id.to_string()))
            .json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sae_maps_to_bad_request() {
        let err: AppError = DomainError::unknown_sae("no peer bound").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, ErrorCode::UnknownSae);
    }

    #[test]
    fn keys_unavailable_maps_to_503() {
        let err: AppError = DomainError::keys_unavailable("pool drained").into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err: AppError = DomainError::not_found(
            crate::errors::domain::NotFoundKind::Key,
            "qk_123 not present",
        )
        .into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
