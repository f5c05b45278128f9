//! `POST /register` (§6) — new SAE onboarding onto the per-user pool.

use actix_web::{web, HttpResponse};
use kme_core::errors::domain::DomainError;
use kme_core::AppError;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

fn default_initial_pool_size() -> usize {
    10
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub sae_id: String,
    pub user_email: String,
    #[serde(default = "default_initial_pool_size")]
    pub initial_pool_size: usize,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub sae_id: String,
    pub pool_size: usize,
    pub keys_generated: usize,
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    if body.sae_id.trim().is_empty() {
        return Err(DomainError::validation("sae_id must not be empty").into());
    }
    if body.initial_pool_size == 0 {
        return Err(DomainError::validation("initial_pool_size must be positive").into());
    }

    let result = state
        .local_key_manager
        .register_user(&body.sae_id, &body.user_email, body.initial_pool_size)
        .await?;

    Ok(HttpResponse::Created().json(RegisterResponse {
        success: true,
        sae_id: result.sae_id,
        pool_size: result.pool_size,
        keys_generated: result.keys_generated,
    }))
}
