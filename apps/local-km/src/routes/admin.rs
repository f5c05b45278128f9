//! `POST /{sae_id}/refill` and `GET /pools` (§6) — Local KM admin surface.

use actix_web::{web, HttpResponse};
use kme_core::AppError;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct RefillRequest {
    pub keys_to_add: Option<usize>,
}

#[derive(Serialize)]
pub struct RefillResponse {
    pub success: bool,
    pub keys_added: usize,
    pub available_after: u64,
}

pub async fn refill(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<RefillRequest>>,
) -> Result<HttpResponse, AppError> {
    let sae_id = path.into_inner();
    let keys_to_add = body.and_then(|b| b.into_inner().keys_to_add);

    let (keys_added, available_after) = state.local_key_manager.refill(&sae_id, keys_to_add).await?;

    Ok(HttpResponse::Ok().json(RefillResponse {
        success: true,
        keys_added,
        available_after,
    }))
}

#[derive(Serialize)]
pub struct PoolSummary {
    pub total_users: usize,
    pub low_pools: usize,
}

#[derive(Serialize)]
pub struct PoolEntry {
    pub sae_id: String,
    pub stored_key_count: u64,
    pub max_key_count: i64,
    pub is_low: bool,
}

#[derive(Serialize)]
pub struct PoolsResponse {
    pub pools: Vec<PoolEntry>,
    pub summary: PoolSummary,
}

pub async fn pools(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let statuses = state.local_key_manager.list_pools().await?;
    let low_pools = statuses.iter().filter(|s| s.is_low).count();
    let pools = statuses
        .into_iter()
        .map(|s| PoolEntry {
            sae_id: s.sae_id,
            stored_key_count: s.stored_key_count,
            max_key_count: s.max_key_count,
            is_low: s.is_low,
        })
        .collect::<Vec<_>>();

    Ok(HttpResponse::Ok().json(PoolsResponse {
        summary: PoolSummary {
            total_users: pools.len(),
            low_pools,
        },
        pools,
    }))
}
