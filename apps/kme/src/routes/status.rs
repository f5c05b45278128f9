//! `GET /{slave_SAE}/status` (§4.E, §6). Byte sizes are converted to bits at
//! this boundary; internal config stays in bytes.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::extractors::SaeIdentity;
use crate::state::AppState;
use kme_core::AppError;

#[derive(Serialize)]
pub struct StatusResponse {
    source_kme_id: String,
    target_kme_id: String,
    master_sae_id: String,
    slave_sae_id: String,
    key_size_bits: u32,
    stored_key_count: usize,
    max_key_count: usize,
    max_key_per_request: usize,
    max_key_size_bits: u32,
    min_key_size_bits: u32,
}

pub async fn status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    master_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let slave_sae_id = path.into_inner();
    let master_sae_id = master_identity.0;

    let stored = state.key_store.get_keys(&master_sae_id, &slave_sae_id).await;

    Ok(HttpResponse::Ok().json(StatusResponse {
        source_kme_id: state.config.kme_id.clone(),
        target_kme_id: state.config.kme_id.clone(),
        master_sae_id,
        slave_sae_id,
        key_size_bits: (state.config.default_key_size_bytes * 8) as u32,
        stored_key_count: stored.len(),
        max_key_count: state.config.max_key_count,
        max_key_per_request: state.config.max_keys_per_request,
        max_key_size_bits: state.config.max_key_size_bits,
        min_key_size_bits: state.config.min_key_size_bits,
    }))
}
