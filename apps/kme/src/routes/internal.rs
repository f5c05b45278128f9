//! KME-to-KME internal endpoints (§6): served only by the master role for
//! the pool-reservation pair, by either role for key-exchange mirroring.

use actix_web::{web, HttpResponse};
use kme_core::errors::domain::DomainError;
use kme_core::model::KeyRecord;
use kme_core::wire::{decode, WireKey};
use kme_core::AppError;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct GetSharedKeyRequest {
    pub kme_id: String,
    pub count: usize,
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Serialize)]
pub struct GetSharedKeyResponse {
    pub keys: Vec<WireKey>,
    pub count: usize,
    pub kme_id: String,
}

pub async fn get_shared_key(
    state: web::Data<AppState>,
    body: web::Json<GetSharedKeyRequest>,
) -> Result<HttpResponse, AppError> {
    let Some(pool) = &state.shared_pool else {
        return Err(DomainError::forbidden("get_shared_key is master-only").into());
    };

    let timeout = body
        .timeout
        .map(std::time::Duration::from_secs_f64)
        .unwrap_or(state.config.acquire_timeout);
    let keys = pool.get_keys(body.count, &body.kme_id, timeout, false).await;

    Ok(HttpResponse::Ok().json(GetSharedKeyResponse {
        count: keys.len(),
        kme_id: body.kme_id.clone(),
        keys: keys.iter().map(WireKey::from).collect(),
    }))
}

#[derive(Deserialize)]
pub struct GetReservedKeyRequest {
    pub key_id: String,
    pub kme_id: String,
    #[serde(default)]
    pub remove: bool,
}

#[derive(Serialize)]
pub struct GetReservedKeyResponse {
    pub key: WireKey,
    pub key_id: String,
    pub consumed: bool,
}

pub async fn get_reserved_key(
    state: web::Data<AppState>,
    body: web::Json<GetReservedKeyRequest>,
) -> Result<HttpResponse, AppError> {
    let Some(pool) = &state.shared_pool else {
        return Err(DomainError::forbidden("get_reserved_key is master-only").into());
    };

    match pool.get_key_by_id(&body.key_id, &body.kme_id, body.remove).await {
        Some(key) => Ok(HttpResponse::Ok().json(GetReservedKeyResponse {
            key: WireKey::from(&key),
            key_id: key.key_id,
            consumed: body.remove,
        })),
        None => Err(DomainError::not_found(
            kme_core::errors::domain::NotFoundKind::Key,
            &body.key_id,
        )
        .into()),
    }
}

#[derive(Deserialize)]
pub struct KeyExchangeRequest {
    pub master_sae_id: String,
    pub slave_sae_id: String,
    pub keys: Vec<WireKey>,
}

fn decode_wire_keys(keys: Vec<WireKey>) -> Result<Vec<KeyRecord>, AppError> {
    keys.into_iter()
        .map(|w| decode(&w.key).map(|bytes| KeyRecord::new(w.key_id, bytes)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Into::into)
}

pub async fn kme_key_exchange(
    state: web::Data<AppState>,
    body: web::Json<KeyExchangeRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let keys = decode_wire_keys(body.keys)?;
    state
        .key_store
        .append_keys(&body.master_sae_id, &body.slave_sae_id, keys, false)
        .await;
    Ok(HttpResponse::Ok().finish())
}

pub async fn remove_kme_key(
    state: web::Data<AppState>,
    body: web::Json<KeyExchangeRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let ids: Vec<String> = body.keys.into_iter().map(|w| w.key_id).collect();
    state
        .key_store
        .remove_keys(&body.master_sae_id, &body.slave_sae_id, &ids, false)
        .await;
    Ok(HttpResponse::Ok().finish())
}
