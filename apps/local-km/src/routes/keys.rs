//! ETSI-shaped surface on the per-user pool (§4.G, §6): `status`, `enc_keys`,
//! `dec_keys`, mounted at `/api/v1/user-keys` the same shape §4.E uses.

use actix_web::{web, HttpRequest, HttpResponse};
use kme_core::errors::domain::DomainError;
use kme_core::wire::{KeyIdRef, WireKey};
use kme_core::AppError;
use serde::{Deserialize, Serialize};

use crate::extractors::SaeIdentity;
use crate::services::per_user_pool::KEY_SIZE_BYTES;
use crate::state::AppState;

fn default_number() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct EncKeysBody {
    #[serde(default = "default_number")]
    pub number: usize,
    pub size: Option<u32>,
}

impl Default for EncKeysBody {
    fn default() -> Self {
        Self {
            number: default_number(),
            size: None,
        }
    }
}

#[derive(Serialize)]
pub struct EncKeysResponse {
    pub keys: Vec<WireKey>,
}

pub async fn enc_keys(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<EncKeysBody>>,
    sender_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    do_enc_keys(state, path, body.map(|b| b.into_inner()).unwrap_or_default(), sender_identity).await
}

pub async fn enc_keys_query(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<EncKeysBody>,
    sender_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    do_enc_keys(state, path, query.into_inner(), sender_identity).await
}

async fn do_enc_keys(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: EncKeysBody,
    sender_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let receiver_sae_id = path.into_inner();
    let sender_sae_id = sender_identity.0;
    let size_bits = body.size.unwrap_or((KEY_SIZE_BYTES * 8) as u32);

    let delivered = state
        .local_key_manager
        .get_enc_keys(&sender_sae_id, &receiver_sae_id, body.number, size_bits)
        .await?;

    Ok(HttpResponse::Ok().json(EncKeysResponse {
        keys: delivered
            .iter()
            .map(|k| WireKey {
                key_id: k.key_id.clone(),
                key: kme_core::wire::encode(&k.key_material),
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct DecKeysBody {
    #[serde(rename = "key_IDs", default)]
    pub key_ids: Vec<KeyIdRef>,
}

#[derive(Serialize)]
pub struct DecKeysResponse {
    pub keys: Vec<WireKey>,
}

pub async fn dec_keys(
    state: web::Data<AppState>,
    body: web::Json<DecKeysBody>,
    caller_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let ids: Vec<String> = body.into_inner().key_ids.into_iter().map(|r| r.key_id).collect();
    do_dec_keys(state, ids, caller_identity).await
}

pub async fn dec_keys_query(
    state: web::Data<AppState>,
    req: HttpRequest,
    caller_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let ids = parse_key_id_query(req.query_string());
    do_dec_keys(state, ids, caller_identity).await
}

fn parse_key_id_query(query: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key != "key_ID" {
            continue;
        }
        for part in value.replace("%2C", ",").replace('+', " ").split(',') {
            if !part.is_empty() {
                ids.push(part.to_string());
            }
        }
    }
    ids
}

async fn do_dec_keys(
    state: web::Data<AppState>,
    key_ids: Vec<String>,
    caller_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    if key_ids.is_empty() {
        return Err(DomainError::validation("key_IDs must not be empty").into());
    }

    let found = state
        .local_key_manager
        .get_dec_keys(&caller_identity.0, &key_ids)
        .await?;

    Ok(HttpResponse::Ok().json(DecKeysResponse {
        keys: found
            .iter()
            .map(|k| WireKey {
                key_id: k.key_id.clone(),
                key: kme_core::wire::encode(&k.key_material),
            })
            .collect(),
    }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    source_kme_id: String,
    sae_id: String,
    stored_key_count: u64,
    max_key_count: i64,
    key_size_bits: u32,
    is_low: bool,
}

pub async fn status(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let sae_id = path.into_inner();
    let status = state.local_key_manager.get_status(&sae_id).await?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        source_kme_id: status.source_kme_id,
        sae_id: status.sae_id,
        stored_key_count: status.stored_key_count,
        max_key_count: status.max_key_count,
        key_size_bits: status.key_size_bits,
        is_low: status.is_low,
    }))
}
