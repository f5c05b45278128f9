//! `enc_keys` / `dec_keys` / `mark_consumed` (§4.E).

use actix_web::{web, HttpRequest, HttpResponse};
use kme_core::errors::domain::{DomainError, NotFoundKind};
use kme_core::model::KeyRecord;
use kme_core::wire::{KeyIdRef, WireKey};
use kme_core::AppError;
use serde::{Deserialize, Serialize};

use crate::extractors::SaeIdentity;
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
    master_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    do_enc_keys(state, path, body.map(|b| b.into_inner()).unwrap_or_default(), master_identity).await
}

pub async fn enc_keys_query(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<EncKeysBody>,
    master_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    do_enc_keys(state, path, query.into_inner(), master_identity).await
}

async fn do_enc_keys(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: EncKeysBody,
    master_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let slave_sae_id = path.into_inner();
    let master_sae_id = master_identity.0;
    let cfg = &state.config;

    let size_bits = body.size.unwrap_or((cfg.default_key_size_bytes * 8) as u32);

    if body.number == 0 || body.number > cfg.max_keys_per_request {
        return Err(DomainError::validation(format!(
            "number must be between 1 and {}",
            cfg.max_keys_per_request
        ))
        .into());
    }
    if size_bits < cfg.min_key_size_bits || size_bits > cfg.max_key_size_bits {
        return Err(DomainError::validation(format!(
            "size_bits must be between {} and {}",
            cfg.min_key_size_bits, cfg.max_key_size_bits
        ))
        .into());
    }

    let existing = state.key_store.get_keys(&master_sae_id, &slave_sae_id).await;
    if existing.len() + body.number > cfg.max_key_count {
        return Err(DomainError::validation(format!(
            "request would exceed max_key_count ({})",
            cfg.max_key_count
        ))
        .into());
    }

    let mut fetched = Vec::with_capacity(body.number);
    for _ in 0..body.number {
        let key = state
            .key_store
            .get_new_key(size_bits, cfg.acquire_timeout, false)
            .await?;
        fetched.push(key);
    }

    state
        .key_store
        .append_keys(&master_sae_id, &slave_sae_id, fetched.clone(), true)
        .await;

    Ok(HttpResponse::Ok().json(EncKeysResponse {
        keys: fetched.iter().map(WireKey::from).collect(),
    }))
}

#[derive(Deserialize)]
pub struct DecKeysBody {
    #[serde(rename = "key_IDs", default)]
    pub key_ids: Vec<KeyIdRef>,
}

#[derive(Serialize)]
pub struct DecKeysResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub keys: Vec<WireKey>,
}

pub async fn dec_keys(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<DecKeysBody>,
    slave_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let ids: Vec<String> = body.into_inner().key_ids.into_iter().map(|r| r.key_id).collect();
    do_dec_keys(state, path, ids, slave_identity).await
}

pub async fn dec_keys_query(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: HttpRequest,
    slave_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    let ids = parse_key_id_query(req.query_string());
    do_dec_keys(state, path, ids, slave_identity).await
}

/// Accepts both `key_ID=a&key_ID=b` (repeated) and `key_ID=a,b` (comma-split).
fn parse_key_id_query(query: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key != "key_ID" {
            continue;
        }
        let decoded = percent_decode(value);
        for part in decoded.split(',') {
            if !part.is_empty() {
                ids.push(part.to_string());
            }
        }
    }
    ids
}

fn percent_decode(s: &str) -> String {
    s.replace("%2C", ",").replace('+', " ")
}

async fn do_dec_keys(
    state: web::Data<AppState>,
    path: web::Path<String>,
    requested_ids: Vec<String>,
    slave_identity: SaeIdentity,
) -> Result<HttpResponse, AppError> {
    if requested_ids.is_empty() {
        return Err(DomainError::validation("key_IDs must not be empty").into());
    }

    let master_sae_id = path.into_inner();
    let slave_sae_id = slave_identity.0;

    let forward = state.key_store.get_keys(&master_sae_id, &slave_sae_id).await;
    let reverse = state.key_store.get_keys(&slave_sae_id, &master_sae_id).await;

    let mut found: Vec<KeyRecord> = Vec::with_capacity(requested_ids.len());
    let mut forward_ids: Vec<String> = Vec::new();
    let mut reverse_ids: Vec<String> = Vec::new();
    let mut remaining: Vec<String> = Vec::new();

    for id in requested_ids {
        if let Some(key) = forward.iter().find(|k| k.key_id == id) {
            found.push(key.clone());
            forward_ids.push(id);
        } else if let Some(key) = reverse.iter().find(|k| k.key_id == id) {
            found.push(key.clone());
            reverse_ids.push(id);
        } else {
            remaining.push(id);
        }
    }

    let mut still_missing = Vec::new();
    for id in remaining {
        match state.key_store.fetch_key_by_id(&id, true).await? {
            Some(key) => found.push(key),
            None => still_missing.push(id),
        }
    }

    if found.is_empty() {
        return Err(DomainError::not_found(NotFoundKind::Key, "none of the requested ids are present").into());
    }

    if !forward_ids.is_empty() {
        state
            .key_store
            .remove_keys(&master_sae_id, &slave_sae_id, &forward_ids, true)
            .await;
    }
    if !reverse_ids.is_empty() {
        state
            .key_store
            .remove_keys(&slave_sae_id, &master_sae_id, &reverse_ids, true)
            .await;
    }

    let wire_keys: Vec<WireKey> = found.iter().map(WireKey::from).collect();

    if still_missing.is_empty() {
        Ok(HttpResponse::Ok().json(DecKeysResponse {
            message: None,
            keys: wire_keys,
        }))
    } else {
        Ok(HttpResponse::PartialContent().json(DecKeysResponse {
            message: Some(format!(
                "Some requested keys missing: {}",
                still_missing.join(", ")
            )),
            keys: wire_keys,
        }))
    }
}

#[derive(Deserialize)]
pub struct MarkConsumedBody {
    pub key_id: String,
}

pub async fn mark_consumed(
    state: web::Data<AppState>,
    body: web::Json<MarkConsumedBody>,
) -> Result<HttpResponse, AppError> {
    match state.key_store.fetch_key_by_id(&body.key_id, true).await {
        Ok(Some(_)) => Ok(HttpResponse::Ok().finish()),
        Ok(None) => Err(DomainError::not_found(NotFoundKind::Key, &body.key_id).into()),
        Err(e) => Err(e.into()),
    }
}
