//! `POST /sync` (§6) — the server side of the Local KM ↔ upstream exchange.
//! A downstream Local KM is the client here (see [`crate::sync::SyncWorker`]
//! for that side); this instance plays "upstream" and hands out freshly
//! generated key material per requested user, the same software RNG source
//! the per-user pool itself draws from.

use actix_web::{web, HttpResponse};
use kme_core::errors::domain::DomainError;
use kme_core::wire::WireKey;
use kme_core::{AppError, KeyGenerator};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::services::per_user_pool::KEY_SIZE_BYTES;

#[derive(Deserialize)]
pub struct SyncUserRequest {
    pub sae_id: String,
    pub requested_keys: u64,
}

#[derive(Deserialize)]
pub struct SyncRequestBody {
    pub local_km_id: String,
    pub users: Vec<SyncUserRequest>,
}

#[derive(Serialize)]
pub struct UserSyncResult {
    pub sae_id: String,
    pub keys_delivered: usize,
    pub keys: Vec<WireKey>,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub synced_users: usize,
    pub total_keys_delivered: usize,
    pub user_syncs: Vec<UserSyncResult>,
}

pub async fn sync(body: web::Json<SyncRequestBody>) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let mut user_syncs = Vec::with_capacity(body.users.len());
    let mut total_delivered = 0usize;

    for user in &body.users {
        let count = user.requested_keys as usize;
        let keys: Vec<WireKey> = (0..count)
            .map(|_| KeyGenerator::generate(KEY_SIZE_BYTES).map(|k| WireKey::from(&k)))
            .collect::<Result<_, DomainError>>()?;
        total_delivered += keys.len();
        user_syncs.push(UserSyncResult {
            sae_id: user.sae_id.clone(),
            keys_delivered: keys.len(),
            keys,
        });
    }

    info!(
        local_km_id = %body.local_km_id,
        synced_users = user_syncs.len(),
        total_delivered,
        "served upstream sync request"
    );

    Ok(HttpResponse::Ok().json(SyncResponse {
        success: true,
        synced_users: user_syncs.len(),
        total_keys_delivered: total_delivered,
        user_syncs,
    }))
}
