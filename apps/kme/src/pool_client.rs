//! Pool Client (§4.C) — role-aware facade over the shared pool. "Master"
//! delegates directly to the local [`SharedPoolEngine`]; "slave" never
//! generates and instead HTTPs to the master's internal endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kme_core::model::KeyRecord;
use kme_core::wire::WireKey;
use kme_core::KeyGenerator;
use kme_core::errors::domain::DomainError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shared_pool::SharedPoolEngine;

#[async_trait]
pub trait PoolClient: Send + Sync {
    /// Fetches one key of `size_bits` bits. If `size_bits` doesn't match the
    /// pool's default size, synthesizes a one-off key outside the pool instead
    /// (§4.C) — that key is never persisted and never shared with a peer KME.
    async fn get_key(
        &self,
        size_bits: u32,
        timeout: Duration,
        remove: bool,
    ) -> Result<KeyRecord, DomainError>;

    async fn get_key_by_id(
        &self,
        key_id: &str,
        remove: bool,
    ) -> Result<Option<KeyRecord>, DomainError>;

    /// No-op outside the master role (logs a warning there).
    async fn add_key(&self);

    fn default_key_size_bytes(&self) -> usize;
}

fn synth_one_off(size_bits: u32) -> Result<KeyRecord, DomainError> {
    let size_bytes = (size_bits as usize).div_ceil(8).max(1);
    warn!("synthesizing non-shared one-off key of {size_bytes} bytes (size != pool default)");
    KeyGenerator::generate(size_bytes)
}

pub struct LocalPoolClient {
    pub engine: Arc<SharedPoolEngine>,
    pub kme_id: String,
}

#[async_trait]
impl PoolClient for LocalPoolClient {
    async fn get_key(
        &self,
        size_bits: u32,
        timeout: Duration,
        remove: bool,
    ) -> Result<KeyRecord, DomainError> {
        if size_bits as usize != self.engine.default_key_size * 8 {
            return synth_one_off(size_bits);
        }
        let keys = self.engine.get_keys(1, &self.kme_id, timeout, remove).await;
        keys.into_iter()
            .next()
            .ok_or_else(|| DomainError::keys_unavailable("shared pool drained past acquire timeout"))
    }

    async fn get_key_by_id(
        &self,
        key_id: &str,
        remove: bool,
    ) -> Result<Option<KeyRecord>, DomainError> {
        Ok(self.engine.get_key_by_id(key_id, &self.kme_id, remove).await)
    }

    async fn add_key(&self) {
        self.engine.add_keys_batch(1).await;
    }

    fn default_key_size_bytes(&self) -> usize {
        self.engine.default_key_size
    }
}

#[derive(Serialize)]
struct GetSharedKeyRequest<'a> {
    kme_id: &'a str,
    count: usize,
    timeout: f64,
}

#[derive(Deserialize)]
struct GetSharedKeyResponse {
    keys: Vec<WireKey>,
}

#[derive(Serialize)]
struct GetReservedKeyRequest<'a> {
    key_id: &'a str,
    kme_id: &'a str,
    remove: bool,
}

#[derive(Deserialize)]
struct GetReservedKeyResponse {
    key: WireKey,
}

pub struct RemotePoolClient {
    pub http: reqwest::Client,
    pub master_base_url: String,
    pub kme_id: String,
    pub default_key_size_bytes: usize,
}

impl RemotePoolClient {
    /// One retry on transport error with a short fixed backoff (§7 propagation
    /// policy applied uniformly to cross-KME calls). A 404 is a valid outcome
    /// for `get_reserved_key` (the key isn't there), not a transport failure,
    /// so it's returned as-is without consuming a retry.
    async fn post_with_retry_raw<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, DomainError> {
        let url = format!("{}{path}", self.master_base_url);
        let mut last_err = None;
        for attempt in 0..2 {
            match self.http.post(&url).json(body).send().await {
                Ok(resp) if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Ok(resp);
                }
                Ok(resp) => {
                    last_err = Some(format!("master KME returned status {}", resp.status()));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                }
            }
            if attempt == 0 {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        Err(DomainError::transport(last_err.unwrap_or_default()))
    }

    async fn post_with_retry<T: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, DomainError> {
        let resp = self.post_with_retry_raw(path, body).await?;
        resp.json::<R>()
            .await
            .map_err(|e| DomainError::transport(format!("bad response from master KME: {e}")))
    }
}

#[async_trait]
impl PoolClient for RemotePoolClient {
    async fn get_key(
        &self,
        size_bits: u32,
        timeout: Duration,
        remove: bool,
    ) -> Result<KeyRecord, DomainError> {
        if size_bits as usize != self.default_key_size_bytes * 8 {
            return synth_one_off(size_bits);
        }

        let req = GetSharedKeyRequest {
            kme_id: &self.kme_id,
            count: 1,
            timeout: timeout.as_secs_f64(),
        };
        let resp: GetSharedKeyResponse = self.post_with_retry("/internal/get_shared_key", &req).await?;
        let wire = resp
            .keys
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::keys_unavailable("master KME returned no keys"))?;
        let bytes = kme_core::wire::decode(&wire.key)?;

        if remove {
            // `get_shared_key` always reserves; honor `remove=true` with a
            // follow-up call so semantics match the local client exactly.
            let removed = self.get_key_by_id(&wire.key_id, true).await?;
            return removed.ok_or_else(|| {
                DomainError::keys_unavailable("key vanished between reservation and removal")
            });
        }

        Ok(KeyRecord::new(wire.key_id, bytes))
    }

    async fn get_key_by_id(
        &self,
        key_id: &str,
        remove: bool,
    ) -> Result<Option<KeyRecord>, DomainError> {
        let req = GetReservedKeyRequest {
            key_id,
            kme_id: &self.kme_id,
            remove,
        };
        let resp = self.post_with_retry_raw("/internal/get_reserved_key", &req).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetReservedKeyResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::transport(format!("bad response from master KME: {e}")))?;
        let bytes = kme_core::wire::decode(&body.key.key)?;
        Ok(Some(KeyRecord::new(body.key.key_id, bytes)))
    }

    async fn add_key(&self) {
        warn!("add_key() is a no-op on the slave role; the master generates all keys");
    }

    fn default_key_size_bytes(&self) -> usize {
        self.default_key_size_bytes
    }
}
