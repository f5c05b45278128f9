//! Local Key Manager (§4.G) — the process-wide singleton wrapping the
//! Per-User Pool and the sync worker's request queue, exposing an
//! ETSI-shaped surface annotated with `source_KME_ID` and bit-valued sizes.

use std::sync::Arc;

use kme_core::errors::domain::DomainError;

use crate::repos::user_pool::PoolKey;
use crate::services::per_user_pool::{PerUserPool, RegistrationResult, KEY_SIZE_BYTES};
use crate::sync::{SyncQueue, SyncReason, SyncRequest};

/// `get_status`'s response shape, annotated the way every ETSI-facing G
/// method is per §4.G's closing paragraph.
#[derive(Debug, Clone)]
pub struct LocalKmStatus {
    pub source_kme_id: String,
    pub sae_id: String,
    pub stored_key_count: u64,
    pub max_key_count: i64,
    pub key_size_bits: u32,
    pub is_low: bool,
}

pub struct LocalKeyManager {
    pool: Arc<PerUserPool>,
    sync_queue: SyncQueue,
    local_km_id: String,
}

impl LocalKeyManager {
    pub fn new(pool: Arc<PerUserPool>, sync_queue: SyncQueue, local_km_id: String) -> Self {
        Self {
            pool,
            sync_queue,
            local_km_id,
        }
    }

    pub async fn register_user(
        &self,
        sae_id: &str,
        email: &str,
        initial_pool_size: usize,
    ) -> Result<RegistrationResult, DomainError> {
        self.pool.register_user(sae_id, email, initial_pool_size).await
    }

    /// Delegates to F, then enqueues a `threshold` sync for the receiver if
    /// its pool became low as a result (§4.G, final paragraph).
    pub async fn get_enc_keys(
        &self,
        sender_sae: &str,
        receiver_sae: &str,
        number: usize,
        size_bits: u32,
    ) -> Result<Vec<PoolKey>, DomainError> {
        let size_bytes = (size_bits as usize).div_ceil(8);
        let delivered = self
            .pool
            .get_keys_for_receiver(sender_sae, receiver_sae, number, size_bytes)
            .await?;

        if let Ok(status) = self.pool.get_pool_status(receiver_sae).await {
            if status.is_low {
                self.sync_queue.enqueue(SyncRequest {
                    reason: SyncReason::Threshold,
                    users: Some(vec![receiver_sae.to_string()]),
                });
            }
        }

        Ok(delivered)
    }

    pub async fn get_dec_keys(&self, caller_sae: &str, key_ids: &[String]) -> Result<Vec<PoolKey>, DomainError> {
        self.pool.get_keys_by_ids(caller_sae, key_ids).await
    }

    pub async fn get_status(&self, sae_id: &str) -> Result<LocalKmStatus, DomainError> {
        let status = self.pool.get_pool_status(sae_id).await?;
        Ok(LocalKmStatus {
            source_kme_id: self.local_km_id.clone(),
            sae_id: status.sae_id,
            stored_key_count: status.available,
            max_key_count: status.pool_size_limit,
            key_size_bits: (KEY_SIZE_BYTES * 8) as u32,
            is_low: status.is_low,
        })
    }

    pub async fn refill(&self, sae_id: &str, keys_to_add: Option<usize>) -> Result<(usize, u64), DomainError> {
        let added = self.pool.refill_pool(sae_id, keys_to_add).await?;
        let status = self.pool.get_pool_status(sae_id).await?;
        Ok((added, status.available))
    }

    pub async fn delete_user(&self, sae_id: &str) -> Result<(), DomainError> {
        self.pool.delete_user(sae_id).await
    }

    pub async fn list_pools(&self) -> Result<Vec<LocalKmStatus>, DomainError> {
        let statuses = self.pool.list_pool_statuses().await?;
        Ok(statuses
            .into_iter()
            .map(|status| LocalKmStatus {
                source_kme_id: self.local_km_id.clone(),
                sae_id: status.sae_id,
                stored_key_count: status.available,
                max_key_count: status.pool_size_limit,
                key_size_bits: (KEY_SIZE_BYTES * 8) as u32,
                is_low: status.is_low,
            })
            .collect())
    }

    pub fn sync_queue(&self) -> SyncQueue {
        self.sync_queue.clone()
    }
}
