//! Per-User Pool (§4.F) — one row per registered SAE plus its child keys,
//! guarded by a single monitor so multi-statement operations (like marking
//! the oldest `n` available keys used) observe a consistent snapshot, the
//! async analogue of the shared pool's `tokio::sync::Mutex` (§5).

use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio::sync::Mutex;

use kme_core::errors::domain::{ConflictKind, DomainError, NotFoundKind};
use kme_core::model::KeyRecord;
use kme_core::KeyGenerator;

use crate::repos::user_pool::{self, PoolKey, PoolUser};

/// Every per-user pool key is exactly this many bytes (§4.F).
pub const KEY_SIZE_BYTES: usize = 1024;

#[derive(Debug, Clone)]
pub struct RegistrationResult {
    pub sae_id: String,
    pub pool_size: usize,
    pub keys_generated: usize,
}

#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub sae_id: String,
    pub total: u64,
    pub available: u64,
    pub used: u64,
    pub pool_size_limit: i64,
    pub is_low: bool,
}

pub struct PerUserPool {
    db: DatabaseConnection,
    guard: Mutex<()>,
    low_threshold: f64,
}

impl PerUserPool {
    pub fn new(db: DatabaseConnection, low_threshold: f64) -> Self {
        Self {
            db,
            guard: Mutex::new(()),
            low_threshold,
        }
    }

    pub async fn register_user(
        &self,
        sae_id: &str,
        email: &str,
        initial_pool_size: usize,
    ) -> Result<RegistrationResult, DomainError> {
        let _permit = self.guard.lock().await;

        if user_pool::find_user(&self.db, sae_id).await?.is_some() {
            return Err(DomainError::conflict(
                ConflictKind::AlreadyRegistered,
                format!("SAE '{sae_id}' is already registered"),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| DomainError::db(e.to_string()))?;
        user_pool::create_user(&txn, sae_id, email, initial_pool_size as i64).await?;
        let generated = generate_batch(initial_pool_size)?;
        user_pool::insert_generated_keys(&txn, sae_id, &generated).await?;
        txn.commit().await.map_err(|e| DomainError::db(e.to_string()))?;

        Ok(RegistrationResult {
            sae_id: sae_id.to_string(),
            pool_size: initial_pool_size,
            keys_generated: generated.len(),
        })
    }

    /// Marks `number` of `receiver_sae`'s oldest available keys as used by
    /// `sender_sae`, returning the material. `size_bytes` must be exactly
    /// [`KEY_SIZE_BYTES`] (§4.F key-size invariant).
    pub async fn get_keys_for_receiver(
        &self,
        sender_sae: &str,
        receiver_sae: &str,
        number: usize,
        size_bytes: usize,
    ) -> Result<Vec<PoolKey>, DomainError> {
        if size_bytes != KEY_SIZE_BYTES {
            return Err(DomainError::validation(format!(
                "per-user pool keys are fixed at {KEY_SIZE_BYTES} bytes, got {size_bytes}"
            )));
        }

        let _permit = self.guard.lock().await;

        user_pool::find_user(&self.db, receiver_sae)
            .await?
            .ok_or_else(|| DomainError::unknown_sae(receiver_sae))?;

        let candidates = user_pool::oldest_available(&self.db, receiver_sae, number as u64).await?;
        if candidates.len() < number {
            return Err(DomainError::InsufficientKeys {
                available: candidates.len(),
                requested: number,
            });
        }

        let ids: Vec<String> = candidates.iter().map(|k| k.key_id.clone()).collect();
        user_pool::mark_used(&self.db, &ids, sender_sae).await?;

        Ok(candidates
            .into_iter()
            .map(|k| PoolKey {
                used: true,
                used_by_sae_id: Some(sender_sae.to_string()),
                ..k
            })
            .collect())
    }

    /// Returns already-consumed keys the caller is entitled to fetch by id:
    /// the consumer, or the pool owner (§4.F).
    pub async fn get_keys_by_ids(
        &self,
        caller_sae: &str,
        key_ids: &[String],
    ) -> Result<Vec<PoolKey>, DomainError> {
        let found = user_pool::find_used_keys_for_caller(&self.db, caller_sae, key_ids).await?;
        if found.is_empty() {
            return Err(DomainError::not_found(
                NotFoundKind::Key,
                "none of the requested ids are present or visible to this SAE",
            ));
        }
        Ok(found)
    }

    pub async fn get_pool_status(&self, sae_id: &str) -> Result<PoolStatus, DomainError> {
        let user = user_pool::find_user(&self.db, sae_id)
            .await?
            .ok_or_else(|| DomainError::unknown_sae(sae_id))?;
        Ok(self.status_for(&user).await?)
    }

    async fn status_for(&self, user: &PoolUser) -> Result<PoolStatus, DomainError> {
        let available = user_pool::count_available(&self.db, &user.sae_id).await?;
        let total = user_pool::count_total(&self.db, &user.sae_id).await?;
        let is_low = user.pool_size_limit > 0
            && (available as f64 / user.pool_size_limit as f64) < self.low_threshold;
        Ok(PoolStatus {
            sae_id: user.sae_id.clone(),
            total,
            available,
            used: total - available,
            pool_size_limit: user.pool_size_limit,
            is_low,
        })
    }

    /// Generates up to `n` keys, capped at `pool_size_limit - available`.
    /// `n = None` refills to the limit.
    pub async fn refill_pool(&self, sae_id: &str, n: Option<usize>) -> Result<usize, DomainError> {
        let _permit = self.guard.lock().await;

        let user = user_pool::find_user(&self.db, sae_id)
            .await?
            .ok_or_else(|| DomainError::unknown_sae(sae_id))?;
        let available = user_pool::count_available(&self.db, sae_id).await?;
        let headroom = (user.pool_size_limit - available as i64).max(0) as usize;
        let requested = n.unwrap_or(headroom);
        let to_generate = requested.min(headroom);

        if to_generate == 0 {
            return Ok(0);
        }

        let generated = generate_batch(to_generate)?;
        user_pool::insert_generated_keys(&self.db, sae_id, &generated).await?;
        user_pool::touch_last_refill(&self.db, sae_id).await?;
        Ok(generated.len())
    }

    /// Adds externally-sourced key material (e.g. delivered by an upstream
    /// sync) to `sae_id`'s available set, as if refilled locally (§4.G step 5).
    pub async fn add_synced_keys(&self, sae_id: &str, keys: &[KeyRecord]) -> Result<(), DomainError> {
        let _permit = self.guard.lock().await;
        user_pool::insert_generated_keys(&self.db, sae_id, keys).await?;
        user_pool::touch_last_refill(&self.db, sae_id).await
    }

    pub async fn delete_user(&self, sae_id: &str) -> Result<(), DomainError> {
        let _permit = self.guard.lock().await;
        if user_pool::find_user(&self.db, sae_id).await?.is_none() {
            return Err(DomainError::unknown_sae(sae_id));
        }
        let txn = self.db.begin().await.map_err(|e| DomainError::db(e.to_string()))?;
        user_pool::delete_keys_for_user(&txn, sae_id).await?;
        user_pool::delete_user(&txn, sae_id).await?;
        txn.commit().await.map_err(|e| DomainError::db(e.to_string()))
    }

    pub async fn get_low_pools(&self) -> Result<Vec<PoolStatus>, DomainError> {
        let users = user_pool::list_users(&self.db).await?;
        let mut low = Vec::new();
        for user in users {
            let status = self.status_for(&user).await?;
            if status.is_low {
                low.push(status);
            }
        }
        Ok(low)
    }

    pub async fn list_pool_statuses(&self) -> Result<Vec<PoolStatus>, DomainError> {
        let users = user_pool::list_users(&self.db).await?;
        let mut out = Vec::with_capacity(users.len());
        for user in users {
            out.push(self.status_for(&user).await?);
        }
        Ok(out)
    }
}

fn generate_batch(n: usize) -> Result<Vec<KeyRecord>, DomainError> {
    (0..n).map(|_| KeyGenerator::generate(KEY_SIZE_BYTES)).collect()
}
