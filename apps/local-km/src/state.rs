//! Shared application state, built once at boot and handed to every route
//! via `web::Data`, mirroring the `kme` binary's `AppState` composition.

use std::sync::Arc;

use kme_core::errors::domain::DomainError;

use crate::config::LocalKmConfig;
use crate::db;
use crate::local_key_manager::LocalKeyManager;
use crate::services::per_user_pool::PerUserPool;
use crate::sync::SyncWorker;

pub struct AppState {
    pub config: LocalKmConfig,
    pub local_key_manager: Arc<LocalKeyManager>,
    pub sync_worker: Arc<SyncWorker>,
}

impl AppState {
    pub async fn build(config: LocalKmConfig) -> Result<Self, DomainError> {
        let conn = db::connect_and_migrate(&config.sqlite_url()).await?;
        let pool = Arc::new(PerUserPool::new(conn.clone(), config.low_threshold_percent));
        let sync_worker = SyncWorker::new(pool.clone(), conn, config.clone());
        let local_key_manager = Arc::new(LocalKeyManager::new(
            pool,
            sync_worker.queue(),
            config.local_km_id.clone(),
        ));

        Ok(Self {
            config,
            local_key_manager,
            sync_worker,
        })
    }
}
