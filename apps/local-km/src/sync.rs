//! Hybrid sync worker (§4.G): a single cooperative task draining a request
//! queue on a 60-second cadence, reconciling scheduled/threshold/emergency
//! triggers against the upstream KM.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kme_core::errors::domain::{ConflictKind, DomainError};
use kme_core::model::KeyRecord;
use kme_core::wire::WireKey;
use serde::{Deserialize, Serialize};
use sea_orm::DatabaseConnection;
use time::OffsetDateTime;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::config::LocalKmConfig;
use crate::entities::local_km_config::LAST_SYNC_TIME_KEY;
use crate::repos::{config_store, sync_log};
use crate::services::per_user_pool::PerUserPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    Scheduled,
    Threshold,
    Emergency,
    Manual,
}

impl SyncReason {
    fn as_str(&self) -> &'static str {
        match self {
            SyncReason::Scheduled => "scheduled",
            SyncReason::Threshold => "threshold",
            SyncReason::Emergency => "emergency",
            SyncReason::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub reason: SyncReason,
    pub users: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<SyncRequest>,
}

impl SyncQueue {
    pub fn enqueue(&self, request: SyncRequest) {
        if self.tx.send(request).is_err() {
            warn!("sync queue receiver dropped; sync worker is not running");
        }
    }
}

#[derive(Serialize)]
struct SyncUserRequest<'a> {
    sae_id: &'a str,
    requested_keys: u64,
}

#[derive(Serialize)]
struct UpstreamSyncRequest<'a> {
    local_km_id: &'a str,
    users: Vec<SyncUserRequest<'a>>,
}

#[derive(Deserialize)]
pub struct UserSyncResult {
    pub sae_id: String,
    pub keys_delivered: usize,
    #[serde(default)]
    pub keys: Vec<WireKey>,
}

#[derive(Deserialize)]
pub struct UpstreamSyncResponse {
    pub success: bool,
    #[serde(default)]
    pub user_syncs: Vec<UserSyncResult>,
}

/// Outcome of one run of the sync procedure, for the caller of a manual
/// `POST /sync`-triggered run to report back.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub reason: String,
    pub fallback: Option<String>,
    pub users_synced: usize,
    pub keys_delivered: usize,
}

pub struct SyncWorker {
    pool: Arc<PerUserPool>,
    db: DatabaseConnection,
    http: reqwest::Client,
    config: LocalKmConfig,
    rx: Mutex<mpsc::UnboundedReceiver<SyncRequest>>,
    queue: SyncQueue,
    running: AtomicBool,
    stopped: AtomicBool,
}

impl SyncWorker {
    pub fn new(pool: Arc<PerUserPool>, db: DatabaseConnection, config: LocalKmConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            pool,
            db,
            http: reqwest::Client::new(),
            config,
            rx: Mutex::new(rx),
            queue: SyncQueue { tx },
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn queue(&self) -> SyncQueue {
        self.queue.clone()
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Drives the minute-cadence drain loop plus scheduled/emergency scans.
    /// Runs for the lifetime of the process on the master task.
    pub async fn run(self: Arc<Self>) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }

            let next = {
                let mut rx = self.rx.lock().await;
                tokio::time::timeout(Duration::from_secs(60), rx.recv()).await
            };

            match next {
                Ok(Some(request)) => {
                    if let Err(e) = self.run_sync_procedure(request).await {
                        warn!("sync procedure failed: {e}");
                    }
                    // Drain any further queued requests immediately, per the
                    // "drain the queue" wording rather than one-per-minute.
                    loop {
                        let drained = {
                            let mut rx = self.rx.lock().await;
                            rx.try_recv()
                        };
                        match drained {
                            Ok(request) => {
                                if let Err(e) = self.run_sync_procedure(request).await {
                                    warn!("sync procedure failed: {e}");
                                }
                            }
                            Err(_) => break,
                        }
                    }
                }
                Ok(None) => return,
                Err(_) => {
                    // 60s elapsed with nothing queued; fall through to the checks below.
                }
            }

            if let Err(e) = self.check_scheduled().await {
                warn!("scheduled-sync check failed: {e}");
            }
            if let Err(e) = self.check_emergency().await {
                warn!("emergency-sync scan failed: {e}");
            }
        }
    }

    async fn check_scheduled(&self) -> Result<(), DomainError> {
        let next_sync_time = config_store::get(&self.db, "next_sync_time").await?;
        let due = match next_sync_time {
            Some(raw) => OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339)
                .map(|t| OffsetDateTime::now_utc() >= t)
                .unwrap_or(true),
            None => true,
        };
        if due {
            self.queue.enqueue(SyncRequest {
                reason: SyncReason::Scheduled,
                users: None,
            });
        }
        Ok(())
    }

    async fn check_emergency(&self) -> Result<(), DomainError> {
        let low = self.pool.get_low_pools().await?;
        let emergency_users: Vec<String> = low
            .into_iter()
            .filter(|status| {
                status.pool_size_limit > 0
                    && (status.available as f64 / status.pool_size_limit as f64)
                        < self.config.emergency_threshold_percent
            })
            .map(|status| status.sae_id)
            .collect();

        if !emergency_users.is_empty() {
            self.queue.enqueue(SyncRequest {
                reason: SyncReason::Emergency,
                users: Some(emergency_users),
            });
        }
        Ok(())
    }

    /// Runs the sync procedure described in §4.G. Public so `POST /sync`
    /// (manual trigger) and the background loop share one implementation.
    pub async fn run_sync_procedure(&self, request: SyncRequest) -> Result<SyncOutcome, DomainError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DomainError::conflict(
                ConflictKind::SyncInProgress,
                "a sync is already running",
            ));
        }
        let result = self.run_sync_procedure_locked(request).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_sync_procedure_locked(&self, request: SyncRequest) -> Result<SyncOutcome, DomainError> {
        let targets = self.resolve_targets(&request).await?;
        let mut user_requests = Vec::new();
        for sae_id in &targets {
            let status = self.pool.get_pool_status(sae_id).await?;
            let requested = (status.pool_size_limit - status.available as i64).max(0) as u64;
            if requested > 0 {
                user_requests.push((sae_id.clone(), requested));
            }
        }

        if user_requests.is_empty() {
            let outcome = SyncOutcome {
                reason: request.reason.as_str().to_string(),
                fallback: None,
                users_synced: 0,
                keys_delivered: 0,
            };
            sync_log::append(&self.db, request.reason.as_str(), None, 0, 0, None).await?;
            return Ok(outcome);
        }

        let upstream_req = UpstreamSyncRequest {
            local_km_id: &self.config.local_km_id,
            users: user_requests
                .iter()
                .map(|(sae_id, requested)| SyncUserRequest {
                    sae_id,
                    requested_keys: *requested,
                })
                .collect(),
        };

        let upstream_call = self
            .http
            .post(format!("{}/sync", self.config.upstream_url.trim_end_matches('/')))
            .json(&upstream_req)
            .send();

        let outcome = match tokio::time::timeout(Duration::from_secs(30), upstream_call).await {
            Ok(Ok(resp)) if resp.status().is_success() => {
                let body: UpstreamSyncResponse = resp
                    .json()
                    .await
                    .map_err(|e| DomainError::transport(format!("bad response from upstream KM: {e}")))?;
                self.apply_delivered_keys(&body, &request).await?
            }
            Ok(Ok(resp)) => {
                let detail = format!("upstream KM returned status {}", resp.status());
                self.handle_transport_failure(&request, &detail).await?
            }
            Ok(Err(e)) => self.handle_transport_failure(&request, &e.to_string()).await?,
            Err(_) => {
                self.handle_transport_failure(&request, "upstream sync timed out after 30s")
                    .await?
            }
        };

        self.reschedule().await?;
        Ok(outcome)
    }

    async fn resolve_targets(&self, request: &SyncRequest) -> Result<Vec<String>, DomainError> {
        if let Some(users) = &request.users {
            return Ok(users.clone());
        }
        if request.reason == SyncReason::Scheduled {
            return Ok(self
                .pool
                .list_pool_statuses()
                .await?
                .into_iter()
                .map(|s| s.sae_id)
                .collect());
        }
        Ok(self
            .pool
            .get_low_pools()
            .await?
            .into_iter()
            .map(|s| s.sae_id)
            .collect())
    }

    async fn apply_delivered_keys(
        &self,
        body: &UpstreamSyncResponse,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, DomainError> {
        let mut total_delivered = 0usize;
        let mut users_synced = 0usize;
        for user_sync in &body.user_syncs {
            if user_sync.keys.is_empty() {
                continue;
            }
            let keys: Vec<KeyRecord> = user_sync
                .keys
                .iter()
                .map(|wk| {
                    let bytes = kme_core::wire::decode(&wk.key)?;
                    Ok(KeyRecord::new(wk.key_id.clone(), bytes))
                })
                .collect::<Result<_, DomainError>>()?;
            self.pool.add_synced_keys(&user_sync.sae_id, &keys).await?;
            total_delivered += keys.len();
            users_synced += 1;
        }

        sync_log::append(
            &self.db,
            request.reason.as_str(),
            None,
            users_synced as i32,
            total_delivered as i32,
            None,
        )
        .await?;

        info!(
            reason = request.reason.as_str(),
            users_synced, total_delivered, "upstream sync completed"
        );

        Ok(SyncOutcome {
            reason: request.reason.as_str().to_string(),
            fallback: None,
            users_synced,
            keys_delivered: total_delivered,
        })
    }

    /// On transport failure during an `emergency` sync, falls back to local
    /// generation via F so the affected users aren't left pool-dry (§4.G step 6).
    async fn handle_transport_failure(
        &self,
        request: &SyncRequest,
        detail: &str,
    ) -> Result<SyncOutcome, DomainError> {
        warn!(reason = request.reason.as_str(), detail, "upstream sync transport failure");

        if request.reason != SyncReason::Emergency {
            sync_log::append(&self.db, request.reason.as_str(), None, 0, 0, Some(detail)).await?;
            return Ok(SyncOutcome {
                reason: request.reason.as_str().to_string(),
                fallback: None,
                users_synced: 0,
                keys_delivered: 0,
            });
        }

        let targets = request.users.clone().unwrap_or_default();
        let mut users_synced = 0usize;
        let mut total_generated = 0usize;
        for sae_id in &targets {
            match self.pool.refill_pool(sae_id, None).await {
                Ok(n) if n > 0 => {
                    users_synced += 1;
                    total_generated += n;
                }
                Ok(_) => {}
                Err(e) => warn!("local-generation fallback failed for {sae_id}: {e}"),
            }
        }

        sync_log::append(
            &self.db,
            request.reason.as_str(),
            Some("local_generation"),
            users_synced as i32,
            total_generated as i32,
            Some(detail),
        )
        .await?;

        Ok(SyncOutcome {
            reason: request.reason.as_str().to_string(),
            fallback: Some("local_generation".to_string()),
            users_synced,
            keys_delivered: total_generated,
        })
    }

    async fn reschedule(&self) -> Result<(), DomainError> {
        let now = OffsetDateTime::now_utc();
        config_store::set(
            &self.db,
            LAST_SYNC_TIME_KEY,
            &now.format(&time::format_description::well_known::Rfc3339).unwrap(),
        )
        .await?;
        let next = now + time::Duration::seconds(self.config.sync_interval.as_secs() as i64);
        config_store::set(
            &self.db,
            "next_sync_time",
            &next.format(&time::format_description::well_known::Rfc3339).unwrap(),
        )
        .await
    }
}
