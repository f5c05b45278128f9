//! Key Store (§4.D) — `(master_SAE, slave_SAE) -> ordered key list`, with
//! broadcast hooks so peer KMEs mirror the same ids bound to the same pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kme_core::model::KeyRecord;
use kme_core::wire::WireKey;
use kme_core::errors::domain::DomainError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::pool_client::PoolClient;

pub type SaePair = (String, String);

/// Outbound interface for mirroring Key Store mutations to peer KMEs (§9).
/// Broadcasts are best-effort and idempotent: replaying an append for an id
/// already present at the peer is a no-op there.
#[async_trait]
pub trait PeerNotifier: Send + Sync {
    async fn appended(&self, master: &str, slave: &str, keys: &[KeyRecord]);
    async fn removed(&self, master: &str, slave: &str, keys: &[KeyRecord]);
}

pub struct NoopPeerNotifier;

#[async_trait]
impl PeerNotifier for NoopPeerNotifier {
    async fn appended(&self, _master: &str, _slave: &str, _keys: &[KeyRecord]) {}
    async fn removed(&self, _master: &str, _slave: &str, _keys: &[KeyRecord]) {}
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    master_sae_id: &'a str,
    slave_sae_id: &'a str,
    keys: Vec<WireKey>,
}

pub struct HttpPeerNotifier {
    pub http: reqwest::Client,
    pub peer_base_urls: Vec<String>,
}

#[async_trait]
impl PeerNotifier for HttpPeerNotifier {
    async fn appended(&self, master: &str, slave: &str, keys: &[KeyRecord]) {
        self.send("/internal/kme_key_exchange", master, slave, keys).await;
    }

    async fn removed(&self, master: &str, slave: &str, keys: &[KeyRecord]) {
        self.send("/internal/remove_kme_key", master, slave, keys).await;
    }
}

impl HttpPeerNotifier {
    /// One attempt, one retry, per the §7 propagation policy. A peer that's
    /// still unreachable after that is logged and otherwise ignored — the
    /// broadcast is best-effort by design (§4.D).
    async fn send(&self, path: &str, master: &str, slave: &str, keys: &[KeyRecord]) {
        let body = ExchangeRequest {
            master_sae_id: master,
            slave_sae_id: slave,
            keys: keys.iter().map(WireKey::from).collect(),
        };
        for peer in &self.peer_base_urls {
            let url = format!("{peer}{path}");
            let mut ok = false;
            for attempt in 0..2 {
                match self.http.post(&url).json(&body).send().await {
                    Ok(resp) if resp.status().is_success() => {
                        ok = true;
                        break;
                    }
                    Ok(resp) => warn!("peer {url} returned {} on broadcast", resp.status()),
                    Err(e) => warn!("peer {url} unreachable on broadcast: {e}"),
                }
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_millis(150)).await;
                }
            }
            if !ok {
                warn!("broadcast to {url} failed after retry; peer will fall back to cross-KME fetch");
            }
        }
    }
}

pub struct KeyStore {
    entries: Mutex<HashMap<SaePair, Vec<KeyRecord>>>,
    pool_client: Arc<dyn PoolClient>,
    notifier: Arc<dyn PeerNotifier>,
}

impl KeyStore {
    pub fn new(pool_client: Arc<dyn PoolClient>, notifier: Arc<dyn PeerNotifier>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            pool_client,
            notifier,
        }
    }

    pub async fn append_keys(
        &self,
        master: &str,
        slave: &str,
        keys: Vec<KeyRecord>,
        broadcast: bool,
    ) {
        if keys.is_empty() {
            return;
        }
        {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .entry((master.to_string(), slave.to_string()))
                .or_default();
            let existing: std::collections::HashSet<_> =
                entry.iter().map(|k| k.key_id.clone()).collect();
            for key in &keys {
                if !existing.contains(&key.key_id) {
                    entry.push(key.clone());
                }
            }
        }
        if broadcast {
            self.notifier.appended(master, slave, &keys).await;
        }
    }

    pub async fn remove_keys(&self, master: &str, slave: &str, key_ids: &[String], broadcast: bool) {
        let removed = {
            let mut entries = self.entries.lock().await;
            let Some(entry) = entries.get_mut(&(master.to_string(), slave.to_string())) else {
                return;
            };
            let mut removed = Vec::new();
            entry.retain(|k| {
                if key_ids.contains(&k.key_id) {
                    removed.push(k.clone());
                    false
                } else {
                    true
                }
            });
            removed
        };
        if broadcast && !removed.is_empty() {
            self.notifier.removed(master, slave, &removed).await;
        }
    }

    pub async fn get_keys(&self, master: &str, slave: &str) -> Vec<KeyRecord> {
        let entries = self.entries.lock().await;
        entries
            .get(&(master.to_string(), slave.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get_new_key(
        &self,
        size_bits: u32,
        timeout: Duration,
        remove: bool,
    ) -> Result<KeyRecord, DomainError> {
        self.pool_client.get_key(size_bits, timeout, remove).await
    }

    /// Fallback lookup for `dec_keys`'s missing ids: asks the Pool Client
    /// directly, which for the slave role HTTPs to the master's internal
    /// endpoint with `remove=true` (§4.E step 3).
    pub async fn fetch_key_by_id(
        &self,
        key_id: &str,
        remove: bool,
    ) -> Result<Option<KeyRecord>, DomainError> {
        self.pool_client.get_key_by_id(key_id, remove).await
    }

    pub fn pool_client(&self) -> Arc<dyn PoolClient> {
        self.pool_client.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_pool::SharedPoolEngine;
    use crate::pool_client::LocalPoolClient;

    async fn store() -> KeyStore {
        let engine = SharedPoolEngine::load(
            format!("/tmp/kme-test-store-{}.json", uuid::Uuid::new_v4()),
            32,
            100,
            10,
            5,
            Duration::from_millis(10),
        )
        .await;
        let client = Arc::new(LocalPoolClient {
            engine,
            kme_id: "1".into(),
        });
        KeyStore::new(client, Arc::new(NoopPeerNotifier))
    }

    #[tokio::test]
    async fn append_is_idempotent_for_repeated_ids() {
        let store = store().await;
        let key = KeyRecord::new("qk1", vec![1, 2, 3]);
        store.append_keys("M", "S", vec![key.clone()], false).await;
        store.append_keys("M", "S", vec![key.clone()], false).await;
        assert_eq!(store.get_keys("M", "S").await.len(), 1);
    }

    #[tokio::test]
    async fn remove_missing_ids_is_not_an_error() {
        let store = store().await;
        store
            .remove_keys("M", "S", &["nonexistent".to_string()], false)
            .await;
        assert!(store.get_keys("M", "S").await.is_empty());
    }
}
