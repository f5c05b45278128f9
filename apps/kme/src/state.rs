//! Shared application state, built once at boot and handed to every route
//! via `web::Data`, the same composition pattern as the teacher's `AppState`.

use std::sync::Arc;

use crate::config::{KmeConfig, Role};
use crate::key_store::{HttpPeerNotifier, KeyStore, NoopPeerNotifier, PeerNotifier};
use crate::pool_client::{LocalPoolClient, PoolClient, RemotePoolClient};
use crate::shared_pool::SharedPoolEngine;

pub struct AppState {
    pub config: KmeConfig,
    /// Only populated in the master role; the slave never owns a pool.
    pub shared_pool: Option<Arc<SharedPoolEngine>>,
    pub pool_client: Arc<dyn PoolClient>,
    pub key_store: Arc<KeyStore>,
}

impl AppState {
    pub async fn build(config: KmeConfig) -> Self {
        let (shared_pool, pool_client, notifier): (
            Option<Arc<SharedPoolEngine>>,
            Arc<dyn PoolClient>,
            Arc<dyn PeerNotifier>,
        ) = match config.role {
            Role::Master => {
                let engine = SharedPoolEngine::load(
                    config.persistence_path.clone(),
                    config.default_key_size_bytes,
                    config.max_key_count,
                    config.batch_size,
                    config.refill_threshold,
                    config.generate_interval,
                )
                .await;
                let client = Arc::new(LocalPoolClient {
                    engine: engine.clone(),
                    kme_id: config.kme_id.clone(),
                });
                let notifier: Arc<dyn PeerNotifier> = match &config.peer_base_url {
                    Some(url) => Arc::new(HttpPeerNotifier {
                        http: reqwest::Client::new(),
                        peer_base_urls: vec![url.clone()],
                    }),
                    None => Arc::new(NoopPeerNotifier),
                };
                (Some(engine), client, notifier)
            }
            Role::Slave => {
                let master_base_url = config
                    .peer_base_url
                    .clone()
                    .expect("slave role requires OTHER_KMES/NEXT_DOOR_KM_URL");
                let client = Arc::new(RemotePoolClient {
                    http: reqwest::Client::new(),
                    master_base_url: master_base_url.clone(),
                    kme_id: config.kme_id.clone(),
                    default_key_size_bytes: config.default_key_size_bytes,
                });
                let notifier: Arc<dyn PeerNotifier> = Arc::new(HttpPeerNotifier {
                    http: reqwest::Client::new(),
                    peer_base_urls: vec![master_base_url],
                });
                (None, client, notifier)
            }
        };

        let key_store = Arc::new(KeyStore::new(pool_client.clone(), notifier));

        Self {
            config,
            shared_pool,
            pool_client,
            key_store,
        }
    }

    pub fn is_master(&self) -> bool {
        self.shared_pool.is_some()
    }
}
