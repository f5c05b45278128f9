//! Shared-pool snapshot persistence (§4.H): whole-state JSON written via a
//! temp-file-and-rename pattern so a crash mid-write can't leave a torn file.
//! `reserved` is intentionally excluded — restart drops in-flight reservations
//! (§9, a documented trade-off, not a bug).

use std::path::Path;

use kme_core::model::KeyRecord;
use kme_core::wire::{decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct PoolSnapshot {
    pub keys: Vec<SnapshotKey>,
    pub total_generated: u64,
    pub total_retrieved: u64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub key_id: String,
    pub key: String,
}

impl PoolSnapshot {
    pub fn from_available(available: &std::collections::VecDeque<KeyRecord>, total_generated: u64, total_retrieved: u64) -> Self {
        Self {
            keys: available
                .iter()
                .map(|k| SnapshotKey {
                    key_id: k.key_id.clone(),
                    key: encode(&k.key_material),
                })
                .collect(),
            total_generated,
            total_retrieved,
            timestamp: 0,
        }
    }

    pub fn into_available(self) -> (std::collections::VecDeque<KeyRecord>, u64, u64) {
        let available = self
            .keys
            .into_iter()
            .filter_map(|sk| match decode(&sk.key) {
                Ok(material) => Some(KeyRecord::new(sk.key_id, material)),
                Err(e) => {
                    warn!("dropping corrupt snapshot entry {}: {e}", sk.key_id);
                    None
                }
            })
            .collect();
        (available, self.total_generated, self.total_retrieved)
    }
}

pub async fn load(path: &str) -> PoolSnapshot {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("pool snapshot at {path} is corrupt, starting empty: {e}");
                PoolSnapshot::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PoolSnapshot::default(),
        Err(e) => {
            warn!("failed to read pool snapshot at {path}: {e}");
            PoolSnapshot::default()
        }
    }
}

pub async fn save(path: &str, snapshot: &PoolSnapshot) {
    let body = match serde_json::to_vec(snapshot) {
        Ok(b) => b,
        Err(e) => {
            warn!("failed to serialize pool snapshot: {e}");
            return;
        }
    };

    let tmp_path = format!("{path}.tmp-{}", uuid::Uuid::new_v4());
    if let Err(e) = tokio::fs::write(&tmp_path, &body).await {
        warn!("failed to write temp pool snapshot {tmp_path}: {e}");
        return;
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, Path::new(path)).await {
        warn!("failed to rename temp pool snapshot into place: {e}");
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
}
