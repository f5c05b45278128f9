//! Core data model: an immutable, once-consumed key record (§3).

use serde::{Deserialize, Serialize};

/// A single key produced by the [`KeyGenerator`](crate::generator::KeyGenerator).
///
/// Immutable after creation. `key_material` holds raw bytes; callers base64-encode
/// it only at the HTTP/JSON boundary via [`crate::wire`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_id: String,
    pub key_material: Vec<u8>,
}

impl KeyRecord {
    pub fn new(key_id: impl Into<String>, key_material: Vec<u8>) -> Self {
        Self {
            key_id: key_id.into(),
            key_material,
        }
    }

    pub fn size_bits(&self) -> u32 {
        (self.key_material.len() as u32) * 8
    }
}

/// Snapshot of shared-pool occupancy, reported by `status()` (§4.B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    pub available: usize,
    pub reserved: usize,
    pub total_available: usize,
    pub max_capacity: usize,
    pub total_generated: u64,
    pub total_retrieved: u64,
    pub per_kme_retrieved: std::collections::BTreeMap<String, u64>,
    pub utilization_pct: f64,
}
