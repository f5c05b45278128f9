//! ETSI GS QKD 014 wire shapes shared by both binaries: `key` is base64(bytes),
//! `key_ID` is an opaque string (§6, "Key encoding on the wire").

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::domain::DomainError;
use crate::model::KeyRecord;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireKey {
    #[serde(rename = "key_ID")]
    pub key_id: String,
    pub key: String,
}

impl From<&KeyRecord> for WireKey {
    fn from(record: &KeyRecord) -> Self {
        WireKey {
            key_id: record.key_id.clone(),
            key: BASE64.encode(&record.key_material),
        }
    }
}

/// `{"key_ID": "..."}` — the shape `dec_keys`'s POST body uses for each requested id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyIdRef {
    #[serde(rename = "key_ID")]
    pub key_id: String,
}

pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode(encoded: &str) -> Result<Vec<u8>, DomainError> {
    BASE64
        .decode(encoded)
        .map_err(|e| DomainError::validation(format!("invalid base64 key material: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_key_round_trips() {
        let record = KeyRecord::new("qk1", vec![1, 2, 3, 4]);
        let wire = WireKey::from(&record);
        assert_eq!(decode(&wire.key).unwrap(), record.key_material);
    }
}
