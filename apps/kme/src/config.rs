//! KME configuration: the `KME_ID`/`MAX_KEY_COUNT`/... env vars of §6, with the
//! defaults documented in §4.B/§4.E.

use std::time::Duration;

use kme_core::config::{bool_or, duration_secs_or, parsed_or, var, var_or};
use kme_core::errors::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Runs the Shared Pool Engine and generates keys.
    Master,
    /// Delegates generation to the master over HTTP.
    Slave,
}

#[derive(Debug, Clone)]
pub struct KmeConfig {
    pub kme_id: String,
    pub role: Role,
    pub attached_sae_id: String,
    pub default_key_size_bytes: usize,
    pub max_key_count: usize,
    pub max_keys_per_request: usize,
    pub min_key_size_bits: u32,
    pub max_key_size_bits: u32,
    pub batch_size: usize,
    pub refill_threshold: usize,
    pub generate_interval: Duration,
    pub acquire_timeout: Duration,
    pub use_https: bool,
    /// Base URL of the master KME's internal API, used by the slave role.
    pub peer_base_url: Option<String>,
    /// Where the master persists its shared-pool snapshot.
    pub persistence_path: String,
    pub bind_addr: String,
}

impl KmeConfig {
    pub fn from_env() -> Result<Self, DomainError> {
        let kme_id = var_or("KME_ID", "1");
        let role = if kme_id == "1" { Role::Master } else { Role::Slave };

        Ok(Self {
            role,
            attached_sae_id: var_or("ATTACHED_SAE_ID", "UNKNOWN"),
            default_key_size_bytes: parsed_or("DEFAULT_KEY_SIZE", 32usize)?,
            max_key_count: parsed_or("MAX_KEY_COUNT", 1000usize)?,
            max_keys_per_request: parsed_or("MAX_KEYS_PER_REQUEST", 100usize)?,
            min_key_size_bits: parsed_or("MIN_KEY_SIZE", 64u32)?,
            max_key_size_bits: parsed_or("MAX_KEY_SIZE", 8192u32)?,
            batch_size: parsed_or("KEY_GEN_BATCH_SIZE", 100usize)?,
            refill_threshold: parsed_or("REFILL_THRESHOLD", 500usize)?,
            generate_interval: duration_secs_or("KEY_GEN_SEC_TO_GEN", 1)?,
            acquire_timeout: duration_secs_or("KEY_ACQUIRE_TIMEOUT", 5)?,
            use_https: bool_or("USE_HTTPS", false),
            peer_base_url: var("OTHER_KMES").or_else(|| var("NEXT_DOOR_KM_URL")),
            persistence_path: var_or("KME_POOL_SNAPSHOT", "pool_keys.json"),
            bind_addr: var_or("KME_BIND_ADDR", "127.0.0.1:8010"),
            kme_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_select_master_role_when_kme_id_unset() {
        std::env::remove_var("KME_ID");
        let cfg = KmeConfig::from_env().unwrap();
        assert_eq!(cfg.role, Role::Master);
        assert_eq!(cfg.max_key_count, 1000);
    }

    #[test]
    fn kme_id_two_selects_slave_role() {
        std::env::set_var("KME_ID", "2");
        let cfg = KmeConfig::from_env().unwrap();
        assert_eq!(cfg.role, Role::Slave);
        std::env::remove_var("KME_ID");
    }
}
