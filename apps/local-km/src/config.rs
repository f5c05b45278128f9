//! Local KM configuration: the `LOCAL_KM_*` env vars of §6, with the defaults
//! documented in §4.G.

use std::time::Duration;

use kme_core::config::{duration_secs_or, parsed_or, var, var_or};
use kme_core::errors::domain::DomainError;

#[derive(Debug, Clone)]
pub struct LocalKmConfig {
    pub local_km_id: String,
    pub upstream_url: String,
    pub sync_interval: Duration,
    pub low_threshold_percent: f64,
    pub emergency_threshold_percent: f64,
    pub db_path: String,
    pub bind_addr: String,
}

impl LocalKmConfig {
    pub fn from_env() -> Result<Self, DomainError> {
        let sync_interval_hours: u64 = parsed_or("SYNC_INTERVAL_HOURS", 24u64)?;

        Ok(Self {
            local_km_id: var_or("LOCAL_KM_ID", "local-km-1"),
            upstream_url: var("NEXT_DOOR_KM_URL")
                .or_else(|| var("OTHER_KMES"))
                .ok_or_else(|| DomainError::config("NEXT_DOOR_KM_URL/OTHER_KMES must be set"))?,
            sync_interval: Duration::from_secs(sync_interval_hours * 3600),
            low_threshold_percent: parsed_or("LOW_THRESHOLD_PERCENT", 0.10f64)?,
            emergency_threshold_percent: parsed_or("EMERGENCY_THRESHOLD_PERCENT", 0.05f64)?,
            db_path: var_or("LOCAL_KM_DB", "local_km.sqlite3"),
            bind_addr: var_or("LOCAL_KM_BIND_ADDR", "127.0.0.1:8020"),
        })
    }

    pub fn sqlite_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn requires_upstream_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NEXT_DOOR_KM_URL");
        std::env::remove_var("OTHER_KMES");
        assert!(LocalKmConfig::from_env().is_err());
    }

    #[test]
    fn defaults_apply_when_only_upstream_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NEXT_DOOR_KM_URL", "http://localhost:8010");
        let cfg = LocalKmConfig::from_env().unwrap();
        assert_eq!(cfg.sync_interval, Duration::from_secs(24 * 3600));
        assert_eq!(cfg.low_threshold_percent, 0.10);
        std::env::remove_var("NEXT_DOOR_KM_URL");
    }
}
