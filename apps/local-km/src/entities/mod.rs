pub mod keys;
pub mod local_km_config;
pub mod sync_logs;
pub mod users;
