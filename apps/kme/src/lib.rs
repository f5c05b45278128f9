pub mod config;
pub mod extractors;
pub mod key_store;
pub mod middleware;
pub mod persistence;
pub mod pool_client;
pub mod routes;
pub mod shared_pool;
pub mod state;
pub mod telemetry;

pub use config::KmeConfig;
pub use state::AppState;
