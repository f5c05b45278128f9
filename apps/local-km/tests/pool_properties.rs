//! Property-based test for the per-user pool (§8 invariant 4).
//!
//! Developer notes:
//! - Increase cases locally with: PROPTEST_CASES=200 cargo test -p local-km
//! - Each case runs against a fresh throwaway sqlite file; no shared state.

use std::env;
use std::sync::Arc;

use local_km::db;
use local_km::services::per_user_pool::PerUserPool;
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    let cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(16); // low default for fast CI, migrations make each case pricier

    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

async fn fresh_pool() -> Arc<PerUserPool> {
    let path = std::env::temp_dir().join(format!("local-km-prop-{}.sqlite3", uuid::Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
    let conn = db::connect_and_migrate(&url).await.expect("db connects and migrates");
    Arc::new(PerUserPool::new(conn, 0.10))
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Invariant 4: `available + used == total keys ever issued to u`, after
    /// any interleaving of registration, delivery, and refill.
    #[test]
    fn prop_per_user_pool_conservation(
        initial in 1usize..15,
        deliveries in 0usize..8,
        refill in 0usize..10,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = fresh_pool().await;
            let sae = "SAE_PROP";
            let registration = pool.register_user(sae, "prop@example.test", initial).await.unwrap();
            let mut issued = registration.keys_generated;

            let mut delivered_total = 0usize;
            for _ in 0..deliveries {
                match pool.get_keys_for_receiver("SENDER", sae, 1, 1024).await {
                    Ok(keys) => delivered_total += keys.len(),
                    Err(_) => break, // pool exhausted, stop delivering
                }
            }

            let added = pool.refill_pool(sae, Some(refill)).await.unwrap();
            issued += added;

            let status = pool.get_pool_status(sae).await.unwrap();
            prop_assert_eq!(status.available + status.used, issued as u64);
            prop_assert_eq!(status.used as usize, delivered_total);
            Ok(())
        })?;
    }
}
