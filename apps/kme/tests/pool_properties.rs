//! Property-based tests for the shared pool engine (§8 invariants 1, 3, 9).
//!
//! Developer notes:
//! - Increase cases locally with: PROPTEST_CASES=200 cargo test -p kme
//! - Each case builds a fresh in-process engine backed by a throwaway
//!   snapshot path; no network, no shared state between cases.

use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use kme::shared_pool::SharedPoolEngine;
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    let cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(24); // low default for fast CI

    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

async fn fresh_engine(max: usize) -> Arc<SharedPoolEngine> {
    SharedPoolEngine::load(
        format!("/tmp/kme-prop-pool-{}.json", uuid::Uuid::new_v4()),
        32,
        max.max(1),
        max.max(1),
        0,
        Duration::from_secs(3600),
    )
    .await
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Invariant 1: across a whole run of sequential retrievals, no key_ID is
    /// ever delivered more than once.
    #[test]
    fn prop_delivered_key_ids_are_unique(total in 1usize..40, batch in 1usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = fresh_engine(total).await;
            pool.add_keys_batch(total).await;

            let mut seen = HashSet::new();
            let mut delivered = 0;
            while delivered < total {
                let take = batch.min(total - delivered);
                let keys = pool.get_keys(take, "tester", Duration::from_millis(50), true).await;
                if keys.is_empty() {
                    break;
                }
                for key in &keys {
                    prop_assert!(seen.insert(key.key_id.clone()), "key_ID {} delivered twice", key.key_id);
                }
                delivered += keys.len();
            }
            Ok(())
        })?;
    }

    /// Invariant 3: `available + reserved + consumed == total_generated` holds
    /// after any interleaving of generation, reservation, and removal.
    #[test]
    fn prop_conservation_holds(
        generated in 1usize..30,
        reserve_count in 0usize..10,
        consume_count in 0usize..10,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = fresh_engine(generated).await;
            pool.add_keys_batch(generated).await;

            let reserved = pool
                .get_keys(reserve_count.min(generated), "r", Duration::from_millis(20), false)
                .await;
            let remaining_for_consume = generated - reserved.len();
            let consumed = pool
                .get_keys(consume_count.min(remaining_for_consume), "c", Duration::from_millis(20), true)
                .await;

            let status = pool.status().await;
            prop_assert_eq!(
                status.available + status.reserved + status.total_retrieved as usize,
                status.total_generated as usize
            );
            prop_assert_eq!(status.reserved, reserved.len());
            prop_assert_eq!(status.total_retrieved as usize, consumed.len());
            Ok(())
        })?;
    }

    /// Invariant 9: N concurrent single-key fetches against a pool of K <= N
    /// available keys complete with exactly K successes and no key_ID is ever
    /// delivered to more than one caller.
    #[test]
    fn prop_concurrent_fetch_delivers_exactly_k(n in 1usize..12, k_raw in 0usize..12) {
        let k = k_raw.min(n);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = fresh_engine(k).await;
            pool.add_keys_batch(k).await;

            let mut tasks = Vec::with_capacity(n);
            for i in 0..n {
                let pool = pool.clone();
                tasks.push(tokio::spawn(async move {
                    pool.get_keys(1, &format!("req-{i}"), Duration::from_millis(100), true).await
                }));
            }

            let mut seen = HashSet::new();
            let mut successes = 0;
            for task in tasks {
                let keys = task.await.unwrap();
                if let Some(key) = keys.into_iter().next() {
                    prop_assert!(seen.insert(key.key_id), "duplicate delivery across concurrent callers");
                    successes += 1;
                }
            }

            prop_assert_eq!(successes, k, "expected exactly {} successes out of {} callers", k, n);
            Ok(())
        })?;
    }
}
