//! Shared Pool Engine (§4.B) — the master-owned store of pre-generated keys,
//! split into `available` (FIFO) and `reserved`. Guarded by a single monitor
//! (`tokio::sync::Mutex` + `Notify`), the async analogue of the teacher's
//! mutex-guarded connection state.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kme_core::model::{KeyRecord, PoolStatus};
use kme_core::KeyGenerator;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use crate::persistence::{self, PoolSnapshot};

struct PoolState {
    available: VecDeque<KeyRecord>,
    reserved: HashMap<String, KeyRecord>,
    total_generated: u64,
    total_retrieved: u64,
    per_kme_retrieved: BTreeMap<String, u64>,
}

pub struct SharedPoolEngine {
    state: Mutex<PoolState>,
    notify: Notify,
    pub default_key_size: usize,
    pub max_key_count: usize,
    pub batch_size: usize,
    pub refill_threshold: usize,
    pub generate_interval: Duration,
    persistence_path: String,
    stopped: AtomicBool,
}

impl SharedPoolEngine {
    pub async fn load(
        persistence_path: String,
        default_key_size: usize,
        max_key_count: usize,
        batch_size: usize,
        refill_threshold: usize,
        generate_interval: Duration,
    ) -> Arc<Self> {
        let snapshot = persistence::load(&persistence_path).await;
        let (available, total_generated, total_retrieved) = snapshot.into_available();
        info!(
            "shared pool loaded {} key(s) from {persistence_path}",
            available.len()
        );

        Arc::new(Self {
            state: Mutex::new(PoolState {
                available,
                reserved: HashMap::new(),
                total_generated,
                total_retrieved,
                per_kme_retrieved: BTreeMap::new(),
            }),
            notify: Notify::new(),
            default_key_size,
            max_key_count,
            batch_size,
            refill_threshold,
            generate_interval,
            persistence_path,
            stopped: AtomicBool::new(false),
        })
    }

    async fn persist(&self, state: &PoolState) {
        let snapshot = PoolSnapshot::from_available(
            &state.available,
            state.total_generated,
            state.total_retrieved,
        );
        persistence::save(&self.persistence_path, &snapshot).await;
    }

    /// Generates up to `min(n, capacity_left)` keys and appends them to
    /// `available`. Returns the number actually added.
    pub async fn add_keys_batch(&self, n: usize) -> usize {
        let mut state = self.state.lock().await;
        let remaining_capacity = self.max_key_count.saturating_sub(state.available.len());
        let to_generate = n.min(remaining_capacity);

        if to_generate == 0 {
            return 0;
        }

        for _ in 0..to_generate {
            match KeyGenerator::generate(self.default_key_size) {
                Ok(key) => {
                    state.available.push_back(key);
                    state.total_generated += 1;
                }
                Err(e) => {
                    warn!("key generation failed, stopping batch early: {e}");
                    break;
                }
            }
        }

        self.persist(&state).await;
        self.notify.notify_waiters();
        info!(
            "generated {to_generate} key(s), pool now has {}/{} keys",
            state.available.len(),
            self.max_key_count
        );
        to_generate
    }

    /// Dequeues up to `n` keys from the front of `available`, blocking up to
    /// `timeout` for more to arrive. May return fewer than `n` on timeout.
    /// `remove=true` removes keys from the pool entirely (counted as retrieved);
    /// `remove=false` moves them to `reserved`.
    pub async fn get_keys(
        &self,
        n: usize,
        requester_id: &str,
        timeout: Duration,
        remove: bool,
    ) -> Vec<KeyRecord> {
        let deadline = Instant::now() + timeout;
        let mut collected = Vec::with_capacity(n);

        loop {
            {
                let mut state = self.state.lock().await;
                let mut mutated = false;
                while collected.len() < n {
                    let Some(key) = state.available.pop_front() else {
                        break;
                    };
                    mutated = true;
                    if remove {
                        state.total_retrieved += 1;
                        *state
                            .per_kme_retrieved
                            .entry(requester_id.to_string())
                            .or_insert(0) += 1;
                        collected.push(key);
                    } else {
                        state.reserved.insert(key.key_id.clone(), key.clone());
                        collected.push(key);
                    }
                }
                if mutated {
                    self.persist(&state).await;
                }
                if collected.len() >= n {
                    return collected;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return collected;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    /// Looks up a single key by id: checks `reserved` first, then `available`.
    pub async fn get_key_by_id(
        &self,
        key_id: &str,
        requester_id: &str,
        remove: bool,
    ) -> Option<KeyRecord> {
        let mut state = self.state.lock().await;

        if let Some(key) = state.reserved.get(key_id).cloned() {
            if remove {
                state.reserved.remove(key_id);
                state.total_retrieved += 1;
                *state
                    .per_kme_retrieved
                    .entry(requester_id.to_string())
                    .or_insert(0) += 1;
                self.persist(&state).await;
            }
            return Some(key);
        }

        if let Some(pos) = state.available.iter().position(|k| k.key_id == key_id) {
            return if remove {
                let key = state.available.remove(pos).unwrap();
                state.total_retrieved += 1;
                *state
                    .per_kme_retrieved
                    .entry(requester_id.to_string())
                    .or_insert(0) += 1;
                self.persist(&state).await;
                Some(key)
            } else {
                Some(state.available[pos].clone())
            };
        }

        None
    }

    pub async fn status(&self) -> PoolStatus {
        let state = self.state.lock().await;
        let available = state.available.len();
        let reserved = state.reserved.len();
        let total_available = available + reserved;
        PoolStatus {
            available,
            reserved,
            total_available,
            max_capacity: self.max_key_count,
            total_generated: state.total_generated,
            total_retrieved: state.total_retrieved,
            per_kme_retrieved: state.per_kme_retrieved.clone(),
            utilization_pct: if self.max_key_count == 0 {
                0.0
            } else {
                (total_available as f64 / self.max_key_count as f64) * 100.0
            },
        }
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Background refill loop (§4.B): runs only on the master role. Checking
    /// the stop flag at each sleep boundary lets shutdown happen promptly.
    pub async fn run_refill_loop(self: Arc<Self>) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }

            let available_len = {
                let state = self.state.lock().await;
                state.available.len()
            };
            let capacity_left = self.max_key_count.saturating_sub(available_len);

            if available_len < self.refill_threshold && capacity_left > 0 {
                let batch = self.batch_size.min(capacity_left);
                self.add_keys_batch(batch).await;
            }

            tokio::time::sleep(self.generate_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine(max: usize) -> Arc<SharedPoolEngine> {
        SharedPoolEngine::load(
            format!("/tmp/kme-test-pool-{}.json", uuid::Uuid::new_v4()),
            32,
            max,
            10,
            5,
            Duration::from_millis(10),
        )
        .await
    }

    #[tokio::test]
    async fn add_keys_batch_respects_capacity() {
        let pool = engine(5).await;
        let added = pool.add_keys_batch(10).await;
        assert_eq!(added, 5);
        let status = pool.status().await;
        assert_eq!(status.available, 5);
    }

    #[tokio::test]
    async fn get_keys_reserves_by_default() {
        let pool = engine(5).await;
        pool.add_keys_batch(2).await;
        let keys = pool.get_keys(2, "1", Duration::from_secs(1), false).await;
        assert_eq!(keys.len(), 2);
        let status = pool.status().await;
        assert_eq!(status.available, 0);
        assert_eq!(status.reserved, 2);
    }

    #[tokio::test]
    async fn get_keys_times_out_with_partial_result() {
        let pool = engine(1).await;
        pool.add_keys_batch(1).await;
        let keys = pool
            .get_keys(3, "1", Duration::from_millis(50), true)
            .await;
        assert_eq!(keys.len(), 1);
    }

    #[tokio::test]
    async fn get_key_by_id_checks_reserved_before_available() {
        let pool = engine(5).await;
        pool.add_keys_batch(1).await;
        let reserved = pool.get_keys(1, "1", Duration::from_secs(1), false).await;
        let id = &reserved[0].key_id;
        let found = pool.get_key_by_id(id, "2", true).await;
        assert!(found.is_some());
        assert_eq!(pool.status().await.reserved, 0);
    }

    #[tokio::test]
    async fn conservation_invariant_holds_across_ops() {
        let pool = engine(10).await;
        pool.add_keys_batch(10).await;
        let reserved = pool.get_keys(4, "1", Duration::from_secs(1), false).await;
        for key in &reserved {
            pool.get_key_by_id(&key.key_id, "2", true).await;
        }
        let status = pool.status().await;
        // available(6) + reserved(0) + consumed(4) == total_generated(10)
        assert_eq!(status.available + status.reserved + 4, status.total_generated as usize);
    }
}
