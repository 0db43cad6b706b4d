//! Cache store over a vector index
//!
//! `VectorCacheStore` owns entry metadata and is the sole writer to the
//! vector index. Writes (put, eviction removal) are serialized through a
//! single async gate; the read path only takes the metadata read lock and
//! is never blocked by a sweep in progress.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::clock::Clock;
use crate::domain::embedding::SimilarityMetric;
use crate::domain::semantic_cache::{
    CacheEntry, CacheStore, EvictionReport, FreshHit, RetryConfig, SemanticCacheConfig,
};
use crate::domain::vector_index::VectorIndex;
use crate::domain::DomainError;

/// Retry a fallible index operation, backing off on transient failures
pub(crate) async fn with_retry<T, F, Fut>(retry: &RetryConfig, op: F) -> Result<T, DomainError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient index failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Metadata bookkeeping layered on a `VectorIndex`
pub struct VectorCacheStore {
    index: Arc<dyn VectorIndex>,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Serializes index writes so a put never interleaves with an eviction
    /// removal on the same key
    write_gate: tokio::sync::Mutex<()>,
    max_entries: usize,
    min_entries: usize,
    retry: RetryConfig,
}

impl fmt::Debug for VectorCacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorCacheStore")
            .field("max_entries", &self.max_entries)
            .field("min_entries", &self.min_entries)
            .field("metric", &self.index.metric())
            .field("dimensions", &self.index.dimensions())
            .finish()
    }
}

impl VectorCacheStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        clock: Arc<dyn Clock>,
        config: &SemanticCacheConfig,
    ) -> Self {
        Self {
            index,
            clock,
            entries: RwLock::new(HashMap::new()),
            write_gate: tokio::sync::Mutex::new(()),
            max_entries: config.max_entries,
            min_entries: config.min_entries,
            retry: config.index_retry.clone(),
        }
    }

    fn read_entries(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>>, DomainError> {
        self.entries
            .read()
            .map_err(|e| DomainError::internal(format!("metadata lock poisoned: {}", e)))
    }

    fn write_entries(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>>, DomainError> {
        self.entries
            .write()
            .map_err(|e| DomainError::internal(format!("metadata lock poisoned: {}", e)))
    }

    /// Pick capacity victims from a sweep snapshot: least-recently-used
    /// first, lowest hit count breaking ties, never dipping below the floor
    fn capacity_victims(snapshot: &[(String, u64, u64)], target: usize) -> Vec<String> {
        let mut candidates: Vec<&(String, u64, u64)> = snapshot.iter().collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));
        candidates
            .into_iter()
            .take(target)
            .map(|(key, _, _)| key.clone())
            .collect()
    }
}

#[async_trait]
impl CacheStore for VectorCacheStore {
    async fn put(&self, entry: CacheEntry) -> Result<(), DomainError> {
        if entry.vector().len() != self.index.dimensions() {
            return Err(DomainError::store(format!(
                "entry vector dimensionality {} does not match index dimensionality {}",
                entry.vector().len(),
                self.index.dimensions()
            )));
        }

        let metadata = serde_json::to_value(&entry)
            .map_err(|e| DomainError::store(format!("failed to serialize entry metadata: {}", e)))?;

        let _gate = self.write_gate.lock().await;

        with_retry(&self.retry, || {
            self.index.insert(entry.key(), entry.vector(), metadata.clone())
        })
        .await
        .map_err(|e| DomainError::store(format!("index rejected entry '{}': {}", entry.key(), e)))?;

        self.write_entries()?.insert(entry.key().to_string(), entry);

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<FreshHit>, DomainError> {
        let hits = with_retry(&self.retry, || self.index.search(vector, top_k)).await?;

        let now = self.clock.now_unix_secs();
        let entries = self.read_entries()?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                entries
                    .get(&hit.key)
                    .filter(|entry| !entry.is_expired(now))
                    .map(|entry| FreshHit {
                        entry: entry.clone(),
                        similarity: hit.similarity,
                    })
            })
            .collect())
    }

    async fn touch(&self, key: &str) -> Result<(), DomainError> {
        let now = self.clock.now_unix_secs();
        let mut entries = self.write_entries()?;

        // The entry may have been evicted since the hit was served; that
        // loss is acceptable for bookkeeping
        if let Some(entry) = entries.get_mut(key) {
            entry.touch(now);
        }

        Ok(())
    }

    async fn evict(&self) -> Result<EvictionReport, DomainError> {
        let sweep_started = self.clock.now_unix_secs();

        // Snapshot under the read lock; no index I/O while holding it
        let (expired_keys, live_snapshot) = {
            let entries = self.read_entries()?;

            let mut expired_keys = Vec::new();
            let mut live = Vec::new();

            for (key, entry) in entries.iter() {
                if entry.is_expired(sweep_started) {
                    expired_keys.push(key.clone());
                } else {
                    live.push((key.clone(), entry.last_accessed_at(), entry.hit_count()));
                }
            }

            (expired_keys, live)
        };

        let over_ceiling = live_snapshot.len().saturating_sub(self.max_entries);
        let above_floor = live_snapshot.len().saturating_sub(self.min_entries);
        let target = over_ceiling.min(above_floor);

        let victims = Self::capacity_victims(&live_snapshot, target);

        let mut report = EvictionReport::default();
        let mut removed_keys = Vec::new();

        let _gate = self.write_gate.lock().await;

        {
            let mut entries = self.write_entries()?;

            for key in &expired_keys {
                // Expiry depends on creation time, so a concurrent touch
                // cannot resurrect these
                if entries.remove(key).is_some() {
                    report.expired += 1;
                    removed_keys.push(key.clone());
                }
            }

            for key in &victims {
                // Last write wins: skip entries touched since the sweep began
                match entries.get(key) {
                    Some(entry) if entry.last_accessed_at() > sweep_started => continue,
                    Some(_) => {}
                    None => continue,
                }

                entries.remove(key);
                report.evicted += 1;
                removed_keys.push(key.clone());
            }
        }

        for key in &removed_keys {
            if let Err(e) = with_retry(&self.retry, || self.index.delete(key)).await {
                tracing::error!(key = %key, error = %e, "failed to delete evicted vector");
            }
        }

        if report.total() > 0 {
            tracing::debug!(
                expired = report.expired,
                evicted = report.evicted,
                "eviction sweep complete"
            );
        }

        Ok(report)
    }

    async fn len(&self) -> Result<usize, DomainError> {
        Ok(self.read_entries()?.len())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let _gate = self.write_gate.lock().await;

        let keys: Vec<String> = {
            let mut entries = self.write_entries()?;
            let keys = entries.keys().cloned().collect();
            entries.clear();
            keys
        };

        for key in &keys {
            if let Err(e) = self.index.delete(key).await {
                tracing::error!(key = %key, error = %e, "failed to delete vector during clear");
            }
        }

        Ok(())
    }

    async fn recover(&self) -> Result<usize, DomainError> {
        let records = with_retry(&self.retry, || self.index.scan()).await?;

        let mut recovered = 0;
        let mut entries = self.write_entries()?;

        for record in records {
            match serde_json::from_value::<CacheEntry>(record.metadata) {
                Ok(entry) => {
                    entries.insert(entry.key().to_string(), entry);
                    recovered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        key = %record.key,
                        error = %e,
                        "skipping index record with unreadable metadata"
                    );
                }
            }
        }

        tracing::info!(recovered, "cache metadata recovered from index");

        Ok(recovered)
    }

    fn metric(&self) -> SimilarityMetric {
        self.index.metric()
    }

    fn dimensions(&self) -> usize {
        self.index.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::Sequence;

    use super::*;
    use crate::domain::answer::Answer;
    use crate::domain::clock::manual::ManualClock;
    use crate::domain::vector_index::{MockVectorIndex, SearchHit};
    use crate::infrastructure::vector_index::InMemoryVectorIndex;

    fn store_with(
        max_entries: usize,
        min_entries: usize,
        clock: Arc<ManualClock>,
    ) -> VectorCacheStore {
        let config = SemanticCacheConfig::new()
            .with_max_entries(max_entries)
            .with_min_entries(min_entries);
        let index = Arc::new(InMemoryVectorIndex::new(SimilarityMetric::Cosine, 3));
        VectorCacheStore::new(index, clock, &config)
    }

    fn entry(key: &str, vector: Vec<f32>, ttl: Option<Duration>, now: u64) -> CacheEntry {
        CacheEntry::new(key, vector, format!("query for {}", key), Answer::new(key), ttl, now)
    }

    #[tokio::test]
    async fn test_put_then_search_returns_entry_as_top_candidate() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(100, 0, clock);

        store
            .put(entry("a", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("b", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 4).await.unwrap();

        assert_eq!(hits[0].entry.key(), "a");
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_filters_expired_entries() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(100, 0, clock.clone());

        store
            .put(entry("short", vec![1.0, 0.0, 0.0], Some(Duration::from_secs(10)), 1000))
            .await
            .unwrap();
        store
            .put(entry("long", vec![0.9, 0.1, 0.0], Some(Duration::from_secs(999)), 1000))
            .await
            .unwrap();

        clock.advance(11);
        let hits = store.search(&[1.0, 0.0, 0.0], 4).await.unwrap();

        // The expired entry still occupies the index but is never a hit
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry.key(), "long");
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_replaces_vector_and_answer_together() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(100, 0, clock);

        store
            .put(entry("a", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();

        let replacement = CacheEntry::new(
            "a",
            vec![0.0, 1.0, 0.0],
            "new query",
            Answer::new("new answer"),
            None,
            1001,
        );
        store.put(replacement).await.unwrap();

        let got = store.get("a").await.unwrap().unwrap();
        assert_eq!(got.vector(), &[0.0, 1.0, 0.0]);
        assert_eq!(got.answer().payload(), "new answer");
    }

    #[tokio::test]
    async fn test_put_rejects_wrong_dimensions() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(100, 0, clock);

        let result = store.put(entry("bad", vec![1.0, 0.0], None, 1000)).await;

        assert!(matches!(result, Err(DomainError::Store { .. })));
    }

    #[tokio::test]
    async fn test_ttl_reaping() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(100, 0, clock.clone());

        store
            .put(entry("dies", vec![1.0, 0.0, 0.0], Some(Duration::from_secs(5)), 1000))
            .await
            .unwrap();
        store
            .put(entry("lives", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();

        clock.advance(6);
        let report = store.evict().await.unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.get("dies").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_eviction_removes_lru_first() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(2, 0, clock.clone());

        store
            .put(entry("old", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("mid", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("new", vec![0.0, 0.0, 1.0], None, 1000))
            .await
            .unwrap();

        // Touching refreshes recency, so "old" survives and "mid" goes
        clock.advance(10);
        store.touch("old").await.unwrap();
        store.touch("new").await.unwrap();

        clock.advance(10);
        let report = store.evict().await.unwrap();

        assert_eq!(report.evicted, 1);
        assert_eq!(store.len().await.unwrap(), 2);
        assert!(store.get("mid").await.unwrap().is_none());
        assert!(store.get("old").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_capacity_eviction_breaks_recency_ties_by_hit_count() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(1, 0, clock.clone());

        store
            .put(entry("popular", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("unloved", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();

        // Same last_accessed_at, different hit counts
        store.touch("popular").await.unwrap();
        store.touch("popular").await.unwrap();
        store.touch("unloved").await.unwrap();

        clock.advance(10);
        let report = store.evict().await.unwrap();

        assert_eq!(report.evicted, 1);
        assert!(store.get("popular").await.unwrap().is_some());
        assert!(store.get("unloved").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eviction_respects_floor() {
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(1, 2, clock.clone());

        store
            .put(entry("a", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("b", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("c", vec![0.0, 0.0, 1.0], None, 1000))
            .await
            .unwrap();

        clock.advance(10);
        let report = store.evict().await.unwrap();

        // Ceiling of 1 would remove two, but the floor of 2 wins
        assert_eq!(report.evicted, 1);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_eviction_skips_entries_touched_mid_sweep() {
        // A touch that lands after the sweep's snapshot timestamp must
        // survive the sweep (last-write-wins on last_accessed_at)
        let clock = Arc::new(ManualClock::new(1000));
        let store = store_with(1, 0, clock.clone());

        store
            .put(entry("racer", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store
            .put(entry("other", vec![0.0, 1.0, 0.0], None, 1000))
            .await
            .unwrap();

        // Hand both entries last-accessed times in the sweep's future, as
        // racing touches would; the sweep must then remove nothing even
        // though the store is over capacity
        {
            let mut entries = store.entries.write().unwrap();
            entries.get_mut("racer").unwrap().touch(2000);
            entries.get_mut("other").unwrap().touch(1600);
        }
        clock.set(1500);

        let report = store.evict().await.unwrap();

        assert_eq!(report.evicted, 0);
        assert!(store.get("racer").await.unwrap().is_some());
        assert!(store.get("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_put_same_key_stays_consistent() {
        let clock = Arc::new(ManualClock::new(1000));
        let index = Arc::new(InMemoryVectorIndex::new(SimilarityMetric::Cosine, 3));
        let store = Arc::new(VectorCacheStore::new(
            index.clone(),
            clock,
            &SemanticCacheConfig::default(),
        ));

        let mut handles = Vec::new();
        for i in 0..16u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let vector = vec![i as f32, 1.0, 0.0];
                let e = CacheEntry::new(
                    "contested",
                    vector,
                    format!("query {}", i),
                    Answer::new(format!("answer {}", i)),
                    None,
                    1000,
                );
                store.put(e).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever write won, metadata and index must agree on the vector,
        // and the answer must be the one written with that vector
        let got = store.get("contested").await.unwrap().unwrap();
        let records = index.scan().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vector, got.vector());

        let i = got.vector()[0] as u32;
        assert_eq!(got.answer().payload(), format!("answer {}", i));
    }

    #[tokio::test]
    async fn test_recover_rebuilds_metadata_from_index() {
        let clock = Arc::new(ManualClock::new(1000));
        let index = Arc::new(InMemoryVectorIndex::new(SimilarityMetric::Cosine, 3));
        let config = SemanticCacheConfig::default();

        {
            let store = VectorCacheStore::new(index.clone(), clock.clone(), &config);
            store
                .put(entry("persisted", vec![1.0, 0.0, 0.0], Some(Duration::from_secs(3600)), 1000))
                .await
                .unwrap();
        }

        // A fresh store over the same index starts empty, then recovers
        let store = VectorCacheStore::new(index, clock, &config);
        assert_eq!(store.len().await.unwrap(), 0);

        let recovered = store.recover().await.unwrap();
        assert_eq!(recovered, 1);

        let got = store.get("persisted").await.unwrap().unwrap();
        assert_eq!(got.answer().payload(), "persisted");
        assert_eq!(got.ttl(), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_transient_search_failure_is_retried_once() {
        let mut index = MockVectorIndex::new();
        let mut seq = Sequence::new();

        index
            .expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(DomainError::index_transient("connection reset")));
        index
            .expect_search()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(vec![SearchHit::new("a", 0.99)]));
        index.expect_metric().return_const(SimilarityMetric::Cosine);
        index.expect_dimensions().return_const(3usize);

        let clock = Arc::new(ManualClock::new(1000));
        let config = SemanticCacheConfig::default()
            .with_index_retry(RetryConfig::new(1).with_initial_delay(1));
        let store = VectorCacheStore::new(Arc::new(index), clock, &config);

        // The retried search succeeds; the hit has no metadata yet so the
        // result set is empty but the call does not error
        let hits = store.search(&[1.0, 0.0, 0.0], 4).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_persistent_transient_failure_surfaces_after_retries() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .times(2)
            .returning(|_, _| Err(DomainError::index_transient("connection reset")));
        index.expect_metric().return_const(SimilarityMetric::Cosine);
        index.expect_dimensions().return_const(3usize);

        let clock = Arc::new(ManualClock::new(1000));
        let config = SemanticCacheConfig::default()
            .with_index_retry(RetryConfig::new(1).with_initial_delay(1));
        let store = VectorCacheStore::new(Arc::new(index), clock, &config);

        let result = store.search(&[1.0, 0.0, 0.0], 4).await;
        assert!(matches!(
            result,
            Err(DomainError::Index { transient: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let mut index = MockVectorIndex::new();
        index
            .expect_search()
            .times(1)
            .returning(|_, _| Err(DomainError::index("corrupt index")));
        index.expect_metric().return_const(SimilarityMetric::Cosine);
        index.expect_dimensions().return_const(3usize);

        let clock = Arc::new(ManualClock::new(1000));
        let store = VectorCacheStore::new(
            Arc::new(index),
            clock,
            &SemanticCacheConfig::default(),
        );

        let result = store.search(&[1.0, 0.0, 0.0], 4).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_empties_store_and_index() {
        let clock = Arc::new(ManualClock::new(1000));
        let index = Arc::new(InMemoryVectorIndex::new(SimilarityMetric::Cosine, 3));
        let store = VectorCacheStore::new(index.clone(), clock, &SemanticCacheConfig::default());

        store
            .put(entry("a", vec![1.0, 0.0, 0.0], None, 1000))
            .await
            .unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(index.len().await.unwrap(), 0);
    }
}
