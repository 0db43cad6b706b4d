//! Semantic cache decision engine
//!
//! Owns the hit/miss decision, request coalescing, and entry lifecycle
//! scheduling. The hit path takes no global lock: pending-request and
//! bookkeeping state live behind their own short-lived locks, and all
//! expensive work happens outside them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::answer::{Answer, Answerer};
use crate::domain::clock::Clock;
use crate::domain::embedding::Embedder;
use crate::domain::semantic_cache::{
    threshold_policy, CacheEntry, CacheOutcome, CacheStats, CacheStore, FreshHit, Resolution,
    ResolveOptions, SemanticCacheConfig, SimilarityCandidate, SimilarityPolicy,
};
use crate::domain::DomainError;

use super::fingerprint::fingerprint;

/// Outcome fanned out to every waiter of an in-flight resolution
type PendingOutcome = Result<Answer, DomainError>;

enum PendingRole {
    Leader(broadcast::Receiver<PendingOutcome>),
    Waiter(broadcast::Receiver<PendingOutcome>),
}

/// In-flight resolutions keyed by coalescing fingerprint
///
/// Slots are registered with a single entry-or-insert so concurrent misses
/// for the same fingerprint elect exactly one leader.
#[derive(Debug, Default)]
struct PendingRegistry {
    slots: Mutex<HashMap<u64, broadcast::Sender<PendingOutcome>>>,
}

impl PendingRegistry {
    /// Join an in-flight resolution if one exists
    fn subscribe(&self, fp: u64) -> Option<broadcast::Receiver<PendingOutcome>> {
        self.slots
            .lock()
            .expect("pending registry lock poisoned")
            .get(&fp)
            .map(|tx| tx.subscribe())
    }

    /// Become the leader for `fp`, or join the existing leader as a waiter
    fn register_or_join(&self, fp: u64) -> (PendingRole, Option<broadcast::Sender<PendingOutcome>>) {
        let mut slots = self.slots.lock().expect("pending registry lock poisoned");

        match slots.entry(fp) {
            Entry::Occupied(slot) => (PendingRole::Waiter(slot.get().subscribe()), None),
            Entry::Vacant(slot) => {
                let (tx, rx) = broadcast::channel(1);
                slot.insert(tx.clone());
                (PendingRole::Leader(rx), Some(tx))
            }
        }
    }

    fn remove(&self, fp: u64) {
        self.slots
            .lock()
            .expect("pending registry lock poisoned")
            .remove(&fp);
    }
}

/// Bounded queue of hit-count updates, drained off the request path
///
/// On overflow the oldest pending update is dropped: bookkeeping loss is
/// acceptable, request-path stalls are not.
#[derive(Debug)]
struct TouchQueue {
    queue: Mutex<VecDeque<String>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl TouchQueue {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    fn push(&self, key: String) {
        {
            let mut queue = self.queue.lock().expect("touch queue lock poisoned");
            if queue.len() == self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("touch queue saturated, dropped oldest update");
            }
            queue.push_back(key);
        }
        self.notify.notify_one();
    }

    async fn pop(&self) -> String {
        loop {
            if let Some(key) = self
                .queue
                .lock()
                .expect("touch queue lock poisoned")
                .pop_front()
            {
                return key;
            }
            self.notify.notified().await;
        }
    }
}

#[derive(Debug, Default)]
struct EngineCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced_hits: AtomicU64,
    evictions: AtomicU64,
    expired_reaped: AtomicU64,
    hit_similarity_millis: AtomicU64,
}

impl EngineCounters {
    fn record_hit(&self, similarity: f32) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.hit_similarity_millis
            .fetch_add((similarity.max(0.0) * 1000.0) as u64, Ordering::Relaxed);
    }

    fn avg_hit_similarity(&self) -> f32 {
        let hits = self.hits.load(Ordering::Relaxed);
        if hits == 0 {
            return 0.0;
        }
        self.hit_similarity_millis.load(Ordering::Relaxed) as f32 / 1000.0 / hits as f32
    }
}

/// The semantic cache decision engine
///
/// Construction validates configuration (threshold range, metric agreement
/// between embedder and index, dimensionality agreement) and spawns the
/// bookkeeping worker plus the eviction scheduler. Call `shutdown` to stop
/// the background tasks.
pub struct CacheEngine {
    config: SemanticCacheConfig,
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn Answerer>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    policy: SimilarityPolicy,
    pending: Arc<PendingRegistry>,
    touches: Arc<TouchQueue>,
    counters: Arc<EngineCounters>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEngine")
            .field("config", &self.config)
            .field("embedder", &self.embedder.provider_name())
            .field("answerer", &self.answerer.name())
            .finish()
    }
}

impl CacheEngine {
    /// Create an engine with the default threshold policy
    pub fn new(
        config: SemanticCacheConfig,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn Answerer>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, DomainError> {
        Self::with_policy(config, embedder, answerer, store, clock, threshold_policy())
    }

    /// Create an engine with an injected hit/miss policy
    pub fn with_policy(
        config: SemanticCacheConfig,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn Answerer>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        policy: SimilarityPolicy,
    ) -> Result<Arc<Self>, DomainError> {
        config.validate()?;

        if store.metric() != config.metric {
            return Err(DomainError::configuration(format!(
                "configured metric {} does not match index metric {}",
                config.metric,
                store.metric()
            )));
        }

        if embedder.dimensions() != store.dimensions() {
            return Err(DomainError::configuration(format!(
                "embedder dimensionality {} does not match index dimensionality {}",
                embedder.dimensions(),
                store.dimensions()
            )));
        }

        let engine = Arc::new(Self {
            touches: Arc::new(TouchQueue::new(config.touch_queue_capacity)),
            config,
            embedder,
            answerer,
            store,
            clock,
            policy,
            pending: Arc::new(PendingRegistry::default()),
            counters: Arc::new(EngineCounters::default()),
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = engine.tasks.lock().expect("task list lock poisoned");
        tasks.push(engine.spawn_touch_worker());
        tasks.push(engine.spawn_eviction_scheduler());
        drop(tasks);

        Ok(engine)
    }

    /// Resolve a query, reusing a cached answer when one is semantically
    /// close enough
    pub async fn resolve(
        &self,
        query: &str,
        opts: ResolveOptions,
    ) -> Result<Resolution, DomainError> {
        match opts.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.resolve_inner(query, &opts))
                .await
                .map_err(|_| DomainError::timeout(timeout.as_millis() as u64))?,
            None => self.resolve_inner(query, &opts).await,
        }
    }

    async fn resolve_inner(
        &self,
        query: &str,
        opts: &ResolveOptions,
    ) -> Result<Resolution, DomainError> {
        let embedding = self.embed(query).await?;
        let fp = fingerprint(&embedding);

        // Join an in-flight resolution before paying for a lookup
        if let Some(rx) = self.pending.subscribe(fp) {
            return self.await_pending(rx).await;
        }

        let threshold = opts
            .threshold_override
            .unwrap_or(self.config.similarity_threshold);

        let candidates = self.store.search(&embedding, self.config.top_k).await?;

        if let Some(hit) = self.select_candidate(query, &candidates, threshold) {
            let similarity = hit.similarity;
            self.counters.record_hit(similarity);
            counter!("documind_cache_resolves_total", "outcome" => "hit").increment(1);
            tracing::debug!(similarity, entry = %hit.entry.key(), "cache hit");

            // Bookkeeping must never block the response
            self.touches.push(hit.entry.key().to_string());

            return Ok(Resolution::new(
                hit.entry.answer().clone(),
                CacheOutcome::Hit { similarity },
            ));
        }

        // Miss. Between the earlier pending check and now another caller
        // may have registered, so electing the leader re-checks the slot.
        let (role, tx) = self.pending.register_or_join(fp);

        match role {
            PendingRole::Waiter(rx) => self.await_pending(rx).await,
            PendingRole::Leader(rx) => {
                self.spawn_resolution(fp, query, embedding, opts, tx.expect("leader without slot"));

                match self.recv_outcome(rx).await? {
                    Ok(answer) => {
                        self.counters.misses.fetch_add(1, Ordering::Relaxed);
                        counter!("documind_cache_resolves_total", "outcome" => "miss")
                            .increment(1);
                        Ok(Resolution::new(answer, CacheOutcome::Miss))
                    }
                    Err(e) => {
                        counter!("documind_cache_resolves_total", "outcome" => "error")
                            .increment(1);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Run the answerer and commit the result in a detached task, so the
    /// cache is populated even if every waiter cancels or times out
    fn spawn_resolution(
        &self,
        fp: u64,
        query: &str,
        embedding: Vec<f32>,
        opts: &ResolveOptions,
        tx: broadcast::Sender<PendingOutcome>,
    ) {
        let answerer = self.answerer.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        let pending = self.pending.clone();
        let query = query.to_string();
        let context = opts.context.clone();
        let ttl = opts.ttl_override.or_else(|| self.config.ttl());

        tokio::spawn(async move {
            let started = Instant::now();
            let result = answerer.generate(&query, context.as_deref()).await;
            histogram!("documind_answerer_duration_seconds")
                .record(started.elapsed().as_secs_f64());

            let outcome = match result {
                Ok(answer) => {
                    let entry = CacheEntry::new(
                        Uuid::new_v4().to_string(),
                        embedding,
                        &query,
                        answer.clone(),
                        ttl,
                        clock.now_unix_secs(),
                    );

                    // A failed commit loses the cache write, not the answer
                    if let Err(e) = store.put(entry).await {
                        tracing::error!(error = %e, "failed to commit resolved answer");
                    }

                    Ok(answer)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "answer generation failed");
                    counter!("documind_answerer_errors_total").increment(1);
                    Err(e)
                }
            };

            // Deregister before broadcasting: late callers start a fresh
            // resolve and find the committed entry instead
            pending.remove(fp);
            let _ = tx.send(outcome);
        });
    }

    async fn await_pending(
        &self,
        rx: broadcast::Receiver<PendingOutcome>,
    ) -> Result<Resolution, DomainError> {
        match self.recv_outcome(rx).await? {
            Ok(answer) => {
                self.counters.coalesced_hits.fetch_add(1, Ordering::Relaxed);
                counter!("documind_cache_resolves_total", "outcome" => "coalesced_hit")
                    .increment(1);
                Ok(Resolution::new(answer, CacheOutcome::CoalescedHit))
            }
            Err(e) => Err(e),
        }
    }

    async fn recv_outcome(
        &self,
        mut rx: broadcast::Receiver<PendingOutcome>,
    ) -> Result<PendingOutcome, DomainError> {
        rx.recv()
            .await
            .map_err(|_| DomainError::internal("in-flight resolution dropped without an outcome"))
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>, DomainError> {
        let embedding = self.embedder.embed(query).await?;

        if embedding.len() != self.embedder.dimensions() {
            return Err(DomainError::embedding(format!(
                "provider '{}' returned {} dimensions, expected {}",
                self.embedder.provider_name(),
                embedding.len(),
                self.embedder.dimensions()
            )));
        }

        Ok(embedding)
    }

    /// Apply the policy, then break near-ties in favor of the entry with
    /// the least TTL remaining so a fresher near-duplicate can take over
    /// from a perpetually-served older one
    fn select_candidate<'a>(
        &self,
        query: &str,
        candidates: &'a [FreshHit],
        threshold: f32,
    ) -> Option<&'a FreshHit> {
        let passing: Vec<&FreshHit> = candidates
            .iter()
            .filter(|hit| {
                (self.policy)(
                    query,
                    &SimilarityCandidate {
                        entry: &hit.entry,
                        similarity: hit.similarity,
                        threshold,
                    },
                )
            })
            .collect();

        let top = passing.first()?.similarity;
        let now = self.clock.now_unix_secs();

        passing
            .into_iter()
            .filter(|hit| top - hit.similarity <= self.config.tie_epsilon)
            .min_by_key(|hit| hit.entry.ttl_remaining(now).unwrap_or(u64::MAX))
    }

    /// Current counters plus the live entry count
    pub async fn stats(&self) -> Result<CacheStats, DomainError> {
        Ok(CacheStats {
            entries: self.store.len().await?,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced_hits: self.counters.coalesced_hits.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired_reaped: self.counters.expired_reaped.load(Ordering::Relaxed),
            avg_hit_similarity: self.counters.avg_hit_similarity(),
        })
    }

    /// Stop the bookkeeping worker and eviction scheduler
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().expect("task list lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    fn spawn_touch_worker(&self) -> JoinHandle<()> {
        let touches = self.touches.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            loop {
                let key = touches.pop().await;
                if let Err(e) = store.touch(&key).await {
                    tracing::warn!(key = %key, error = %e, "hit-count update failed");
                }
            }
        })
    }

    fn spawn_eviction_scheduler(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let counters = self.counters.clone();
        let interval = self.config.eviction_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a sweep never
            // races engine construction
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match store.evict().await {
                    Ok(report) => {
                        counters
                            .evictions
                            .fetch_add(report.evicted as u64, Ordering::Relaxed);
                        counters
                            .expired_reaped
                            .fetch_add(report.expired as u64, Ordering::Relaxed);
                        if report.evicted > 0 {
                            counter!("documind_cache_evictions_total", "reason" => "capacity")
                                .increment(report.evicted as u64);
                        }
                        if report.expired > 0 {
                            counter!("documind_cache_evictions_total", "reason" => "expired")
                                .increment(report.expired as u64);
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "eviction sweep failed"),
                }
            }
        })
    }
}
