//! Resource lifecycle: acquire, reference counting, timed eviction, restore.
//!
//! States per resource:
//!
//! ```text
//! Fetching -> Active (ref_count > 0) <-> IdleSeeding (ref_count == 0, timer) -> Evicted
//! ```
//!
//! Two independent triggers evict: the per-resource idle timer and the
//! periodic sweep. Both go through [`ResourceManager::evict_if`], which holds
//! the per-resource lock and re-checks state under the registry lock, so a
//! resource is destroyed at most once.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ResourceConfig;
use crate::logging::LogThrottle;
use crate::metrics;

use super::engine::{ByteStream, EngineTorrent, TorrentSource, TransferEngine};
use super::store::ResumeStore;
use super::types::{
    AcquiredResource, ByteRange, EvictionReason, ManagerStats, Metadata, ResourceError,
    ResourceSnapshot, ResourceState, RestoreOutcome, RestoreReport,
};

/// Extract the lowercase hex info hash from a magnet link.
pub fn info_hash_from_magnet(uri: &str) -> Option<String> {
    let lower = uri.to_lowercase();
    if !lower.starts_with("magnet:") {
        return None;
    }
    let start = lower.find("xt=urn:btih:")? + "xt=urn:btih:".len();
    let hash: String = lower[start..].chars().take_while(|c| *c != '&').collect();
    (hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())).then_some(hash)
}

/// Coalescing key for a uri: the info hash when the uri carries one.
fn resource_key(uri: &str) -> String {
    info_hash_from_magnet(uri).unwrap_or_else(|| uri.to_string())
}

#[derive(Debug)]
struct EvictionTimer {
    generation: u64,
    deadline: Option<DateTime<Utc>>,
    task: AbortHandle,
}

#[derive(Debug)]
struct ResourceEntry {
    name: String,
    uri: Option<String>,
    added_at: DateTime<Utc>,
    ref_count: usize,
    timer: Option<EvictionTimer>,
}

#[derive(Debug, Default)]
struct Registry {
    resources: HashMap<String, ResourceEntry>,
    fetching: HashSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum EvictCheck {
    /// No open streams.
    Idle,
    /// No open streams and the seed window, measured from added-at, elapsed.
    Expired,
    /// The timer of this generation is still the armed one.
    Timer(u64),
}

struct Inner {
    engine: Arc<dyn TransferEngine>,
    store: ResumeStore,
    seed_window: Duration,
    fetch_timeout: Duration,
    sweep_interval: Duration,
    registry: Mutex<Registry>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    next_generation: AtomicU64,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    log_throttle: LogThrottle,
}

/// Owns the lifecycle of every downloaded resource.
///
/// Cheap to clone; all clones share state. Callers only ever hold info hashes.
#[derive(Clone)]
pub struct ResourceManager {
    inner: Arc<Inner>,
}

impl ResourceManager {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        store: ResumeStore,
        config: &ResourceConfig,
    ) -> Self {
        Self::with_timings(
            engine,
            store,
            config.seed_window(),
            config.metadata_timeout(),
            config.sweep_interval(),
        )
    }

    pub fn with_timings(
        engine: Arc<dyn TransferEngine>,
        store: ResumeStore,
        seed_window: Duration,
        fetch_timeout: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                engine,
                store,
                seed_window,
                fetch_timeout,
                sweep_interval,
                registry: Mutex::new(Registry::default()),
                key_locks: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                running: AtomicBool::new(false),
                shutdown_tx,
                log_throttle: LogThrottle::default(),
            }),
        }
    }

    pub fn engine(&self) -> &Arc<dyn TransferEngine> {
        &self.inner.engine
    }

    pub fn seed_window(&self) -> Duration {
        self.inner.seed_window
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    fn forget_key_lock(&self, key: &str) {
        let mut locks = self.inner.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }

    /// Time left in the seed window, `None` once it has elapsed.
    fn remaining(&self, added_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
        let elapsed = (now - added_at).to_std().unwrap_or(Duration::ZERO);
        self.inner
            .seed_window
            .checked_sub(elapsed)
            .filter(|d| !d.is_zero())
    }

    // =========================================================================
    // Acquire
    // =========================================================================

    /// Resolve metadata for `uri` within the fetch timeout.
    ///
    /// Does not register the resource. On timeout the in-flight fetch is
    /// dropped.
    pub async fn acquire_for_metadata_only(&self, uri: &str) -> Result<Metadata, ResourceError> {
        let fetch = self.inner.engine.fetch_metadata(uri);
        match timeout(self.inner.fetch_timeout, fetch).await {
            Ok(Ok(metadata)) => {
                metrics::METADATA_FETCHES.with_label_values(&["ok"]).inc();
                Ok(metadata)
            }
            Ok(Err(e)) => {
                metrics::METADATA_FETCHES.with_label_values(&["error"]).inc();
                debug!(uri = %uri, error = %e, "Metadata fetch failed");
                Err(e.into())
            }
            Err(_) => {
                metrics::METADATA_FETCHES.with_label_values(&["timeout"]).inc();
                debug!(uri = %uri, "Metadata fetch timed out");
                Err(ResourceError::TimedOut(self.inner.fetch_timeout))
            }
        }
    }

    /// Add `uri` to the engine (or reuse it) and register it for streaming.
    ///
    /// Concurrent calls for the same resource are serialized, so only one
    /// download is ever started. The resume record is written on first
    /// registration only. On timeout the engine drops whatever the
    /// interrupted add left behind.
    pub async fn acquire_for_streaming(
        &self,
        uri: &str,
    ) -> Result<AcquiredResource, ResourceError> {
        let (acquired, ()) = self.acquire(uri, |_, _| Ok(())).await?;
        Ok(acquired)
    }

    /// Acquire `uri` and open a stream on it in one step.
    ///
    /// The lease is taken while the resource lock is held, so neither the
    /// timer nor the sweep can evict between the acquire and the first
    /// open stream.
    pub async fn acquire_with_lease(
        &self,
        uri: &str,
    ) -> Result<(AcquiredResource, StreamLease), ResourceError> {
        self.acquire(uri, |manager, info_hash| manager.lease(info_hash))
            .await
    }

    async fn acquire<T>(
        &self,
        uri: &str,
        then: impl FnOnce(&Self, &str) -> Result<T, ResourceError>,
    ) -> Result<(AcquiredResource, T), ResourceError> {
        let key = resource_key(uri);
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let result = {
            let _fetching = FetchingGuard::new(self, &key);
            let add = self
                .inner
                .engine
                .add_or_fetch(TorrentSource::Uri(uri.to_string()));
            timeout(self.inner.fetch_timeout, add).await
        };

        let torrent = match result {
            Ok(Ok(torrent)) => torrent,
            Ok(Err(e)) => {
                metrics::ACQUIRES.with_label_values(&["error"]).inc();
                warn!(uri = %uri, error = %e, "Failed to acquire resource");
                return Err(e.into());
            }
            Err(_) => {
                metrics::ACQUIRES.with_label_values(&["timeout"]).inc();
                warn!(uri = %uri, timeout = ?self.inner.fetch_timeout, "Acquire timed out");
                if let Err(e) = self.inner.engine.abandon(uri).await {
                    warn!(uri = %uri, error = %e, "Failed to drop abandoned resource");
                }
                return Err(ResourceError::TimedOut(self.inner.fetch_timeout));
            }
        };
        metrics::ACQUIRES.with_label_values(&["ok"]).inc();

        // Eviction locks by info hash; take that lock too when the uri key differs.
        let info_hash = torrent.metadata.info_hash.clone();
        let hash_lock = (info_hash != key).then(|| self.key_lock(&info_hash));
        let _hash_guard = match &hash_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        self.register(&torrent, Some(uri), None).await;
        let extra = then(self, &info_hash)?;

        Ok((
            AcquiredResource {
                info_hash,
                metadata: torrent.metadata,
            },
            extra,
        ))
    }

    /// Register a resource the engine now holds. No-op if already known.
    ///
    /// `restored_at` carries the persisted added-at time during restore; the
    /// timer is then left for the caller to arm.
    async fn register(
        &self,
        torrent: &EngineTorrent,
        uri: Option<&str>,
        restored_at: Option<DateTime<Utc>>,
    ) {
        let info_hash = &torrent.metadata.info_hash;
        if self.registry().resources.contains_key(info_hash) {
            return;
        }

        let added_at = match restored_at {
            Some(t) => t,
            None => match self
                .inner
                .store
                .save(info_hash, &torrent.descriptor, Utc::now())
                .await
            {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        info_hash = %info_hash,
                        error = %e,
                        "Failed to persist resume record, continuing without it"
                    );
                    Utc::now()
                }
            },
        };

        let mut registry = self.registry();
        if registry.resources.contains_key(info_hash) {
            return;
        }
        registry.resources.insert(
            info_hash.clone(),
            ResourceEntry {
                name: torrent.metadata.name.clone(),
                uri: uri.map(str::to_string),
                added_at,
                ref_count: 0,
                timer: None,
            },
        );
        metrics::KNOWN_RESOURCES.set(registry.resources.len() as i64);

        info!(
            info_hash = %info_hash,
            name = %torrent.metadata.name,
            restored = restored_at.is_some(),
            "Resource registered"
        );

        if restored_at.is_none() {
            self.arm_timer(&mut registry, info_hash, self.inner.seed_window);
        }
    }

    /// Open a byte range of a file in a registered resource.
    pub async fn open_byte_range(
        &self,
        info_hash: &str,
        file_path: &str,
        range: ByteRange,
    ) -> Result<ByteStream, ResourceError> {
        if !self.registry().resources.contains_key(info_hash) {
            return Err(ResourceError::UnknownResource(info_hash.to_string()));
        }
        Ok(self
            .inner
            .engine
            .open_byte_range(info_hash, file_path, range)
            .await?)
    }

    // =========================================================================
    // Reference counting
    // =========================================================================

    /// A stream on `info_hash` opened. Cancels any pending eviction timer.
    ///
    /// Returns the new reference count.
    pub fn stream_opened(&self, info_hash: &str) -> Result<usize, ResourceError> {
        let mut registry = self.registry();
        let entry = registry
            .resources
            .get_mut(info_hash)
            .ok_or_else(|| ResourceError::UnknownResource(info_hash.to_string()))?;

        entry.ref_count += 1;
        if entry.ref_count == 1 {
            if let Some(timer) = entry.timer.take() {
                timer.task.abort();
                debug!(info_hash = %info_hash, "Eviction timer cancelled");
            }
        }

        metrics::STREAMS_OPENED.inc();
        metrics::OPEN_STREAMS.inc();
        Ok(entry.ref_count)
    }

    /// A stream on `info_hash` closed. Arms the eviction timer when the last
    /// stream goes away. Unmatched calls are ignored.
    pub fn stream_closed(&self, info_hash: &str) {
        let mut registry = self.registry();
        let now_idle = match registry.resources.get_mut(info_hash) {
            None => {
                warn!(info_hash = %info_hash, "Stream closed on unknown resource");
                return;
            }
            Some(entry) if entry.ref_count == 0 => {
                warn!(info_hash = %info_hash, "Stream closed without a matching open");
                return;
            }
            Some(entry) => {
                entry.ref_count -= 1;
                metrics::OPEN_STREAMS.dec();
                entry.ref_count == 0
            }
        };

        if now_idle {
            debug!(info_hash = %info_hash, "Last stream closed, seeding until window ends");
            self.arm_timer(&mut registry, info_hash, self.inner.seed_window);
        }
    }

    /// Count a stream as open until the returned lease is dropped.
    pub fn lease(&self, info_hash: &str) -> Result<StreamLease, ResourceError> {
        self.stream_opened(info_hash)?;
        Ok(StreamLease {
            manager: self.clone(),
            info_hash: info_hash.to_string(),
        })
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Arm (or re-arm) the eviction timer. Caller holds the registry lock.
    fn arm_timer(&self, registry: &mut Registry, info_hash: &str, delay: Duration) {
        let Some(entry) = registry.resources.get_mut(info_hash) else {
            return;
        };
        if let Some(old) = entry.timer.take() {
            old.task.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(info_hash = %info_hash, "No runtime, eviction left to the sweep");
            return;
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let manager = self.clone();
        let key = info_hash.to_string();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            manager
                .evict_if(&key, EvictCheck::Timer(generation), EvictionReason::Timer)
                .await;
        });

        let deadline = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));

        entry.timer = Some(EvictionTimer {
            generation,
            deadline,
            task: task.abort_handle(),
        });
    }

    /// Evict an idle resource now. Returns `false` if it is unknown, already
    /// evicted, or has open streams.
    pub async fn evict(&self, info_hash: &str) -> bool {
        self.evict_if(info_hash, EvictCheck::Idle, EvictionReason::Sweep)
            .await
    }

    async fn evict_if(&self, info_hash: &str, check: EvictCheck, reason: EvictionReason) -> bool {
        let lock = self.key_lock(info_hash);
        let evicted = {
            let _guard = lock.lock().await;
            self.evict_locked(info_hash, check, reason).await
        };
        drop(lock);

        if let Some(source) = &evicted {
            self.forget_key_lock(info_hash);
            if let Some(uri) = source {
                self.forget_key_lock(&resource_key(uri));
            }
        }
        evicted.is_some()
    }

    /// Remove and destroy a resource. Caller holds its key lock.
    ///
    /// Returns `None` if nothing was evicted, otherwise the uri it was
    /// acquired from.
    async fn evict_locked(
        &self,
        info_hash: &str,
        check: EvictCheck,
        reason: EvictionReason,
    ) -> Option<Option<String>> {
        let mut entry = {
            let mut registry = self.registry();
            let eligible = match registry.resources.get(info_hash) {
                None => false,
                Some(entry) if entry.ref_count > 0 => false,
                Some(entry) => match check {
                    EvictCheck::Idle => true,
                    EvictCheck::Expired => self.remaining(entry.added_at, Utc::now()).is_none(),
                    EvictCheck::Timer(generation) => entry
                        .timer
                        .as_ref()
                        .is_some_and(|t| t.generation == generation),
                },
            };
            if !eligible {
                return None;
            }
            let entry = registry.resources.remove(info_hash)?;
            metrics::KNOWN_RESOURCES.set(registry.resources.len() as i64);
            entry
        };

        // A timer evicting itself must not abort its own task
        if let Some(timer) = entry.timer.take() {
            if !matches!(check, EvictCheck::Timer(g) if g == timer.generation) {
                timer.task.abort();
            }
        }

        if let Err(e) = self.inner.engine.destroy(info_hash, true).await {
            warn!(info_hash = %info_hash, error = %e, "Engine failed to destroy resource");
        }
        if let Err(e) = self.inner.store.remove(info_hash).await {
            warn!(info_hash = %info_hash, error = %e, "Failed to remove resume record");
        }

        metrics::EVICTIONS.with_label_values(&[reason.as_str()]).inc();
        info!(
            info_hash = %info_hash,
            name = %entry.name,
            reason = reason.as_str(),
            "Resource evicted"
        );
        Some(entry.uri)
    }

    /// Evict every idle resource whose seed window has elapsed.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .registry()
            .resources
            .iter()
            .filter(|(_, e)| e.ref_count == 0 && self.remaining(e.added_at, now).is_none())
            .map(|(hash, _)| hash.clone())
            .collect();

        let mut evicted = 0;
        for info_hash in expired {
            if self
                .evict_if(&info_hash, EvictCheck::Expired, EvictionReason::Sweep)
                .await
            {
                evicted += 1;
            }
        }

        if evicted > 0 || self.inner.log_throttle.should_log("sweep") {
            debug!(evicted = evicted, "Sweep finished");
        }
        evicted
    }

    // =========================================================================
    // Restore
    // =========================================================================

    /// Reload every persisted record after a restart.
    ///
    /// Records whose seed window elapsed are evicted; the rest are re-added
    /// and get a timer for the remaining time.
    pub async fn restore(&self) -> RestoreReport {
        let records = match self.inner.store.load_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read resume records");
                return RestoreReport::default();
            }
        };

        let mut report = RestoreReport::default();
        for record in records {
            let torrent = match self
                .inner
                .engine
                .add_or_fetch(TorrentSource::Descriptor(record.descriptor))
                .await
            {
                Ok(torrent) => torrent,
                Err(e) => {
                    warn!(info_hash = %record.info_hash, error = %e, "Failed to restore resource");
                    report.outcomes.push(RestoreOutcome::Failed {
                        info_hash: record.info_hash,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let info_hash = torrent.metadata.info_hash.clone();

            self.register(&torrent, None, Some(record.added_at)).await;

            match self.remaining(record.added_at, Utc::now()) {
                None => {
                    self.evict_if(&info_hash, EvictCheck::Idle, EvictionReason::Restore)
                        .await;
                    report.outcomes.push(RestoreOutcome::Expired { info_hash });
                }
                Some(remaining) => {
                    {
                        let mut registry = self.registry();
                        self.arm_timer(&mut registry, &info_hash, remaining);
                    }
                    debug!(info_hash = %info_hash, remaining = ?remaining, "Resource restored");
                    report
                        .outcomes
                        .push(RestoreOutcome::Resumed { info_hash, remaining });
                }
            }
        }

        info!(
            resumed = report.resumed(),
            expired = report.expired(),
            failed = report.failed(),
            "Restore complete"
        );
        report
    }

    // =========================================================================
    // Background sweep
    // =========================================================================

    /// Start the periodic sweep.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!("Resource sweep already running");
            return;
        }

        let manager = self.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let interval = self.inner.sweep_interval;

        tokio::spawn(async move {
            info!(interval = ?interval, "Resource sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Resource sweep loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !manager.inner.running.load(Ordering::Relaxed) {
                            break;
                        }
                        manager.sweep().await;
                    }
                }
            }
        });
    }

    /// Stop the sweep and cancel all pending timers.
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.shutdown_tx.send(());

        let mut registry = self.registry();
        for entry in registry.resources.values_mut() {
            if let Some(timer) = entry.timer.take() {
                timer.task.abort();
            }
        }
        info!("Resource manager stopped");
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn state(&self, info_hash: &str) -> Option<ResourceState> {
        let registry = self.registry();
        match registry.resources.get(info_hash) {
            Some(entry) if entry.ref_count > 0 => Some(ResourceState::Active),
            Some(_) => Some(ResourceState::IdleSeeding),
            None if registry.fetching.contains(info_hash) => Some(ResourceState::Fetching),
            None => None,
        }
    }

    pub fn ref_count(&self, info_hash: &str) -> Option<usize> {
        self.registry().resources.get(info_hash).map(|e| e.ref_count)
    }

    pub fn has_eviction_timer(&self, info_hash: &str) -> bool {
        self.registry()
            .resources
            .get(info_hash)
            .is_some_and(|e| e.timer.is_some())
    }

    pub fn eviction_deadline(&self, info_hash: &str) -> Option<DateTime<Utc>> {
        self.registry()
            .resources
            .get(info_hash)
            .and_then(|e| e.timer.as_ref())
            .and_then(|t| t.deadline)
    }

    pub fn is_known(&self, info_hash: &str) -> bool {
        self.registry().resources.contains_key(info_hash)
    }

    /// Snapshot of all resources merged with live engine numbers.
    pub async fn stats(&self) -> ManagerStats {
        let engine_stats = self.inner.engine.stats().await;
        let live: HashMap<&str, _> = engine_stats
            .torrents
            .iter()
            .map(|t| (t.info_hash.as_str(), t))
            .collect();

        let registry = self.registry();
        let mut resources: Vec<ResourceSnapshot> = registry
            .resources
            .iter()
            .map(|(hash, entry)| {
                let live = live.get(hash.as_str());
                ResourceSnapshot {
                    info_hash: hash.clone(),
                    name: entry.name.clone(),
                    state: if entry.ref_count > 0 {
                        ResourceState::Active
                    } else {
                        ResourceState::IdleSeeding
                    },
                    open_streams: entry.ref_count,
                    added_at: entry.added_at,
                    evicts_at: entry.timer.as_ref().and_then(|t| t.deadline),
                    progress: live.map(|t| t.progress).unwrap_or(0.0),
                    peers: live.map(|t| t.peers).unwrap_or(0),
                    download_speed: live.map(|t| t.download_speed).unwrap_or(0),
                    upload_speed: live.map(|t| t.upload_speed).unwrap_or(0),
                }
            })
            .collect();
        resources.sort_by(|a, b| a.added_at.cmp(&b.added_at));

        ManagerStats {
            open_streams: resources.iter().map(|r| r.open_streams).sum(),
            download_speed: engine_stats.download_speed,
            upload_speed: engine_stats.upload_speed,
            resources,
        }
    }
}

/// Marks a key as fetching for the lifetime of the guard.
struct FetchingGuard<'a> {
    manager: &'a ResourceManager,
    key: String,
}

impl<'a> FetchingGuard<'a> {
    fn new(manager: &'a ResourceManager, key: &str) -> Self {
        manager.registry().fetching.insert(key.to_string());
        Self {
            manager,
            key: key.to_string(),
        }
    }
}

impl Drop for FetchingGuard<'_> {
    fn drop(&mut self) {
        self.manager.registry().fetching.remove(&self.key);
    }
}

/// An open stream. Dropping it calls [`ResourceManager::stream_closed`] once.
pub struct StreamLease {
    manager: ResourceManager,
    info_hash: String,
}

impl StreamLease {
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.manager.stream_closed(&self.info_hash);
    }
}

impl std::fmt::Debug for StreamLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLease")
            .field("info_hash", &self.info_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEngine, MockTorrent};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const WINDOW: Duration = Duration::from_secs(48 * 3600);

    fn magnet(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{hash}&dn=Movie")
    }

    async fn setup() -> (TempDir, Arc<MockEngine>, ResourceManager) {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        engine
            .register(
                magnet(HASH),
                MockTorrent::new(HASH, "Movie").with_file("Movie/movie.mkv", vec![7u8; 1000]),
            )
            .await;
        let store = ResumeStore::open(dir.path()).await.unwrap();
        let manager = ResourceManager::with_timings(
            engine.clone(),
            store,
            WINDOW,
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );
        (dir, engine, manager)
    }

    /// Poll until `cond` holds; file removal runs on the blocking pool.
    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_info_hash_from_magnet() {
        assert_eq!(info_hash_from_magnet(&magnet(HASH)).as_deref(), Some(HASH));
        assert_eq!(
            info_hash_from_magnet("magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
                .as_deref(),
            Some(HASH)
        );
        assert!(info_hash_from_magnet("http://example.com/a.torrent").is_none());
        assert!(info_hash_from_magnet("magnet:?xt=urn:btih:short").is_none());
    }

    #[tokio::test]
    async fn test_acquire_registers_and_persists_once() {
        let (dir, engine, manager) = setup().await;

        let acquired = manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();
        assert_eq!(acquired.info_hash, HASH);
        assert_eq!(acquired.metadata.files.len(), 1);
        assert_eq!(manager.state(HASH), Some(ResourceState::IdleSeeding));
        assert!(manager.has_eviction_timer(HASH));

        let json_path = dir.path().join(format!("{HASH}.json"));
        let first = std::fs::read_to_string(&json_path).unwrap();

        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&json_path).unwrap(), first);
        assert!(dir.path().join(format!("{HASH}.torrent")).exists());
        assert_eq!(engine.add_calls().await, 2);
        assert_eq!(engine.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_coalesce() {
        let (_dir, engine, manager) = setup().await;
        engine.set_delay(Duration::from_millis(50)).await;

        let uri = magnet(HASH);
        let (a, b) = tokio::join!(
            manager.acquire_for_streaming(&uri),
            manager.acquire_for_streaming(&uri)
        );
        assert_eq!(a.unwrap().info_hash, b.unwrap().info_hash);
        assert_eq!(engine.max_concurrent_adds().await, 1);
        assert_eq!(engine.active_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let (_dir, engine, manager) = setup().await;
        engine.set_delay(Duration::from_secs(30)).await;

        let result = manager.acquire_for_streaming(&magnet(HASH)).await;
        assert!(matches!(result, Err(ResourceError::TimedOut(_))));
        assert!(!manager.is_known(HASH));
        assert!(manager.state(HASH).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_acquire_drops_added_torrent() {
        let (dir, engine, manager) = setup().await;
        engine.set_add_before_delay(true);
        engine.set_delay(Duration::from_secs(30)).await;

        let result = manager.acquire_for_streaming(&magnet(HASH)).await;
        assert!(matches!(result, Err(ResourceError::TimedOut(_))));
        assert!(!manager.is_known(HASH));
        assert_eq!(engine.active_count().await, 0);
        assert_eq!(engine.destroyed().await, vec![(HASH.to_string(), true)]);
        assert!(!dir.path().join(format!("{HASH}.torrent")).exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_reacquire_keeps_managed_resource() {
        let (_dir, engine, manager) = setup().await;
        engine.set_add_before_delay(true);
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        engine.set_delay(Duration::from_secs(30)).await;
        let result = manager.acquire_for_streaming(&magnet(HASH)).await;
        assert!(matches!(result, Err(ResourceError::TimedOut(_))));
        assert!(manager.is_known(HASH));
        assert!(engine.is_active(HASH).await);
        assert!(engine.destroyed().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_with_lease_survives_sweep() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let uri = "http://indexer.test/dl/1.torrent";
        engine
            .register(
                uri,
                MockTorrent::new(HASH, "Movie").with_file("Movie/movie.mkv", vec![7u8; 1000]),
            )
            .await;
        let store = ResumeStore::open(dir.path()).await.unwrap();
        let manager = ResourceManager::with_timings(
            engine.clone(),
            store,
            Duration::from_millis(1),
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );

        // Already registered and past its window; only the sweep may evict
        manager.acquire_for_streaming(uri).await.unwrap();
        manager.start();
        manager.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;

        engine.set_delay(Duration::from_millis(50)).await;
        let (acquired, swept) = tokio::join!(manager.acquire_with_lease(uri), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            manager.sweep().await
        });
        let (acquired, lease) = acquired.unwrap();
        assert_eq!(acquired.info_hash, HASH);
        assert!(swept <= 1);
        assert_eq!(manager.ref_count(HASH), Some(1));
        assert_eq!(manager.state(HASH), Some(ResourceState::Active));
        assert!(engine.is_active(HASH).await);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.sweep().await, 0);
        assert!(manager.is_known(HASH));

        drop(lease);
        assert_eq!(manager.ref_count(HASH), Some(0));
        assert!(manager.has_eviction_timer(HASH));
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_only_does_not_register() {
        let (_dir, engine, manager) = setup().await;

        let metadata = manager.acquire_for_metadata_only(&magnet(HASH)).await.unwrap();
        assert_eq!(metadata.name, "Movie");
        assert!(!manager.is_known(HASH));

        engine.set_delay(Duration::from_secs(30)).await;
        let result = manager.acquire_for_metadata_only(&magnet(HASH)).await;
        assert!(matches!(result, Err(ResourceError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_unknown_uri_is_engine_error() {
        let (_dir, _engine, manager) = setup().await;
        let result = manager.acquire_for_streaming("magnet:?xt=urn:btih:nope").await;
        assert!(matches!(result, Err(ResourceError::Engine(_))));
    }

    #[tokio::test]
    async fn test_ref_count_never_negative_and_timer_iff_idle() {
        let (_dir, _engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        let ops = [true, true, false, true, false, false, false, false, true, false];
        let mut expected: usize = 0;
        for open in ops {
            if open {
                manager.stream_opened(HASH).unwrap();
                expected += 1;
            } else {
                manager.stream_closed(HASH);
                expected = expected.saturating_sub(1);
            }
            assert_eq!(manager.ref_count(HASH), Some(expected));
            assert_eq!(manager.has_eviction_timer(HASH), expected == 0);
        }
    }

    #[tokio::test]
    async fn test_stream_opened_on_unknown_resource() {
        let (_dir, _engine, manager) = setup().await;
        assert!(matches!(
            manager.stream_opened(HASH),
            Err(ResourceError::UnknownResource(_))
        ));
        // closing an unknown resource is ignored
        manager.stream_closed(HASH);
    }

    #[tokio::test]
    async fn test_lease_closes_exactly_once() {
        let (_dir, _engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        let lease = manager.lease(HASH).unwrap();
        let second = manager.lease(HASH).unwrap();
        assert_eq!(manager.ref_count(HASH), Some(2));
        assert_eq!(manager.state(HASH), Some(ResourceState::Active));

        drop(lease);
        assert_eq!(manager.ref_count(HASH), Some(1));
        assert!(!manager.has_eviction_timer(HASH));

        drop(second);
        assert_eq!(manager.ref_count(HASH), Some(0));
        assert!(manager.has_eviction_timer(HASH));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_evicts_after_window() {
        let (dir, engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        tokio::time::sleep(WINDOW - Duration::from_secs(1)).await;
        assert!(manager.is_known(HASH));

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!manager.is_known(HASH));
        assert_eq!(engine.destroyed().await, vec![(HASH.to_string(), true)]);
        let descriptor = dir.path().join(format!("{HASH}.torrent"));
        let resume = dir.path().join(format!("{HASH}.json"));
        wait_for(|| !descriptor.exists() && !resume.exists()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_viewer_postpones_eviction() {
        let (_dir, engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        tokio::time::sleep(WINDOW / 2).await;
        let lease = manager.lease(HASH).unwrap();
        tokio::time::sleep(WINDOW).await;
        tokio::task::yield_now().await;
        assert!(manager.is_known(HASH));

        drop(lease);
        tokio::time::sleep(WINDOW / 2).await;
        tokio::task::yield_now().await;
        assert!(manager.is_known(HASH));

        tokio::time::sleep(WINDOW / 2 + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(!manager.is_known(HASH));
        assert_eq!(engine.destroyed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_is_idempotent_and_respects_viewers() {
        let (_dir, engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();

        let lease = manager.lease(HASH).unwrap();
        assert!(!manager.evict(HASH).await);
        drop(lease);

        let (a, b) = tokio::join!(manager.evict(HASH), manager.evict(HASH));
        assert!(a ^ b);
        assert_eq!(engine.destroyed().await.len(), 1);
        assert!(!manager.evict(HASH).await);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired_idle() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let old = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let busy = "cccccccccccccccccccccccccccccccccccccccc";
        for hash in [HASH, old, busy] {
            engine
                .register(magnet(hash), MockTorrent::new(hash, hash).with_file("f.mkv", vec![0; 10]))
                .await;
        }
        let store = ResumeStore::open(dir.path()).await.unwrap();
        let long_ago = Utc::now() - ChronoDuration::hours(49);
        store.save(old, &MockTorrent::descriptor_for(old), long_ago).await.unwrap();
        store.save(busy, &MockTorrent::descriptor_for(busy), long_ago).await.unwrap();

        let manager = ResourceManager::with_timings(
            engine.clone(),
            store,
            WINDOW,
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );
        for hash in [HASH, old, busy] {
            manager.acquire_for_streaming(&magnet(hash)).await.unwrap();
        }
        let _lease = manager.lease(busy).unwrap();

        assert_eq!(manager.sweep().await, 1);
        assert!(manager.is_known(HASH));
        assert!(!manager.is_known(old));
        assert!(manager.is_known(busy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_expired_and_resumed() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let fresh = "dddddddddddddddddddddddddddddddddddddddd";
        let stale = "eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
        for hash in [fresh, stale] {
            engine
                .register(magnet(hash), MockTorrent::new(hash, hash).with_file("f.mkv", vec![0; 10]))
                .await;
        }

        let store = ResumeStore::open(dir.path()).await.unwrap();
        let window = ChronoDuration::from_std(WINDOW).unwrap();
        store
            .save(
                stale,
                &MockTorrent::descriptor_for(stale),
                Utc::now() - window - ChronoDuration::milliseconds(1),
            )
            .await
            .unwrap();
        store
            .save(
                fresh,
                &MockTorrent::descriptor_for(fresh),
                Utc::now() - ChronoDuration::milliseconds(1),
            )
            .await
            .unwrap();

        let manager = ResourceManager::with_timings(
            engine.clone(),
            store,
            WINDOW,
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );
        let report = manager.restore().await;

        assert_eq!(report.expired(), 1);
        assert_eq!(report.resumed(), 1);
        assert!(!manager.is_known(stale));
        let stale_path = dir.path().join(format!("{stale}.torrent"));
        wait_for(|| !stale_path.exists()).await;
        assert_eq!(engine.destroyed().await, vec![(stale.to_string(), true)]);

        let remaining = report
            .outcomes
            .iter()
            .find_map(|o| match o {
                RestoreOutcome::Resumed { remaining, .. } => Some(*remaining),
                _ => None,
            })
            .unwrap();
        let expected = WINDOW - Duration::from_millis(1);
        assert!(remaining <= expected);
        assert!(expected - remaining < Duration::from_secs(1));
        assert!(manager.has_eviction_timer(fresh));
        assert_eq!(manager.state(fresh), Some(ResourceState::IdleSeeding));
    }

    #[tokio::test]
    async fn test_restore_failure_keeps_record() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let store = ResumeStore::open(dir.path()).await.unwrap();
        store.save(HASH, b"garbage", Utc::now()).await.unwrap();

        let manager = ResourceManager::with_timings(
            engine,
            store,
            WINDOW,
            Duration::from_secs(5),
            Duration::from_secs(3600),
        );
        let report = manager.restore().await;
        assert_eq!(report.failed(), 1);
        assert!(dir.path().join(format!("{HASH}.torrent")).exists());
    }

    #[tokio::test]
    async fn test_stats_lists_resources() {
        let (_dir, _engine, manager) = setup().await;
        manager.acquire_for_streaming(&magnet(HASH)).await.unwrap();
        let _lease = manager.lease(HASH).unwrap();

        let stats = manager.stats().await;
        assert_eq!(stats.open_streams, 1);
        assert_eq!(stats.resources.len(), 1);
        assert_eq!(stats.resources[0].state, ResourceState::Active);
        assert!(stats.resources[0].evicts_at.is_none());
    }
}
