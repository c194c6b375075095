//! Mock transfer engine for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::resource::{
    ByteRange, ByteStream, EngineError, EngineStats, EngineTorrent, FileEntry, Metadata,
    TorrentSource, TorrentStats, TransferEngine,
};

/// A resource the mock engine can serve.
#[derive(Debug, Clone)]
pub struct MockTorrent {
    pub metadata: Metadata,
    contents: HashMap<String, Vec<u8>>,
}

impl MockTorrent {
    pub fn new(info_hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: Metadata {
                info_hash: info_hash.into(),
                name: name.into(),
                total_size: 0,
                files: Vec::new(),
            },
            contents: HashMap::new(),
        }
    }

    /// Add a file with real contents.
    pub fn with_file(mut self, path: impl Into<String>, contents: Vec<u8>) -> Self {
        let path = path.into();
        let size = contents.len() as u64;
        self.push_entry(&path, size);
        self.contents.insert(path, contents);
        self
    }

    /// Add a file known only by size. Opening it yields zeroes.
    pub fn with_sized_file(mut self, path: impl Into<String>, size_bytes: u64) -> Self {
        self.push_entry(&path.into(), size_bytes);
        self
    }

    fn push_entry(&mut self, path: &str, size_bytes: u64) {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        self.metadata.files.push(FileEntry {
            name,
            path: path.to_string(),
            size_bytes,
        });
        self.metadata.total_size += size_bytes;
    }

    /// Descriptor bytes the mock hands out for `info_hash`.
    pub fn descriptor_for(info_hash: &str) -> Vec<u8> {
        format!("mock:{info_hash}").into_bytes()
    }

    fn descriptor(&self) -> Vec<u8> {
        Self::descriptor_for(&self.metadata.info_hash)
    }

    fn into_engine_torrent(self) -> EngineTorrent {
        EngineTorrent {
            descriptor: self.descriptor(),
            metadata: self.metadata,
        }
    }
}

/// Mock implementation of the TransferEngine trait.
///
/// Provides controllable behavior for testing:
/// - Serve a fixed catalog of resources keyed by uri
/// - Delay fetches to exercise timeouts
/// - Record add and destroy calls
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockEngine::new();
/// engine
///     .register("magnet:?xt=urn:btih:aaa...", MockTorrent::new("aaa...", "Movie")
///         .with_file("Movie/movie.mkv", vec![0; 1024]))
///     .await;
///
/// engine.set_delay(Duration::from_secs(30)).await; // every fetch now times out
/// ```
#[derive(Debug, Default)]
pub struct MockEngine {
    /// Catalog by uri.
    catalog: Arc<RwLock<HashMap<String, MockTorrent>>>,
    /// Info hashes currently added.
    active: Arc<RwLock<HashSet<String>>>,
    /// Recorded destroy calls.
    destroyed: Arc<RwLock<Vec<(String, bool)>>>,
    /// Delay applied to every fetch.
    delay: Arc<RwLock<Duration>>,
    /// Extra delay for specific uris.
    uri_delays: Arc<RwLock<HashMap<String, Duration>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// Add torrents before the fetch delay instead of after it.
    add_before_delay: AtomicBool,
    /// Info hashes added by an unfinished `add_or_fetch`, by uri.
    pending: Arc<RwLock<HashMap<String, String>>>,
    add_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `torrent` available under `uri`.
    pub async fn register(&self, uri: impl Into<String>, torrent: MockTorrent) {
        self.catalog.write().await.insert(uri.into(), torrent);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    pub async fn set_uri_delay(&self, uri: impl Into<String>, delay: Duration) {
        self.uri_delays.write().await.insert(uri.into(), delay);
    }

    /// Hold torrents during the fetch delay, as a real engine does while a
    /// newly added torrent initializes.
    pub fn set_add_before_delay(&self, enabled: bool) {
        self.add_before_delay.store(enabled, Ordering::SeqCst);
    }

    /// Make the next operation fail.
    pub async fn fail_next(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub async fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that ran at the same time.
    pub async fn max_concurrent_adds(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    pub async fn is_active(&self, info_hash: &str) -> bool {
        self.active.read().await.contains(info_hash)
    }

    pub async fn destroyed(&self) -> Vec<(String, bool)> {
        self.destroyed.read().await.clone()
    }

    async fn check_error(&self) -> Result<(), EngineError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn simulate_fetch(&self, uri: Option<&str>) {
        let mut delay = *self.delay.read().await;
        if let Some(uri) = uri {
            if let Some(extra) = self.uri_delays.read().await.get(uri) {
                delay += *extra;
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn lookup(&self, source: &TorrentSource) -> Result<MockTorrent, EngineError> {
        let catalog = self.catalog.read().await;
        match source {
            TorrentSource::Uri(uri) => catalog
                .get(uri)
                .cloned()
                .ok_or_else(|| EngineError::InvalidSource(uri.clone())),
            TorrentSource::Descriptor(bytes) => catalog
                .values()
                .find(|t| t.descriptor() == *bytes)
                .cloned()
                .ok_or_else(|| EngineError::InvalidSource("unrecognized descriptor".to_string())),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransferEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_metadata(&self, uri: &str) -> Result<Metadata, EngineError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_error().await?;
        self.simulate_fetch(Some(uri)).await;
        Ok(self
            .lookup(&TorrentSource::Uri(uri.to_string()))
            .await?
            .metadata)
    }

    async fn add_or_fetch(&self, source: TorrentSource) -> Result<EngineTorrent, EngineError> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.check_error().await?;
        let uri = match &source {
            TorrentSource::Uri(uri) => Some(uri.as_str()),
            TorrentSource::Descriptor(_) => None,
        };

        if !self.add_before_delay.load(Ordering::SeqCst) {
            self.simulate_fetch(uri).await;
            let torrent = self.lookup(&source).await?;
            self.active
                .write()
                .await
                .insert(torrent.metadata.info_hash.clone());
            return Ok(torrent.into_engine_torrent());
        }

        let torrent = self.lookup(&source).await?;
        let info_hash = torrent.metadata.info_hash.clone();
        let added = self.active.write().await.insert(info_hash.clone());
        if let (Some(uri), true) = (uri, added) {
            self.pending
                .write()
                .await
                .insert(uri.to_string(), info_hash);
        }
        self.simulate_fetch(uri).await;
        if let Some(uri) = uri {
            self.pending.write().await.remove(uri);
        }
        Ok(torrent.into_engine_torrent())
    }

    async fn abandon(&self, uri: &str) -> Result<(), EngineError> {
        let pending = self.pending.write().await.remove(uri);
        match pending {
            Some(info_hash) => self.destroy(&info_hash, true).await,
            None => Ok(()),
        }
    }

    async fn open_byte_range(
        &self,
        info_hash: &str,
        file_path: &str,
        range: ByteRange,
    ) -> Result<ByteStream, EngineError> {
        self.check_error().await?;
        if !self.active.read().await.contains(info_hash) {
            return Err(EngineError::UnknownTorrent(info_hash.to_string()));
        }

        let catalog = self.catalog.read().await;
        let torrent = catalog
            .values()
            .find(|t| t.metadata.info_hash == info_hash)
            .ok_or_else(|| EngineError::UnknownTorrent(info_hash.to_string()))?;
        let file = torrent
            .metadata
            .file(file_path)
            .ok_or_else(|| EngineError::NotFound(file_path.to_string()))?;
        if range.end >= file.size_bytes {
            return Err(EngineError::Api(format!(
                "range {}-{} beyond file size {}",
                range.start, range.end, file.size_bytes
            )));
        }

        let bytes = match torrent.contents.get(file_path) {
            Some(contents) => contents[range.start as usize..=range.end as usize].to_vec(),
            None => vec![0u8; range.len() as usize],
        };
        Ok(Box::pin(Cursor::new(bytes)))
    }

    async fn destroy(&self, info_hash: &str, delete_payload: bool) -> Result<(), EngineError> {
        self.destroyed
            .write()
            .await
            .push((info_hash.to_string(), delete_payload));
        self.active.write().await.remove(info_hash);
        Ok(())
    }

    async fn stats(&self) -> EngineStats {
        let active = self.active.read().await;
        EngineStats {
            download_speed: 0,
            upload_speed: 0,
            torrents: active
                .iter()
                .map(|hash| TorrentStats {
                    info_hash: hash.clone(),
                    progress: 1.0,
                    peers: 0,
                    download_speed: 0,
                    upload_speed: 0,
                })
                .collect(),
        }
    }
}
