//! librqbit embedded transfer engine.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session, SessionOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::descriptor::parse_descriptor;
use super::engine::{
    ByteStream, EngineError, EngineStats, EngineTorrent, TorrentSource, TorrentStats,
    TransferEngine,
};
use super::types::{ByteRange, Metadata};
use crate::config::EngineConfig;

/// Transfer engine backed by an in-process librqbit session.
pub struct LibrqbitEngine {
    session: Arc<Session>,
    /// Parsed metadata by info hash, for path to file-index lookups.
    metadata_cache: RwLock<HashMap<String, Metadata>>,
    /// Info hash of torrents newly added by an `add_or_fetch` still in
    /// progress, by uri.
    pending: Mutex<HashMap<String, String>>,
}

impl LibrqbitEngine {
    /// Create the session from configuration.
    pub async fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let download_path = PathBuf::from(&config.download_path);
        tokio::fs::create_dir_all(&download_path).await.map_err(|e| {
            EngineError::InitFailed(format!("Failed to create download directory: {}", e))
        })?;

        let mut opts = SessionOptions::default();
        if !config.enable_dht {
            opts.disable_dht = true;
        }
        // Range, not RangeInclusive
        if let Some(port) = config.listen_port {
            opts.listen_port_range = Some(port..(port + 1));
        }

        info!(
            download_path = %download_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(download_path, opts)
            .await
            .map_err(|e| {
                EngineError::InitFailed(format!("Failed to initialize librqbit session: {}", e))
            })?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        warn!(
            max_connections_per_torrent = config.max_connections_per_torrent,
            download_limit_bps = config.download_limit_bps(),
            upload_limit_bps = config.upload_limit_bps(),
            "Connection and speed caps not supported by librqbit session, not enforced"
        );

        Ok(Self {
            session,
            metadata_cache: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        })
    }

    fn format_hash(hash: &librqbit_core::Id20) -> String {
        hash.as_string()
    }

    fn find_torrent(&self, info_hash: &str) -> Option<Arc<ManagedTorrent>> {
        let wanted = info_hash.to_lowercase();
        self.session.with_torrents(|iter| {
            for (_, torrent) in iter {
                if Self::format_hash(&torrent.info_hash()) == wanted {
                    return Some(torrent.clone());
                }
            }
            None
        })
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for the torrent to initialize and read back its descriptor.
    async fn describe(handle: &Arc<ManagedTorrent>) -> Result<EngineTorrent, EngineError> {
        handle
            .wait_until_initialized()
            .await
            .map_err(|e| EngineError::Api(format!("Torrent failed to initialize: {}", e)))?;

        let descriptor = handle
            .with_metadata(|m| m.torrent_bytes.clone())
            .map_err(|e| EngineError::Api(format!("Metadata unavailable: {}", e)))?
            .to_vec();
        let metadata =
            parse_descriptor(&descriptor).map_err(|e| EngineError::InvalidSource(e.to_string()))?;

        Ok(EngineTorrent {
            metadata,
            descriptor,
        })
    }

    async fn cached_metadata(
        &self,
        info_hash: &str,
        handle: &Arc<ManagedTorrent>,
    ) -> Result<Metadata, EngineError> {
        if let Some(metadata) = self.metadata_cache.read().await.get(info_hash) {
            return Ok(metadata.clone());
        }
        let torrent = Self::describe(handle).await?;
        self.metadata_cache
            .write()
            .await
            .insert(info_hash.to_string(), torrent.metadata.clone());
        Ok(torrent.metadata)
    }
}

#[async_trait]
impl TransferEngine for LibrqbitEngine {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn fetch_metadata(&self, uri: &str) -> Result<Metadata, EngineError> {
        let opts = AddTorrentOptions {
            list_only: true,
            ..Default::default()
        };
        let response = self
            .session
            .add_torrent(AddTorrent::from_url(uri), Some(opts))
            .await
            .map_err(|e| EngineError::Api(format!("Failed to resolve metadata: {}", e)))?;

        match response {
            AddTorrentResponse::ListOnly(list) => parse_descriptor(&list.torrent_bytes)
                .map_err(|e| EngineError::InvalidSource(e.to_string())),
            AddTorrentResponse::Added(_, handle) | AddTorrentResponse::AlreadyManaged(_, handle) => {
                Ok(Self::describe(&handle).await?.metadata)
            }
        }
    }

    async fn add_or_fetch(&self, source: TorrentSource) -> Result<EngineTorrent, EngineError> {
        let add = match &source {
            TorrentSource::Uri(uri) => AddTorrent::from_url(uri.as_str()),
            TorrentSource::Descriptor(bytes) => AddTorrent::from_bytes(bytes.clone()),
        };
        // Reuse payload already on disk when restoring. No file is selected:
        // open streams drive which pieces get fetched.
        let opts = AddTorrentOptions {
            overwrite: true,
            only_files: Some(Vec::new()),
            ..Default::default()
        };

        let response = self
            .session
            .add_torrent(add, Some(opts))
            .await
            .map_err(|e| EngineError::Api(format!("Failed to add torrent: {}", e)))?;

        let (handle, added) = match response {
            AddTorrentResponse::Added(_, handle) => (handle, true),
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                debug!(info_hash = %Self::format_hash(&handle.info_hash()), "Torrent already managed");
                (handle, false)
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(EngineError::Api(
                    "Torrent was added in list-only mode".to_string(),
                ))
            }
        };

        let info_hash = Self::format_hash(&handle.info_hash());
        let pending_uri = match (&source, added) {
            (TorrentSource::Uri(uri), true) => {
                self.pending().insert(uri.clone(), info_hash.clone());
                Some(uri.clone())
            }
            _ => None,
        };

        let described = Self::describe(&handle).await;
        if let Some(uri) = &pending_uri {
            self.pending().remove(uri);
        }
        let torrent = match described {
            Ok(torrent) => torrent,
            Err(e) => {
                if added {
                    warn!(info_hash = %info_hash, error = %e, "Dropping torrent that failed to initialize");
                    self.destroy(&info_hash, true).await?;
                }
                return Err(e);
            }
        };
        self.metadata_cache
            .write()
            .await
            .insert(torrent.metadata.info_hash.clone(), torrent.metadata.clone());

        debug!(
            info_hash = %torrent.metadata.info_hash,
            name = %torrent.metadata.name,
            files = torrent.metadata.files.len(),
            "Torrent added"
        );
        Ok(torrent)
    }

    async fn open_byte_range(
        &self,
        info_hash: &str,
        file_path: &str,
        range: ByteRange,
    ) -> Result<ByteStream, EngineError> {
        let handle = self
            .find_torrent(info_hash)
            .ok_or_else(|| EngineError::UnknownTorrent(info_hash.to_string()))?;

        let metadata = self.cached_metadata(info_hash, &handle).await?;
        let file_idx = metadata
            .files
            .iter()
            .position(|f| f.path == file_path)
            .ok_or_else(|| EngineError::NotFound(file_path.to_string()))?;

        let mut stream = handle
            .stream(file_idx)
            .map_err(|e| EngineError::Api(format!("Failed to open stream: {}", e)))?;
        stream.seek(SeekFrom::Start(range.start)).await?;

        Ok(Box::pin(stream.take(range.len())))
    }

    async fn abandon(&self, uri: &str) -> Result<(), EngineError> {
        let Some(info_hash) = self.pending().remove(uri) else {
            return Ok(());
        };
        info!(info_hash = %info_hash, uri = %uri, "Dropping torrent from an abandoned add");
        self.destroy(&info_hash, true).await
    }

    async fn destroy(&self, info_hash: &str, delete_payload: bool) -> Result<(), EngineError> {
        self.metadata_cache.write().await.remove(info_hash);

        let Some(torrent) = self.find_torrent(info_hash) else {
            debug!(info_hash = %info_hash, "Destroy on torrent not in session");
            return Ok(());
        };

        self.session
            .delete(torrent.id().into(), delete_payload)
            .await
            .map_err(|e| EngineError::Api(format!("Failed to remove torrent: {}", e)))?;

        debug!(info_hash = %info_hash, delete_payload = delete_payload, "Torrent removed");
        Ok(())
    }

    async fn stats(&self) -> EngineStats {
        let torrents: Vec<Arc<ManagedTorrent>> = self
            .session
            .with_torrents(|iter| iter.map(|(_, t)| t.clone()).collect());

        let mut stats = EngineStats::default();
        for torrent in torrents {
            let s = torrent.stats();
            let progress = if s.total_bytes > 0 {
                s.progress_bytes as f64 / s.total_bytes as f64
            } else {
                0.0
            };

            // librqbit reports MiB/s in the `mbps` field
            let (download_speed, upload_speed, peers) = s
                .live
                .as_ref()
                .map(|live| {
                    (
                        (live.download_speed.mbps * 1024.0 * 1024.0) as u64,
                        (live.upload_speed.mbps * 1024.0 * 1024.0) as u64,
                        live.snapshot.peer_stats.live as u32,
                    )
                })
                .unwrap_or((0, 0, 0));

            stats.download_speed += download_speed;
            stats.upload_speed += upload_speed;
            stats.torrents.push(TorrentStats {
                info_hash: Self::format_hash(&torrent.info_hash()),
                progress,
                peers,
                download_speed,
                upload_speed,
            });
        }
        stats
    }
}
