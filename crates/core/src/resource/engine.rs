//! Transfer engine abstraction.
//!
//! The engine does peer discovery, piece download and on-disk storage. The
//! resource manager only drives it through [`TransferEngine`].

use async_trait::async_trait;
use serde::Serialize;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

use super::types::{ByteRange, Metadata};

/// Byte stream over a file range.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// How to add a resource to the engine.
#[derive(Debug, Clone)]
pub enum TorrentSource {
    /// Magnet link or descriptor URL.
    Uri(String),
    /// Raw descriptor (.torrent) bytes, as persisted for restore.
    Descriptor(Vec<u8>),
}

/// A resource held by the engine.
#[derive(Debug, Clone)]
pub struct EngineTorrent {
    pub metadata: Metadata,
    /// Raw descriptor bytes, persisted so the resource can be restored.
    pub descriptor: Vec<u8>,
}

/// Live transfer numbers for one resource.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TorrentStats {
    pub info_hash: String,
    pub progress: f64,
    pub peers: u32,
    /// Bytes per second.
    pub download_speed: u64,
    /// Bytes per second.
    pub upload_speed: u64,
}

/// Aggregate transfer numbers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub download_speed: u64,
    pub upload_speed: u64,
    pub torrents: Vec<TorrentStats>,
}

/// Errors from the transfer engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Resource not managed: {0}")]
    UnknownTorrent(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Engine error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A content-transfer engine.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Resolve metadata without keeping the resource.
    async fn fetch_metadata(&self, uri: &str) -> Result<Metadata, EngineError>;

    /// Add a resource, or return the existing one when already managed.
    async fn add_or_fetch(&self, source: TorrentSource) -> Result<EngineTorrent, EngineError>;

    /// Open a byte range of a file. Unknown paths yield [`EngineError::NotFound`].
    async fn open_byte_range(
        &self,
        info_hash: &str,
        file_path: &str,
        range: ByteRange,
    ) -> Result<ByteStream, EngineError>;

    /// Drop what an interrupted [`add_or_fetch`](Self::add_or_fetch) for
    /// `uri` left behind. Resources managed before that call are kept.
    async fn abandon(&self, uri: &str) -> Result<(), EngineError>;

    /// Drop a resource, optionally deleting its payload from disk.
    async fn destroy(&self, info_hash: &str, delete_payload: bool) -> Result<(), EngineError>;

    /// Current transfer numbers.
    async fn stats(&self) -> EngineStats;
}
