//! Types for resource lifecycle management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::engine::EngineError;
use super::store::StoreError;

/// One file inside a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Last path component.
    pub name: String,
    /// Path relative to the resource root, `/`-separated.
    pub path: String,
    pub size_bytes: u64,
}

/// Resolved metadata of a resource. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Lowercase hex info hash.
    pub info_hash: String,
    pub name: String,
    pub total_size: u64,
    /// Files in descriptor order.
    pub files: Vec<FileEntry>,
}

impl Metadata {
    pub fn file(&self, path: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// The whole of a file of `size` bytes. `None` for empty files.
    pub fn full(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// An acquire is in flight.
    Fetching,
    /// At least one stream is open.
    Active,
    /// No open streams; eviction timer running.
    IdleSeeding,
    /// Removed along with its payload and resume record.
    Evicted,
}

/// Result of a successful streaming acquire.
#[derive(Debug, Clone)]
pub struct AcquiredResource {
    pub info_hash: String,
    pub metadata: Metadata,
}

/// Point-in-time view of one known resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub info_hash: String,
    pub name: String,
    pub state: ResourceState,
    pub open_streams: usize,
    pub added_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evicts_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub peers: u32,
    pub download_speed: u64,
    pub upload_speed: u64,
}

/// Aggregate view served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub open_streams: usize,
    /// Bytes per second across all resources.
    pub download_speed: u64,
    /// Bytes per second across all resources.
    pub upload_speed: u64,
    pub resources: Vec<ResourceSnapshot>,
}

/// Why a resource was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Per-resource idle timer fired.
    Timer,
    /// Periodic sweep found the seed window exceeded.
    Sweep,
    /// Restored with an already elapsed seed window.
    Restore,
}

impl EvictionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Timer => "timer",
            EvictionReason::Sweep => "sweep",
            EvictionReason::Restore => "restore",
        }
    }
}

/// Outcome for one record during startup restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Re-added; eviction timer armed for the remaining window.
    Resumed { info_hash: String, remaining: Duration },
    /// Seed window already elapsed; evicted.
    Expired { info_hash: String },
    /// Could not be re-added; left on disk.
    Failed { info_hash: String, error: String },
}

/// Summary of a startup restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub outcomes: Vec<RestoreOutcome>,
}

impl RestoreReport {
    pub fn resumed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RestoreOutcome::Resumed { .. }))
            .count()
    }

    pub fn expired(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RestoreOutcome::Expired { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RestoreOutcome::Failed { .. }))
            .count()
    }
}

/// Errors surfaced by the resource manager.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
