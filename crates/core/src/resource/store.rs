//! Durable resume records.
//!
//! Each resource has two files in the store directory:
//! `{info_hash}.torrent` (the raw descriptor) and `{info_hash}.json`
//! (`{"addedAt": <epoch ms>}`). Files are written through a temporary file and
//! renamed into place; the descriptor is renamed last, so a record is only
//! visible once both halves exist.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Errors from the resume store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ResumeMetadata {
    #[serde(rename = "addedAt")]
    added_at: i64,
}

/// A record loaded back from disk.
#[derive(Debug, Clone)]
pub struct ResumeRecord {
    pub info_hash: String,
    pub descriptor: Vec<u8>,
    pub added_at: DateTime<Utc>,
}

/// File-backed store of resume records.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    dir: PathBuf,
}

impl ResumeStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn descriptor_path(&self, info_hash: &str) -> PathBuf {
        self.dir.join(format!("{info_hash}.torrent"))
    }

    fn resume_path(&self, info_hash: &str) -> PathBuf {
        self.dir.join(format!("{info_hash}.json"))
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Persist a record unless one already exists.
    ///
    /// Returns the effective added-at time: the stored one if the record was
    /// already present, `added_at` otherwise. A record whose resume file is
    /// missing or unreadable gets it rewritten with `added_at`.
    pub async fn save(
        &self,
        info_hash: &str,
        descriptor: &[u8],
        added_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        let descriptor_path = self.descriptor_path(info_hash);
        if fs::try_exists(&descriptor_path).await? {
            match self.read_added_at(info_hash).await {
                Ok(stored) => return Ok(stored),
                Err(e) => {
                    warn!(info_hash = %info_hash, error = %e, "Rewriting unreadable resume file");
                    self.write_resume(info_hash, added_at).await?;
                    return Ok(added_at);
                }
            }
        }

        self.write_resume(info_hash, added_at).await?;
        Self::write_atomic(&descriptor_path, descriptor).await?;

        debug!(info_hash = %info_hash, "Resume record written");
        Ok(added_at)
    }

    async fn write_resume(&self, info_hash: &str, added_at: DateTime<Utc>) -> Result<(), StoreError> {
        let json = serde_json::to_vec(&ResumeMetadata {
            added_at: added_at.timestamp_millis(),
        })?;
        Self::write_atomic(&self.resume_path(info_hash), &json).await
    }

    /// Read the added-at time of a record.
    pub async fn read_added_at(&self, info_hash: &str) -> Result<DateTime<Utc>, StoreError> {
        let bytes = fs::read(self.resume_path(info_hash)).await?;
        let meta: ResumeMetadata = serde_json::from_slice(&bytes)?;
        Utc.timestamp_millis_opt(meta.added_at)
            .single()
            .ok_or_else(|| {
                StoreError::Io(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("addedAt out of range: {}", meta.added_at),
                ))
            })
    }

    /// Load every record in the store.
    ///
    /// Unreadable descriptors are skipped. A missing or corrupt resume file
    /// falls back to "just added" so the resource gets a full seed window.
    pub async fn load_all(&self) -> Result<Vec<ResumeRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("torrent") {
                continue;
            }
            let Some(info_hash) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            let descriptor = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(info_hash = %info_hash, error = %e, "Failed to read descriptor");
                    continue;
                }
            };

            let added_at = match self.read_added_at(&info_hash).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        info_hash = %info_hash,
                        error = %e,
                        "Failed to read resume metadata, assuming just added"
                    );
                    Utc::now()
                }
            };

            records.push(ResumeRecord {
                info_hash,
                descriptor,
                added_at,
            });
        }

        records.sort_by(|a, b| a.info_hash.cmp(&b.info_hash));
        Ok(records)
    }

    /// Remove both files of a record. Missing files are not an error.
    pub async fn remove(&self, info_hash: &str) -> Result<(), StoreError> {
        for path in [self.descriptor_path(info_hash), self.resume_path(info_hash)] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Whether a record exists.
    pub async fn contains(&self, info_hash: &str) -> bool {
        fs::try_exists(self.descriptor_path(info_hash))
            .await
            .unwrap_or(false)
    }
}
