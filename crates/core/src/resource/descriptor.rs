//! Descriptor parsing: turn raw .torrent bytes into [`Metadata`].
//!
//! Uses librqbit-core to decode the bencoded descriptor. Multi-file paths are
//! `{root}/{parts...}`; a single-file descriptor yields one file named after
//! the descriptor.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use thiserror::Error;

use super::types::{FileEntry, Metadata};

/// Errors that can occur when parsing descriptors.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to parse descriptor: {0}")]
    ParseError(String),

    #[error("Empty descriptor (no files)")]
    Empty,
}

/// Parse a descriptor into metadata.
pub fn parse_descriptor(bytes: &[u8]) -> Result<Metadata, DescriptorError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| DescriptorError::ParseError(e.to_string()))?;

    let info = &torrent.info;
    let root_name = info
        .name
        .as_ref()
        .map(|b| bytes_to_string(b.as_ref()))
        .unwrap_or_else(|| "unknown".to_string());

    let files = if let Some(ref files) = info.files {
        files
            .iter()
            .map(|file| {
                let mut parts = vec![root_name.clone()];
                parts.extend(file.path.iter().map(|p| bytes_to_string(p.as_ref())));
                file_entry(parts.join("/"), file.length)
            })
            .collect::<Vec<_>>()
    } else if let Some(length) = info.length {
        vec![file_entry(root_name.clone(), length)]
    } else {
        Vec::new()
    };

    if files.is_empty() {
        return Err(DescriptorError::Empty);
    }

    Ok(Metadata {
        info_hash: torrent.info_hash.as_string(),
        name: root_name,
        total_size: files.iter().map(|f| f.size_bytes).sum(),
        files,
    })
}

fn file_entry(path: String, size_bytes: u64) -> FileEntry {
    let name = path.rsplit('/').next().unwrap_or(&path).to_string();
    FileEntry {
        name,
        path,
        size_bytes,
    }
}

/// Lossy UTF-8; descriptors in the wild are not always valid.
fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
