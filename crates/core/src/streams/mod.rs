//! Stream synthesis for the addon surface.
//!
//! Ranked torrents are expanded into per-file playable descriptors whose
//! URLs point back at the streaming gateway.

mod files;
mod media_id;
mod service;
mod synthesizer;
mod types;

pub use files::{
    is_subtitle_file, is_video_file, readable_duration, readable_size, streaming_mime_type,
};
pub use media_id::{MediaId, MediaIdError, MediaKind, MediaSource};
pub use service::{RankedSearch, StreamService};
pub use synthesizer::{select_videos, StreamSynthesizer};
pub use types::{playback_url, BehaviorHints, StreamDescriptor, StreamsResponse, SubtitleRef};
