//! Resource lifecycle management.
//!
//! A resource is one torrent held by the transfer engine. The
//! [`ResourceManager`] owns every resource: it fetches with a timeout, counts
//! open streams, seeds idle resources for a fixed window and evicts them once
//! the window ends. Resume records in a [`ResumeStore`] let eviction timing
//! survive restarts.

mod descriptor;
mod engine;
mod librqbit;
mod manager;
mod store;
mod types;

pub use descriptor::{parse_descriptor, DescriptorError};
pub use engine::{
    ByteStream, EngineError, EngineStats, EngineTorrent, TorrentSource, TorrentStats,
    TransferEngine,
};
pub use librqbit::LibrqbitEngine;
pub use manager::{info_hash_from_magnet, ResourceManager, StreamLease};
pub use store::{ResumeRecord, ResumeStore, StoreError};
pub use types::*;
