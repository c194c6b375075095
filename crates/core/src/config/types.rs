use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL used when building playback URLs (e.g. "https://media.example.com").
    /// When unset, the base is derived from the request's Host header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Transfer engine configuration (embedded librqbit session).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Where downloaded payloads are written.
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    /// Enable DHT for peer discovery (default: true).
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    /// Fixed TCP listen port (random if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    /// Maximum peer connections per resource.
    #[serde(default = "default_max_connections")]
    pub max_connections_per_torrent: u32,
    /// Aggregate download cap in MB/s.
    #[serde(default = "default_download_speed")]
    pub download_speed_mbps: u32,
    /// Aggregate upload cap in MB/s.
    #[serde(default = "default_upload_speed")]
    pub upload_speed_mbps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
            enable_dht: true,
            listen_port: None,
            max_connections_per_torrent: default_max_connections(),
            download_speed_mbps: default_download_speed(),
            upload_speed_mbps: default_upload_speed(),
        }
    }
}

impl EngineConfig {
    pub fn download_limit_bps(&self) -> u64 {
        self.download_speed_mbps as u64 * 1024 * 1024
    }

    pub fn upload_limit_bps(&self) -> u64 {
        self.upload_speed_mbps as u64 * 1024 * 1024
    }
}

fn default_download_path() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    50
}

fn default_download_speed() -> u32 {
    20
}

fn default_upload_speed() -> u32 {
    1
}

/// Resource lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Directory holding the per-resource descriptor and resume files.
    #[serde(default = "default_torrent_dir")]
    pub torrent_dir: PathBuf,
    /// How long a resource is kept after its last viewer disconnects.
    #[serde(default = "default_seed_time_hours")]
    pub seed_time_hours: u64,
    /// Timeout for metadata fetches and stream acquires.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    /// Interval of the safety-net sweep over all known resources.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            torrent_dir: default_torrent_dir(),
            seed_time_hours: default_seed_time_hours(),
            metadata_timeout_secs: default_metadata_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ResourceConfig {
    pub fn seed_window(&self) -> Duration {
        Duration::from_secs(self.seed_time_hours * 60 * 60)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn default_torrent_dir() -> PathBuf {
    PathBuf::from("torrents")
}

fn default_seed_time_hours() -> u64 {
    48
}

fn default_metadata_timeout() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    3600 // hourly
}

/// Provider fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Maximum providers queried at once.
    #[serde(default = "default_search_concurrency")]
    pub concurrency: usize,
    /// Per-provider deadline in seconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Jackett provider (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jackett: Option<JackettConfig>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_search_concurrency(),
            provider_timeout_secs: default_provider_timeout(),
            jackett: None,
        }
    }
}

fn default_search_concurrency() -> usize {
    4
}

fn default_provider_timeout() -> u64 {
    20
}

/// Jackett search provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Ranking and stream selection preferences.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// Language code that earns the language score (audio or subtitles).
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Hide foreign-only streams when at least one target-language stream exists.
    #[serde(default)]
    pub hide_foreign_when_local: bool,
    #[serde(default)]
    pub disable_hevc: bool,
    #[serde(default)]
    pub disable_4k: bool,
    #[serde(default)]
    pub disable_hdr: bool,
    #[serde(default)]
    pub disable_cam: bool,
    #[serde(default)]
    pub disable_3d: bool,
    /// How many metadata fetches may run at once while building streams.
    #[serde(default = "default_metadata_concurrency")]
    pub metadata_concurrency: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            hide_foreign_when_local: false,
            disable_hevc: false,
            disable_4k: false,
            disable_hdr: false,
            disable_cam: false,
            disable_3d: false,
            metadata_concurrency: default_metadata_concurrency(),
        }
    }
}

fn default_target_language() -> String {
    "HUN".to_string()
}

fn default_metadata_concurrency() -> usize {
    8
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub resources: ResourceConfig,
    pub search: SanitizedSearchConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSearchConfig {
    pub concurrency: usize,
    pub provider_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            engine: config.engine.clone(),
            resources: config.resources.clone(),
            search: SanitizedSearchConfig {
                concurrency: config.search.concurrency,
                provider_timeout_secs: config.search.provider_timeout_secs,
                jackett: config.search.jackett.as_ref().map(|j| SanitizedJackettConfig {
                    url: j.url.clone(),
                    api_key_configured: !j.api_key.is_empty(),
                    timeout_secs: j.timeout_secs,
                }),
            },
            ranking: config.ranking.clone(),
        }
    }
}
