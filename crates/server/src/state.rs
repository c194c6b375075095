use axum::http::{header, HeaderMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use seedstream_core::{Config, LogThrottle, ResourceManager, SanitizedConfig, StreamService};

/// Shared application state
pub struct AppState {
    config: Config,
    manager: ResourceManager,
    streams: Arc<StreamService>,
    started_at: Instant,
    /// Throttles per-file gateway log lines; players re-request ranges constantly.
    gateway_log: LogThrottle,
}

impl AppState {
    pub fn new(config: Config, manager: ResourceManager, streams: Arc<StreamService>) -> Self {
        Self {
            config,
            manager,
            streams,
            started_at: Instant::now(),
            gateway_log: LogThrottle::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn manager(&self) -> &ResourceManager {
        &self.manager
    }

    pub fn streams(&self) -> &StreamService {
        self.streams.as_ref()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn gateway_log(&self) -> &LogThrottle {
        &self.gateway_log
    }

    /// Base for playback URLs: the configured public URL, else the request host.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.config.server.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{}", host)
    }
}
