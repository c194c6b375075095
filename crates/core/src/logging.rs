//! Keyed suppression of repeated log lines.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default interval between two lines with the same key.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Lets a log line through at most once per interval for a given key.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    last: Mutex<HashMap<String, Instant>>,
}

impl Default for LogThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// True if a line for `key` should be emitted now.
    pub fn should_log(&self, key: &str) -> bool {
        self.should_log_at(key, Instant::now())
    }

    fn should_log_at(&self, key: &str, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        // Drop stale keys so the map does not grow without bound
        if last.len() > 1024 {
            let interval = self.interval;
            last.retain(|_, t| now.duration_since(*t) < interval);
        }

        match last.get(key) {
            Some(t) if now.duration_since(*t) < self.interval => false,
            _ => {
                last.insert(key.to_string(), now);
                true
            }
        }
    }
}
