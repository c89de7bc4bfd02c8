use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "http://localhost:9000";

/// Everything an [`Editor`](crate::Editor) can be tuned with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Base URL of the GDMC HTTP interface.
    pub host: String,
    /// Dimension to read from and write to; `None` lets the server pick (the overworld).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    pub buffering: bool,
    pub buffer_limit: usize,
    pub caching: bool,
    pub cache_limit: usize,
    /// `None` flushes on the calling thread; `Some(n)` hands flushes to `n` workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_workers: Option<usize>,
    pub do_block_updates: bool,
    pub spawn_drops: bool,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Delay before the first retry; doubles on every further attempt.
    pub backoff_ms: u64,
    /// Seed for palette sampling. Unseeded editors draw from the thread RNG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl EditorConfig {
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            dimension: None,
            buffering: false,
            buffer_limit: 1024,
            caching: false,
            cache_limit: 8192,
            flush_workers: None,
            do_block_updates: true,
            spawn_drops: false,
            retries: 4,
            timeout_ms: None,
            backoff_ms: 250,
            seed: None,
        }
    }

    /// Defaults overlaid with `GDMC_HOST`, `GDMC_DIMENSION`, `GDMC_RETRIES` and
    /// `GDMC_TIMEOUT_MS`. Unparseable numbers are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(host) = std::env::var("GDMC_HOST") {
            config.host = host;
        }
        if let Ok(dimension) = std::env::var("GDMC_DIMENSION") {
            config.dimension = Some(dimension);
        }
        if let Some(retries) = env_number("GDMC_RETRIES") {
            config.retries = retries;
        }
        if let Some(timeout) = env_number("GDMC_TIMEOUT_MS") {
            config.timeout_ms = Some(timeout);
        }
        config
    }

    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            retries: self.retries,
            timeout: self.timeout_ms.map(Duration::from_millis),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

/// Retry and timeout budget for one transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    pub timeout: Option<Duration>,
    pub backoff: Duration,
}

impl RequestPolicy {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        EditorConfig::new().request_policy()
    }
}
