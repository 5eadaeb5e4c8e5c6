//! Engine configuration that downstream crates can serialize/deserialize.
//!
//! Operators read their argument defaults from here (through the scope), so a
//! deployment can tune e.g. dedup cache sizes without touching queries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on every operator output channel. Small values apply
    /// backpressure sooner.
    pub channel_capacity: usize,

    /// Default `timeout` for `dedup` (seconds).
    pub dedup_timeout_secs: u64,

    /// Default `size` for `dedup`.
    pub dedup_size: usize,

    /// Default `max_rows` for `fifo` and `sequence`.
    pub fifo_max_rows: usize,

    /// Default `max_age` for `fifo` and `sequence` (seconds).
    pub fifo_max_age_secs: u64,

    /// Default `period` for `cache` and `memoize` (seconds).
    pub cache_period_secs: u64,

    /// Default `size` for `lru`.
    pub lru_size: usize,

    /// Default `batch_size` for `batch`.
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            dedup_timeout_secs: 60,
            dedup_size: 1000,
            fifo_max_rows: 1000,
            fifo_max_age_secs: 60,
            cache_period_secs: 60,
            lru_size: 1000,
            batch_size: 10,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RIVULET_CHANNEL_CAPACITY`
    /// - `RIVULET_DEDUP_TIMEOUT_SECS`, `RIVULET_DEDUP_SIZE`
    /// - `RIVULET_FIFO_MAX_ROWS`, `RIVULET_FIFO_MAX_AGE_SECS`
    /// - `RIVULET_CACHE_PERIOD_SECS`
    /// - `RIVULET_LRU_SIZE`
    /// - `RIVULET_BATCH_SIZE`
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("RIVULET_CHANNEL_CAPACITY") {
            cfg.channel_capacity = v;
        }
        if let Some(v) = env_parse::<u64>("RIVULET_DEDUP_TIMEOUT_SECS") {
            cfg.dedup_timeout_secs = v;
        }
        if let Some(v) = env_parse::<usize>("RIVULET_DEDUP_SIZE") {
            cfg.dedup_size = v;
        }
        if let Some(v) = env_parse::<usize>("RIVULET_FIFO_MAX_ROWS") {
            cfg.fifo_max_rows = v;
        }
        if let Some(v) = env_parse::<u64>("RIVULET_FIFO_MAX_AGE_SECS") {
            cfg.fifo_max_age_secs = v;
        }
        if let Some(v) = env_parse::<u64>("RIVULET_CACHE_PERIOD_SECS") {
            cfg.cache_period_secs = v;
        }
        if let Some(v) = env_parse::<usize>("RIVULET_LRU_SIZE") {
            cfg.lru_size = v;
        }
        if let Some(v) = env_parse::<usize>("RIVULET_BATCH_SIZE") {
            cfg.batch_size = v;
        }

        cfg
    }

    /// Reject settings no operator can run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn dedup_timeout(&self) -> Duration {
        Duration::from_secs(self.dedup_timeout_secs)
    }

    pub fn fifo_max_age(&self) -> Duration {
        Duration::from_secs(self.fifo_max_age_secs)
    }

    pub fn cache_period(&self) -> Duration {
        Duration::from_secs(self.cache_period_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
