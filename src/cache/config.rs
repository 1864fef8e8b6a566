//! Cache configuration.

use std::time::Duration;

const DEFAULT_GC_GRACE: Duration = Duration::from_secs(60);
const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an unused entry is kept before eviction.
    pub gc_grace: Duration,
    /// How often the background sweeper runs.
    pub gc_interval: Duration,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gc_grace: DEFAULT_GC_GRACE,
            gc_interval: DEFAULT_GC_INTERVAL,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            gc_grace: settings.gc_grace,
            gc_interval: settings.gc_interval,
            consume_batch_limit: settings.consume_batch_limit.get(),
        }
    }
}
