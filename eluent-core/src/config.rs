use std::time::Duration;

use serde::Deserialize;

use crate::cache::CachePolicy;

/// Quiet period after the last keystroke before a query is sent.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(400);

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Tuning for a [`SearchCoordinator`](crate::SearchCoordinator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub debounce: Duration,
    /// Requested page size, at least 1.
    pub page_size: u32,
    /// Category filter sent with every request.
    pub category: Option<String>,
    pub cache: CachePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            category: None,
            cache: CachePolicy::default(),
        }
    }
}

/// File form of [`SearchConfig`]; every field optional, in milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchSettings {
    pub debounce_ms: Option<u64>,
    pub page_size: Option<u32>,
    pub category: Option<String>,
    pub cache_stale_ms: Option<u64>,
    pub cache_evict_ms: Option<u64>,
}

impl SearchSettings {
    /// Applies the set fields on top of the defaults.
    pub fn into_config(self) -> SearchConfig {
        let defaults = SearchConfig::default();
        SearchConfig {
            debounce: self
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            page_size: self
                .page_size
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            category: self.category.filter(|c| !c.trim().is_empty()),
            cache: CachePolicy {
                stale_after: self
                    .cache_stale_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.cache.stale_after),
                evict_after: self
                    .cache_evict_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.cache.evict_after),
            },
        }
    }
}
