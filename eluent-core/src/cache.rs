use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::page::Page;

/// Freshness and eviction windows for cached pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// A page younger than this is served without refetching.
    pub stale_after: Duration,
    /// A page unused for this long is dropped.
    pub evict_after: Duration,
}

impl CachePolicy {
    /// No page is ever retained.
    pub fn disabled() -> Self {
        Self {
            stale_after: Duration::ZERO,
            evict_after: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.evict_after.is_zero()
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(60),
            evict_after: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    page: u32,
}

#[derive(Debug)]
struct CacheEntry<T> {
    page: Arc<Page<T>>,
    fetched_at: Instant,
    last_used: Instant,
}

/// Pages restored for a query, with whether they can be served as-is.
#[derive(Debug)]
pub struct CachedPages<T> {
    pub pages: Vec<Arc<Page<T>>>,
    pub fresh: bool,
}

/// Fetched pages keyed by `(query, page)`.
#[derive(Debug)]
pub struct PageCache<T> {
    policy: CachePolicy,
    entries: HashMap<CacheKey, CacheEntry<T>>,
}

impl<T> PageCache<T> {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `page` as the result of requesting page `number` of `query`.
    pub fn insert(&mut self, query: &str, number: u32, page: Arc<Page<T>>, now: Instant) {
        if !self.policy.is_enabled() {
            return;
        }
        let key = CacheKey {
            query: query.to_string(),
            page: number,
        };
        self.entries.insert(
            key,
            CacheEntry {
                page,
                fetched_at: now,
                last_used: now,
            },
        );
    }

    /// The contiguous run of cached pages for `query` starting at page 1.
    ///
    /// The run stops at the first gap or at a page that reports no more
    /// results. Freshness is judged by page 1. Restored entries count as used.
    pub fn restore(&mut self, query: &str, now: Instant) -> Option<CachedPages<T>> {
        let mut pages = Vec::new();
        let mut fresh = false;
        let mut number = 1;

        while let Some(entry) = self.entries.get_mut(&CacheKey {
            query: query.to_string(),
            page: number,
        }) {
            entry.last_used = now;
            if number == 1 {
                fresh = now.saturating_duration_since(entry.fetched_at) < self.policy.stale_after;
            }
            let has_more = entry.page.has_more;
            pages.push(Arc::clone(&entry.page));
            if !has_more {
                break;
            }
            number += 1;
        }

        (!pages.is_empty()).then_some(CachedPages { pages, fresh })
    }

    /// Marks every page of `query` as used at `now`.
    pub fn touch(&mut self, query: &str, now: Instant) {
        for (key, entry) in self.entries.iter_mut() {
            if key.query == query {
                entry.last_used = now;
            }
        }
    }

    /// Drops entries unused for longer than the eviction window, sparing
    /// those of `active`.
    pub fn evict_expired(&mut self, active: &str, now: Instant) -> usize {
        let evict_after = self.policy.evict_after;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            key.query == active || now.saturating_duration_since(entry.last_used) < evict_after
        });
        let evicted = before - self.entries.len();
        if evicted > 0 {
            trace!(evicted, "evicted cached pages");
        }
        evicted
    }
}
