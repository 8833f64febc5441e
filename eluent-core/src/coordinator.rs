//! Debounced, incrementally paginated search over a [`Catalog`].
//!
//! The coordinator is owned and driven by a single caller (typically a UI
//! loop). Fetches run as tokio tasks and report back over a channel; their
//! outcomes are applied only inside [`SearchCoordinator::poll`] or
//! [`SearchCoordinator::next_event`], so all state changes happen on the
//! owner's side.
//!
//! Every fetch is tagged with the session it was issued under. A session is
//! created per settled query value, and outcomes carrying an outdated tag are
//! discarded, so results for a query the user has left never reach the
//! current aggregate.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

use crate::cache::PageCache;
use crate::catalog::{CancelSource, Catalog, PageRequest};
use crate::config::SearchConfig;
use crate::debounce::Debounce;
use crate::page::{normalize_page, Fallback, Page};
use crate::product::Product;

/// Identity of one query session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionTag {
    epoch: u64,
    query: String,
}

/// Why a page is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First page of a new session.
    Initial,
    /// Forward pagination.
    Next,
    /// Re-fetching the loaded page set from page 1.
    Refresh,
}

/// Coarse state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    InitialLoading,
    HasData,
    FetchingNext,
    Error,
}

/// Something the coordinator did while being pumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// The debounce window closed on a new query value.
    QuerySettled { query: String },
    /// Cached pages were installed for a new session.
    RestoredFromCache {
        query: String,
        pages: usize,
        fresh: bool,
    },
    PageLoaded { query: String, page: u32 },
    FetchFailed { query: String, page: u32 },
    /// An outcome arrived for a session that is no longer current.
    StaleDiscarded { query: String, page: u32 },
}

/// Why a fetch produced no payload.
enum FetchFailure<E> {
    Catalog(E),
    /// The fetch task ended without a result, e.g. by panicking.
    Aborted,
}

struct FetchOutcome<E> {
    tag: SessionTag,
    page: u32,
    result: Result<Value, FetchFailure<E>>,
}

struct InFlight {
    page: u32,
    kind: FetchKind,
    // Cancels the request when the session drops it.
    _cancel: CancelSource,
}

struct Refresh {
    staged: Vec<Arc<Page<Product>>>,
    upto: u32,
}

struct Session<E> {
    tag: SessionTag,
    pages: Vec<Arc<Page<Product>>>,
    in_flight: Option<InFlight>,
    refresh: Option<Refresh>,
    error: Option<E>,
    failed: Option<(u32, FetchKind)>,
}

impl<E> Session<E> {
    fn new(tag: SessionTag) -> Self {
        Self {
            tag,
            pages: Vec::new(),
            in_flight: None,
            refresh: None,
            error: None,
            failed: None,
        }
    }

    fn next_page(&self) -> u32 {
        self.pages.last().map_or(1, |page| page.page.saturating_add(1))
    }
}

/// Owns the query, its debounced value and the pages fetched for it.
pub struct SearchCoordinator<C: Catalog> {
    catalog: Arc<C>,
    config: SearchConfig,
    query: String,
    debounced_query: String,
    debounce: Debounce<String>,
    session: Option<Session<C::Error>>,
    next_epoch: u64,
    cache: PageCache<Product>,
    events: VecDeque<SearchEvent>,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome<C::Error>>,
    outcome_rx: mpsc::UnboundedReceiver<FetchOutcome<C::Error>>,
}

impl<C: Catalog> SearchCoordinator<C> {
    pub fn new(catalog: Arc<C>, config: SearchConfig) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            catalog,
            debounce: Debounce::new(config.debounce),
            cache: PageCache::new(config.cache),
            config,
            query: String::new(),
            debounced_query: String::new(),
            session: None,
            next_epoch: 0,
            events: VecDeque::new(),
            outcome_tx,
            outcome_rx,
        }
    }

    /// Starts with `query` already settled, skipping the debounce window.
    ///
    /// Must be called inside a tokio runtime when `query` is not blank.
    pub fn with_initial_query(catalog: Arc<C>, config: SearchConfig, query: impl Into<String>) -> Self {
        let mut coordinator = Self::new(catalog, config);
        let query = query.into();
        coordinator.query = query.clone();
        coordinator.start_session(query);
        coordinator
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The raw query as last set.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The query the current session was started for.
    pub fn debounced_query(&self) -> &str {
        &self.debounced_query
    }

    /// Updates the raw query and restarts the debounce window.
    pub fn set_query(&mut self, value: impl Into<String>) {
        let value = value.into();
        self.query = value.clone();
        self.debounce.schedule(value, Instant::now());
    }

    /// All fetched items of the current session, in page order.
    pub fn items(&self) -> impl Iterator<Item = &Product> {
        self.pages().iter().flat_map(|page| page.items.iter())
    }

    /// Fetched pages of the current session, in page order.
    pub fn pages(&self) -> &[Arc<Page<Product>>] {
        self.session
            .as_ref()
            .map(|s| s.pages.as_slice())
            .unwrap_or(&[])
    }

    /// Total reported by the first page, or 0 before any page arrived.
    pub fn total(&self) -> u64 {
        self.pages().first().map_or(0, |page| page.total)
    }

    pub fn has_next_page(&self) -> bool {
        self.pages().last().is_some_and(|page| page.has_more)
    }

    pub fn is_initial_loading(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pages.is_empty() && s.in_flight.is_some())
    }

    pub fn is_fetching_next_page(&self) -> bool {
        self.in_flight_kind() == Some(FetchKind::Next)
    }

    /// Whether the loaded page set is being re-fetched in the background.
    pub fn is_refetching(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.refresh.is_some())
    }

    /// The most recent fetch failure, as returned by the catalog.
    ///
    /// `None` when the last fetch was aborted without an error value;
    /// [`state`](Self::state) still reports [`SearchState::Error`] then.
    pub fn error(&self) -> Option<&C::Error> {
        self.session.as_ref().and_then(|s| s.error.as_ref())
    }

    pub fn state(&self) -> SearchState {
        let Some(session) = &self.session else {
            return SearchState::Idle;
        };
        match session.in_flight.as_ref().map(|f| f.kind) {
            Some(FetchKind::Next) => SearchState::FetchingNext,
            Some(_) if session.pages.is_empty() => SearchState::InitialLoading,
            Some(_) => SearchState::HasData,
            None if session.failed.is_some() => SearchState::Error,
            None if session.pages.is_empty() => SearchState::Idle,
            None => SearchState::HasData,
        }
    }

    /// Requests the page after the last loaded one.
    ///
    /// Returns whether a fetch was issued: nothing happens without a next
    /// page or while another fetch is in flight.
    pub fn fetch_next_page(&mut self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if session.in_flight.is_some() || !self.has_next_page() {
            return false;
        }
        let page = session.next_page();
        self.issue(page, FetchKind::Next);
        true
    }

    /// Re-issues the failed fetch, or re-fetches the loaded page set.
    ///
    /// Returns whether a fetch was issued. Idle sessions and sessions with a
    /// fetch already in flight are left alone.
    pub fn refetch(&mut self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if session.in_flight.is_some() {
            return false;
        }
        let failed = session.failed;
        let has_pages = !session.pages.is_empty();
        match failed {
            Some((_, FetchKind::Refresh)) => self.begin_refresh(),
            Some((page, kind)) => self.issue(page, kind),
            None if has_pages => self.begin_refresh(),
            None => self.issue(1, FetchKind::Initial),
        }
        true
    }

    /// Clears both query values at once and drops the current session.
    pub fn reset(&mut self) {
        debug!("resetting search");
        self.query.clear();
        self.debounce.cancel();
        self.leave_session();
        self.debounced_query.clear();
    }

    /// Applies everything that is ready without waiting.
    ///
    /// Fires a due debounce, applies every fetch outcome already received
    /// and sweeps the page cache.
    pub fn poll(&mut self) -> Vec<SearchEvent> {
        if let Some(value) = self.debounce.take_due(Instant::now()) {
            self.settle(value);
        }
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply(outcome);
        }
        self.sweep_cache();
        self.events.drain(..).collect()
    }

    /// Waits for the next debounce deadline or fetch outcome and applies it.
    ///
    /// Returns `None` once nothing is pending: no armed debounce and no fetch
    /// in flight.
    pub async fn next_event(&mut self) -> Option<SearchEvent> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }

            let deadline = self.debounce.deadline();
            if deadline.is_none() && self.in_flight_kind().is_none() {
                return None;
            }

            tokio::select! {
                Some(outcome) = self.outcome_rx.recv() => self.apply(outcome),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(value) = self.debounce.take_due(Instant::now()) {
                        self.settle(value);
                    }
                }
                else => return None,
            }
            self.sweep_cache();
        }
    }

    fn in_flight_kind(&self) -> Option<FetchKind> {
        self.session
            .as_ref()
            .and_then(|s| s.in_flight.as_ref())
            .map(|f| f.kind)
    }

    fn settle(&mut self, value: String) {
        if value == self.debounced_query {
            return;
        }
        self.events.push_back(SearchEvent::QuerySettled {
            query: value.clone(),
        });
        self.start_session(value);
    }

    fn start_session(&mut self, query: String) {
        self.leave_session();
        self.debounced_query = query.clone();
        if query.trim().is_empty() {
            debug!("query is blank, staying idle");
            return;
        }

        self.next_epoch += 1;
        let tag = SessionTag {
            epoch: self.next_epoch,
            query,
        };
        debug!(query = %tag.query, epoch = tag.epoch, "starting search session");
        let mut session = Session::new(tag);

        match self.cache.restore(&session.tag.query, Instant::now()) {
            Some(cached) => {
                debug!(pages = cached.pages.len(), fresh = cached.fresh, "restored cached pages");
                self.events.push_back(SearchEvent::RestoredFromCache {
                    query: session.tag.query.clone(),
                    pages: cached.pages.len(),
                    fresh: cached.fresh,
                });
                session.pages = cached.pages;
                self.session = Some(session);
                if !cached.fresh {
                    self.begin_refresh();
                }
            }
            None => {
                self.session = Some(session);
                self.issue(1, FetchKind::Initial);
            }
        }
    }

    fn leave_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(in_flight) = &session.in_flight {
                debug!(query = %session.tag.query, page = in_flight.page, "cancelling in-flight fetch");
            }
            self.cache.touch(&session.tag.query, Instant::now());
        }
    }

    fn begin_refresh(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.refresh = Some(Refresh {
            staged: Vec::new(),
            upto: u32::try_from(session.pages.len()).unwrap_or(u32::MAX).max(1),
        });
        self.issue(1, FetchKind::Refresh);
    }

    fn issue(&mut self, page: u32, kind: FetchKind) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let request = PageRequest {
            query: session.tag.query.clone(),
            page,
            page_size: self.config.page_size,
            category: self.config.category.clone(),
        };
        let (cancel, token) = CancelSource::new();
        let catalog = Arc::clone(&self.catalog);
        let tx = self.outcome_tx.clone();
        let tag = session.tag.clone();

        debug!(query = %request.query, page, ?kind, "fetching page");
        let fetch = tokio::spawn(async move { catalog.fetch_page(request, token).await });
        tokio::spawn(async move {
            let result = match fetch.await {
                Ok(result) => result.map_err(FetchFailure::Catalog),
                Err(e) => {
                    warn!(page, error = %e, "fetch task ended without a result");
                    Err(FetchFailure::Aborted)
                }
            };
            // The receiver lives as long as the coordinator.
            let _ = tx.send(FetchOutcome { tag, page, result });
        });

        session.error = None;
        session.failed = None;
        session.in_flight = Some(InFlight {
            page,
            kind,
            _cancel: cancel,
        });
    }

    fn apply(&mut self, outcome: FetchOutcome<C::Error>) {
        let event = self.apply_outcome(outcome);
        self.events.push_back(event);
    }

    fn apply_outcome(&mut self, outcome: FetchOutcome<C::Error>) -> SearchEvent {
        let FetchOutcome { tag, page, result } = outcome;
        let stale = SearchEvent::StaleDiscarded {
            query: tag.query.clone(),
            page,
        };

        let Some(session) = self.session.as_mut() else {
            trace!(query = %tag.query, page, "discarding outcome with no active session");
            return stale;
        };
        if session.tag != tag || session.in_flight.as_ref().map(|f| f.page) != Some(page) {
            trace!(query = %tag.query, page, "discarding stale outcome");
            return stale;
        }
        let Some(in_flight) = session.in_flight.take() else {
            return stale;
        };

        let raw = match result {
            Ok(raw) => raw,
            Err(failure) => {
                if let FetchFailure::Catalog(error) = failure {
                    warn!(query = %tag.query, page, %error, "page fetch failed");
                    session.error = Some(error);
                }
                session.failed = Some((page, in_flight.kind));
                if in_flight.kind == FetchKind::Refresh {
                    session.refresh = None;
                }
                return SearchEvent::FetchFailed {
                    query: tag.query,
                    page,
                };
            }
        };

        let fallback = Fallback {
            page,
            page_size: Some(self.config.page_size),
        };
        let normalized = Arc::new(normalize_page(Some(&raw), fallback, Product::from_raw));
        debug!(
            query = %tag.query,
            page,
            items = normalized.items.len(),
            has_more = normalized.has_more,
            "page loaded"
        );
        self.cache
            .insert(&tag.query, page, Arc::clone(&normalized), Instant::now());

        match in_flight.kind {
            FetchKind::Initial | FetchKind::Next => session.pages.push(normalized),
            FetchKind::Refresh => {
                let continue_from = session.refresh.as_mut().and_then(|refresh| {
                    let has_more = normalized.has_more;
                    refresh.staged.push(normalized);
                    (has_more && page < refresh.upto).then_some(page + 1)
                });
                match continue_from {
                    Some(next) => self.issue(next, FetchKind::Refresh),
                    None => {
                        if let Some(refresh) = session.refresh.take() {
                            session.pages = refresh.staged;
                        }
                    }
                }
            }
        }

        SearchEvent::PageLoaded {
            query: tag.query,
            page,
        }
    }

    fn sweep_cache(&mut self) {
        self.cache.evict_expired(&self.debounced_query, Instant::now());
    }
}

impl<C: Catalog> std::fmt::Debug for SearchCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCoordinator")
            .field("query", &self.query)
            .field("debounced_query", &self.debounced_query)
            .field("state", &self.state())
            .field("pages", &self.pages().len())
            .field("cached_pages", &self.cache.len())
            .finish()
    }
}
