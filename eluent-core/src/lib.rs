//! Debounced, paginated catalog search.
//!
//! Core concepts:
//! - **Normalizer**: [`normalize_page`] turns an inconsistently shaped payload
//!   into a complete [`Page`], never failing on missing or malformed fields
//! - **Catalog**: the injected fetch boundary ([`Catalog`]) returning raw pages
//! - **Coordinator**: [`SearchCoordinator`] debounces the query, fetches pages
//!   in order, aggregates them and discards results for abandoned queries
//! - **Cache**: [`PageCache`] keeps fetched pages per `(query, page)` so
//!   revisiting a query can skip the network
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eluent_core::{SearchConfig, SearchCoordinator};
//!
//! let mut search = SearchCoordinator::new(Arc::new(catalog), SearchConfig::default());
//! search.set_query("iphone");
//!
//! while let Some(event) = search.next_event().await {
//!     println!("{event:?}: {} items", search.items().count());
//! }
//!
//! if search.has_next_page() {
//!     search.fetch_next_page();
//! }
//! ```

mod cache;
mod catalog;
mod config;
mod coordinator;
mod debounce;
mod page;
mod product;

pub use cache::{CachePolicy, CachedPages, PageCache};
pub use catalog::{CancelSource, CancelToken, Catalog, PageRequest};
pub use config::{SearchConfig, SearchSettings, DEBOUNCE_DELAY, DEFAULT_PAGE_SIZE};
pub use coordinator::{FetchKind, SearchCoordinator, SearchEvent, SearchState};
pub use debounce::Debounce;
pub use page::{normalize_page, Fallback, ItemContext, Page};
pub use product::{fallback_id, Product, UNTITLED_PRODUCT};
