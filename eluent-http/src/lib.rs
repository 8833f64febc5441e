//! HTTP catalog client for eluent search.
//!
//! [`HttpCatalog`] implements [`eluent_core::Catalog`] over reqwest, sending
//! `GET {base_url}/products?search=..&page=..&limit=..&category=..` with empty
//! parameters left out. Error responses are mapped to [`CatalogError`]; the
//! payload itself is returned raw for the core to normalize.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eluent_core::{SearchConfig, SearchCoordinator};
//! use eluent_http::{load_config, HttpCatalog, HttpConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let file = load_config();
//!     let http = HttpConfig::resolve(std::env::var("ELUENT_API_BASE_URL").ok().as_deref(), &file).unwrap();
//!     let catalog = HttpCatalog::from_config(&http).unwrap();
//!
//!     let mut search = SearchCoordinator::new(Arc::new(catalog), file.search.into_config());
//!     search.set_query("iphone");
//!     while let Some(event) = search.next_event().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::HttpCatalog;
pub use config::{
    load_config, load_config_from, ConfigFile, HttpConfig, BASE_URL_ENV, DEFAULT_BASE_URL,
    DEFAULT_TIMEOUT,
};
pub use error::{CatalogError, ConfigError};
