use std::future::Future;

use serde_json::Value;
use tokio::sync::watch;

/// Parameters of one page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub category: Option<String>,
}

impl PageRequest {
    /// Request parameters as sent to the endpoint, with empty values omitted.
    ///
    /// Names follow the endpoint: `search`, `page`, `limit`, `category`.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if !self.query.is_empty() {
            params.push(("search", self.query.clone()));
        }
        params.push(("page", self.page.to_string()));
        params.push(("limit", self.page_size.to_string()));
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            params.push(("category", category.to_string()));
        }
        params
    }
}

/// Source of raw catalog pages.
///
/// Implementations return the payload untouched; normalization happens in
/// the coordinator. `cancel` fires when the coordinator no longer wants the
/// result, and implementations may use it to abandon the request early.
pub trait Catalog: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_page(
        &self,
        request: PageRequest,
        cancel: CancelToken,
    ) -> impl Future<Output = Result<Value, Self::Error>> + Send;
}

/// Owning side of a cancellation pair. Cancels when dropped.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Observing side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Drop for CancelSource {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Keep the value alive without a sender; `cancelled` then pends forever.
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the source cancels.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without cancelling.
            std::future::pending::<()>().await;
        }
    }
}
