use eluent_core::{CancelToken, Catalog, PageRequest};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::HttpConfig;
use crate::error::CatalogError;

const PRODUCTS_PATH: &str = "/products";

/// Message used when an error response carries none.
const FALLBACK_ERROR_MESSAGE: &str = "Request failed";

/// Client for the catalog's paginated products endpoint.
pub struct HttpCatalog {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    /// Creates a client for the given base URL with reqwest's defaults.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Creates a client honouring the configured base URL and timeout.
    pub fn from_config(config: &HttpConfig) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches one raw page, giving up early if `cancel` fires.
    ///
    /// Non-2xx responses become [`CatalogError::Api`]; an empty success body
    /// is returned as `Value::Null`.
    #[instrument(skip(self, request, cancel), fields(search = %request.query, page = request.page))]
    pub async fn get_page(&self, request: &PageRequest, cancel: &CancelToken) -> Result<Value, CatalogError> {
        debug!("Sending request to catalog");

        let exchange = async {
            let response = self
                .http
                .get(format!("{}{}", self.base_url, PRODUCTS_PATH))
                .query(&request.params())
                .send()
                .await
                .map_err(CatalogError::from_transport)?;

            let status = response.status();
            let body = response.text().await.map_err(CatalogError::from_transport)?;
            Ok::<_, CatalogError>((status, body))
        };

        let (status, body) = tokio::select! {
            result = exchange => result?,
            _ = cancel.cancelled() => {
                debug!("Request cancelled");
                return Err(CatalogError::Cancelled);
            }
        };

        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        debug!(status = status.as_u16(), bytes = body.len(), "Received successful response");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl Default for HttpCatalog {
    fn default() -> Self {
        Self::with_base_url(HttpConfig::default().base_url)
    }
}

impl Catalog for HttpCatalog {
    type Error = CatalogError;

    async fn fetch_page(&self, request: PageRequest, cancel: CancelToken) -> Result<Value, CatalogError> {
        self.get_page(&request, &cancel).await
    }
}

/// The `message` field of an error body, or a generic message.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}
