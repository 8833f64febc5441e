//! HttpCatalog against a throwaway local HTTP responder.

use std::sync::Arc;
use std::time::Duration;

use eluent_core::{
    normalize_page, CancelSource, CancelToken, Catalog, Fallback, PageRequest, Product,
    SearchConfig, SearchCoordinator, SearchEvent,
};
use eluent_http::{CatalogError, HttpCatalog, HttpConfig};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accepts one connection, answers it with `status` and `body`, and returns
/// the request line it received.
async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_head(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;

        request.lines().next().unwrap_or_default().to_string()
    });

    (format!("http://{addr}/api"), handle)
}

/// Accepts one connection and never answers.
async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_head(&mut socket).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    format!("http://{addr}/api")
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = vec![0u8; 8192];
    let mut read = 0;
    loop {
        let n = socket.read(&mut buf[read..]).await.unwrap();
        read += n;
        if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
            break;
        }
    }
    String::from_utf8_lossy(&buf[..read]).to_string()
}

fn request(query: &str, page: u32, category: Option<&str>) -> PageRequest {
    PageRequest {
        query: query.to_string(),
        page,
        page_size: 10,
        category: category.map(String::from),
    }
}

#[tokio::test]
async fn fetches_products_page_with_pruned_params() {
    let body = json!({
        "query": "iphone",
        "page": 2,
        "limit": 10,
        "total": 40,
        "totalPages": 4,
        "results": [{
            "id": "1",
            "name": "iPhone 15 Pro",
            "description": "Latest flagship",
            "price": 1500,
            "category": "mobile"
        }]
    });
    let (base_url, server) = serve_once("200 OK", body.to_string()).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    let raw = catalog
        .fetch_page(request("iphone", 2, None), CancelToken::never())
        .await
        .unwrap();

    let request_line = server.await.unwrap();
    assert_eq!(request_line, "GET /api/products?search=iphone&page=2&limit=10 HTTP/1.1");

    let page = normalize_page(
        Some(&raw),
        Fallback {
            page: 2,
            page_size: Some(10),
        },
        Product::from_raw,
    );
    assert_eq!(page.total, 40);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 10);
    assert!(page.has_more);
    assert_eq!(page.items[0].title, "iPhone 15 Pro");
}

#[tokio::test]
async fn sends_category_when_set() {
    let (base_url, server) = serve_once("200 OK", "{}".to_string()).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    catalog
        .get_page(&request("tv", 1, Some("electronics")), &CancelToken::never())
        .await
        .unwrap();

    assert_eq!(
        server.await.unwrap(),
        "GET /api/products?search=tv&page=1&limit=10&category=electronics HTTP/1.1"
    );
}

#[tokio::test]
async fn empty_success_body_is_null() {
    let (base_url, _server) = serve_once("200 OK", String::new()).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    let raw = catalog
        .get_page(&request("tv", 1, None), &CancelToken::never())
        .await
        .unwrap();
    assert!(raw.is_null());
}

#[tokio::test]
async fn error_status_uses_body_message() {
    let body = json!({ "message": "Catalog offline" }).to_string();
    let (base_url, _server) = serve_once("503 Service Unavailable", body).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    let err = catalog
        .get_page(&request("tv", 1, None), &CancelToken::never())
        .await
        .unwrap_err();
    match err {
        CatalogError::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Catalog offline");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_status_without_message() {
    let (base_url, _server) = serve_once("404 Not Found", "not json".to_string()).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    let err = catalog
        .get_page(&request("tv", 1, None), &CancelToken::never())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API error: 404 - Request failed");
}

#[tokio::test]
async fn malformed_success_body_is_json_error() {
    let (base_url, _server) = serve_once("200 OK", "{ nope".to_string()).await;
    let catalog = HttpCatalog::with_base_url(base_url);

    let err = catalog
        .get_page(&request("tv", 1, None), &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Json(_)));
}

#[tokio::test]
async fn slow_response_times_out() {
    let base_url = serve_silence().await;
    let config = HttpConfig {
        base_url,
        timeout: Duration::from_millis(100),
    };
    let catalog = HttpCatalog::from_config(&config).unwrap();

    let err = catalog
        .get_page(&request("tv", 1, None), &CancelToken::never())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Timeout), "{err:?}");
    assert_eq!(err.to_string(), "Request timed out");
}

#[tokio::test]
async fn cancellation_abandons_request() {
    let base_url = serve_silence().await;
    let catalog = HttpCatalog::with_base_url(base_url);
    let (source, token) = CancelSource::new();

    let pending = tokio::spawn(async move { catalog.get_page(&request("tv", 1, None), &token).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    source.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("request was not abandoned")
        .unwrap();
    assert!(matches!(result, Err(CatalogError::Cancelled)));
}

#[tokio::test]
async fn drives_coordinator_end_to_end() {
    let body = json!({
        "page": 1,
        "limit": 10,
        "total": 1,
        "results": [{ "id": "p1", "title": "Pixel 8", "price": 699.0, "rating": 4.5 }]
    });
    let (base_url, server) = serve_once("200 OK", body.to_string()).await;
    let config = SearchConfig {
        debounce: Duration::from_millis(20),
        ..SearchConfig::default()
    };
    let mut search = SearchCoordinator::new(Arc::new(HttpCatalog::with_base_url(base_url)), config);

    search.set_query("pixel");
    assert_eq!(
        search.next_event().await,
        Some(SearchEvent::QuerySettled {
            query: "pixel".to_string()
        })
    );
    assert_eq!(
        search.next_event().await,
        Some(SearchEvent::PageLoaded {
            query: "pixel".to_string(),
            page: 1
        })
    );

    assert_eq!(
        server.await.unwrap(),
        "GET /api/products?search=pixel&page=1&limit=10 HTTP/1.1"
    );
    let items: Vec<&Product> = search.items().collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].rating, Some(4.5));
    assert_eq!(search.total(), 1);
    assert!(!search.has_next_page());
}
