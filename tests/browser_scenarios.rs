//! End-to-end extractions against pages served locally.
//!
//! These launch a real browser, so they are ignored by default:
//! `cargo test -- --ignored` runs them where Chrome or Chromium is installed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;

use embedsniff::extract::ResolveFinal;
use embedsniff::{Config, EmbedExtractor, ScrapeError, SourceMethod};

/// Keeps every candidate as-is, so tests never touch the internet.
struct IdentityResolver;

#[async_trait]
impl ResolveFinal for IdentityResolver {
    async fn resolve_final(&self, candidate: &str, _timeout: Duration) -> String {
        candidate.to_string()
    }
}

const FRAME_PAGE: &str = r#"<!doctype html>
<html><body>
  <h1>Episode 1</h1>
  <iframe src="https://player.example.com/v/123" title="Main"></iframe>
  <ul><li>Mp4Upload</li><li><a href="/about">About</a></li></ul>
</body></html>"#;

const FETCH_PAGE: &str = r#"<!doctype html>
<html><body>
  <h1>Episode 2</h1>
  <script>fetch('https://cdn.example.com/abc.m3u8').catch(() => {});</script>
</body></html>"#;

const PLAIN_PAGE: &str = r#"<!doctype html>
<html><body><p>Nothing to see here.</p></body></html>"#;

const INNER_FRAME_PAGE: &str = r#"<!doctype html>
<html><body>
  <script>fetch('https://cdn.example.com/inner.m3u8').catch(() => {});</script>
</body></html>"#;

const JSON_PAGE: &str = r#"<!doctype html>
<html><body>
  <script>
    fetch('/api/sources').then(r => r.json()).catch(() => {});
    fetch('/api/broken').then(r => r.json()).catch(() => {});
  </script>
</body></html>"#;

const BUSY_PAGE: &str = r#"<!doctype html>
<html><body>
  <script>
    for (let i = 0; i < 3; i++) { fetch('/hang?n=' + i).catch(() => {}); }
  </script>
</body></html>"#;

const BLOCKED_PAGE: &str = r#"<!doctype html>
<html><head><link rel="stylesheet" href="/media/player.css"></head>
<body><img src="/media/player-poster.png" alt=""></body></html>"#;

/// A local site plus a count of requests that reached `/media/*`.
struct Site {
    addr: SocketAddr,
    media_hits: Arc<AtomicUsize>,
}

impl Site {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn spawn_site() -> Site {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let media_hits = Arc::new(AtomicUsize::new(0));

    // `localhost` is a different site from `127.0.0.1`, so this frame is cross-origin.
    let outer_page = format!(
        r#"<!doctype html>
<html><body><iframe src="http://localhost:{}/inner"></iframe></body></html>"#,
        addr.port()
    );

    let hits = Arc::clone(&media_hits);
    let app = Router::new()
        .route("/frame", get(|| async { Html(FRAME_PAGE) }))
        .route("/fetching", get(|| async { Html(FETCH_PAGE) }))
        .route("/plain", get(|| async { Html(PLAIN_PAGE) }))
        .route(
            "/outer",
            get(move || {
                let page = outer_page.clone();
                async move { Html(page) }
            }),
        )
        .route("/inner", get(|| async { Html(INNER_FRAME_PAGE) }))
        .route("/json", get(|| async { Html(JSON_PAGE) }))
        .route(
            "/api/sources",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"sources":[{"file":"https:\/\/cdn.example.com\/from-json.m3u8"}]}"#,
                )
            }),
        )
        .route(
            "/api/broken",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{"sources":[{"file": "#,
                )
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Html(PLAIN_PAGE)
            }),
        )
        .route("/busy", get(|| async { Html(BUSY_PAGE) }))
        .route(
            "/hang",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "late"
            }),
        )
        .route("/blocked", get(|| async { Html(BLOCKED_PAGE) }))
        .route(
            "/media/*file",
            get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NOT_FOUND.into_response()
                }
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Site { addr, media_hits }
}

fn extractor() -> EmbedExtractor {
    EmbedExtractor::with_resolver(Config::default().with_env_overrides(), Arc::new(IdentityResolver))
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_iframe_page_yields_one_iframe_embed() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/frame"), None, Some(15_000)).unwrap();

    let result = extractor.extract(&request).await.unwrap();

    assert_eq!(result.embeds.len(), 1, "{:?}", result.embeds);
    assert_eq!(result.embeds[0].source_method, SourceMethod::DomIframe);
    assert!(result.embeds[0].source_url.ends_with("/v/123"));
    assert_eq!(result.embeds[0].title.as_deref(), Some("Main"));
    assert!(result.servers.iter().any(|s| s.label == "Mp4Upload"));
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_manifest_request_yields_one_network_embed() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/fetching"), None, Some(15_000)).unwrap();

    let result = extractor.extract(&request).await.unwrap();

    assert_eq!(result.embeds.len(), 1, "{:?}", result.embeds);
    assert_eq!(result.embeds[0].source_method, SourceMethod::Network);
    assert_eq!(result.embeds[0].source_url, "https://cdn.example.com/abc.m3u8");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_cross_origin_frame_traffic_is_observed() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/outer"), None, Some(15_000)).unwrap();

    let result = extractor.extract(&request).await.unwrap();

    assert!(
        result.embeds.iter().any(|e| e.source_method == SourceMethod::DomIframe
            && e.source_url.contains("localhost")),
        "{:?}",
        result.embeds
    );
    assert!(
        result.embeds.iter().any(|e| e.source_method == SourceMethod::Network
            && e.source_url == "https://cdn.example.com/inner.m3u8"),
        "{:?}",
        result.embeds
    );
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_json_bodies_scanned_and_malformed_one_ignored() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/json"), None, Some(15_000)).unwrap();

    let result = extractor.extract(&request).await.unwrap();

    assert!(
        result.embeds.iter().any(|e| e.source_method == SourceMethod::Network
            && e.source_url == "https://cdn.example.com/from-json.m3u8"),
        "{:?}",
        result.embeds
    );
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_blocked_resource_types_never_reach_the_server() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/blocked"), None, Some(15_000)).unwrap();

    extractor.extract(&request).await.unwrap();

    assert_eq!(site.media_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_missing_selector_is_not_an_error() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor
        .request(&site.url("/plain"), Some("#never-appears".into()), Some(15_000))
        .unwrap();

    let result = extractor.extract(&request).await.unwrap();
    assert!(result.embeds.is_empty());
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_stalled_page_times_out() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/slow"), None, Some(3_000)).unwrap();

    let err = extractor.extract(&request).await.unwrap_err();
    assert!(matches!(err, ScrapeError::NavigationTimeout { .. }), "{:?}", err);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_network_that_never_goes_idle_times_out() {
    let site = spawn_site().await;
    let extractor = extractor();
    let request = extractor.request(&site.url("/busy"), None, Some(4_000)).unwrap();

    let err = extractor.extract(&request).await.unwrap_err();
    assert!(matches!(err, ScrapeError::NavigationTimeout { .. }), "{:?}", err);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_unreachable_host_fails() {
    let extractor = extractor();
    let request = extractor
        .request("http://127.0.0.1:1/", None, Some(10_000))
        .unwrap();

    let err = extractor.extract(&request).await.unwrap_err();
    assert!(!err.is_client_error());
    assert!(matches!(err, ScrapeError::Navigation { .. }), "{:?}", err);
}
