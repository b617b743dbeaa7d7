// tests/api_cache.rs
//! Query-cache behavior of GET /api/news, verified through a counting
//! mock pipeline: within the TTL no new aggregation pass runs and the
//! response bytes are identical; bypass and expiry force a fresh pass.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use tower::ServiceExt; // for oneshot

use secnews_aggregator::api::{create_router, AppState};
use secnews_aggregator::cache::NewsCache;
use secnews_aggregator::ingest::types::{AggregatePolicy, Article, NewsPipeline};

#[derive(Default)]
struct CountingPipeline {
    calls: AtomicUsize,
}

impl CountingPipeline {
    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NewsPipeline for CountingPipeline {
    async fn aggregate(&self, _now: DateTime<Utc>, _policy: AggregatePolicy) -> Vec<Article> {
        let pass = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        vec![Article {
            title: format!("article from pass {pass}"),
            link: "https://example.test/a".into(),
            date: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            source: "Mock".into(),
            description: None,
        }]
    }
}

fn test_app(ttl: Duration) -> (Router, Arc<CountingPipeline>) {
    let pipeline = Arc::new(CountingPipeline::default());
    let state = AppState {
        pipeline: pipeline.clone(),
        cache: Arc::new(NewsCache::new(ttl)),
        gate: None,
    };
    (create_router(state), pipeline)
}

async fn get_news(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request build");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

#[tokio::test]
async fn second_call_within_ttl_serves_cached_bytes() {
    let (app, pipeline) = test_app(Duration::from_secs(300));

    let (s1, b1) = get_news(&app, "/api/news").await;
    let (s2, b2) = get_news(&app, "/api/news").await;

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(pipeline.count(), 1, "second call must not trigger a pass");
    assert_eq!(b1, b2, "cached response must be byte-identical");
}

#[tokio::test]
async fn bypass_flag_forces_a_fresh_pass() {
    let (app, pipeline) = test_app(Duration::from_secs(300));

    let (_, b1) = get_news(&app, "/api/news").await;
    let (_, b2) = get_news(&app, "/api/news?noCache=1").await;
    assert_eq!(pipeline.count(), 2);
    assert_ne!(b1, b2);

    // noCache=0 is not a bypass
    let (_, b3) = get_news(&app, "/api/news?noCache=0").await;
    assert_eq!(pipeline.count(), 2);
    assert_eq!(b2, b3, "bypass result replaced the cache slot");
}

#[tokio::test]
async fn expired_cache_triggers_a_new_pass() {
    const TTL: Duration = Duration::from_millis(50);
    let (app, pipeline) = test_app(TTL);

    let (_, b1) = get_news(&app, "/api/news").await;
    // well over TTL to avoid boundary flakes
    tokio::time::sleep(TTL * 5).await;
    let (_, b2) = get_news(&app, "/api/news").await;

    assert_eq!(pipeline.count(), 2, "expired cache must force re-aggregation");
    assert_ne!(b1, b2);
}

#[tokio::test]
async fn responses_are_marked_non_cacheable() {
    let (app, _) = test_app(Duration::from_secs(300));
    let req = Request::builder()
        .uri("/api/news")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()
            .get(http::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );
}
