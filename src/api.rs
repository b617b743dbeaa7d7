// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use tower_http::cors::CorsLayer;

use crate::cache::NewsCache;
use crate::ingest::types::{AggregatePolicy, Article, NewsPipeline};
use crate::notify::NotificationGate;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<dyn NewsPipeline>,
    pub cache: Arc<NewsCache>,
    pub gate: Option<Arc<NotificationGate>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/news/notify", get(run_notify_job))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct NewsQuery {
    #[serde(rename = "noCache", default)]
    no_cache: Option<String>,
}

impl NewsQuery {
    fn bypass(&self) -> bool {
        self.no_cache.as_deref() == Some("1")
    }
}

/// Serve the merged article list, from cache while fresh. The response is
/// marked non-cacheable for intermediaries; only the process-local cache
/// applies.
async fn get_news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    if !q.bypass() {
        if let Some(cached) = state.cache.get() {
            counter!("news_cache_hits_total").increment(1);
            return news_response(cached.as_ref().clone());
        }
    }

    counter!("news_cache_misses_total").increment(1);
    let fresh = state
        .pipeline
        .aggregate(Utc::now(), AggregatePolicy::serving())
        .await;
    let stored = state.cache.put(fresh);
    news_response(stored.as_ref().clone())
}

fn news_response(articles: Vec<Article>) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(articles),
    )
        .into_response()
}

/// Periodic-job variant: same aggregation (notifying policy), plus the
/// email side effect. The array it returns carries no descriptions.
#[derive(serde::Serialize)]
struct NotifiedArticle {
    title: String,
    link: String,
    date: DateTime<Utc>,
    source: String,
}

async fn run_notify_job(State(state): State<AppState>) -> Response {
    let Some(gate) = state.gate.as_ref() else {
        return error_response("email transport not configured");
    };

    let articles = state
        .pipeline
        .aggregate(Utc::now(), AggregatePolicy::notifying())
        .await;

    if let Err(e) = gate.notify(&articles).await {
        tracing::error!(error = %e, "notify job failed");
        return error_response(&e.to_string());
    }

    let out: Vec<NotifiedArticle> = articles
        .into_iter()
        .map(|a| NotifiedArticle {
            title: a.title,
            link: a.link,
            date: a.date,
            source: a.source,
        })
        .collect();
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(out),
    )
        .into_response()
}

fn error_response(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": msg })),
    )
        .into_response()
}
