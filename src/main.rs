//! Security-news aggregator — binary entrypoint.
//! Boots the Axum HTTP server, wiring the feed pipeline, query cache,
//! notification gate, and the periodic digest scheduler.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use secnews_aggregator::api::{create_router, AppState};
use secnews_aggregator::cache::{NewsCache, DEFAULT_TTL};
use secnews_aggregator::ingest::config::load_sources_default;
use secnews_aggregator::ingest::scheduler::{
    spawn_notify_scheduler, NotifySchedulerCfg, DEFAULT_NOTIFY_INTERVAL_SECS,
};
use secnews_aggregator::ingest::FeedAggregator;
use secnews_aggregator::metrics::Metrics;
use secnews_aggregator::notify::email::SmtpMailer;
use secnews_aggregator::notify::{NotificationGate, NotifiedStore, DEFAULT_STORE_PATH};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - NEWS_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("NEWS_DEV_LOG").ok().is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("secnews=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let sources = match load_sources_default() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "sources config unusable, using built-in registry");
            secnews_aggregator::ingest::config::builtin_sources()
        }
    };
    tracing::info!(sources = sources.len(), "feed registry loaded");

    let ttl = Duration::from_secs(env_u64("NEWS_CACHE_TTL_SECS", DEFAULT_TTL.as_secs()));
    let window_days = env_u64("NEWS_WINDOW_DAYS", 14) as i64;

    let pipeline: Arc<dyn secnews_aggregator::NewsPipeline> =
        Arc::new(FeedAggregator::new(sources).with_window_days(window_days));
    let cache = Arc::new(NewsCache::new(ttl));

    // The gate (and its scheduler) only exists when SMTP is configured;
    // the read path stays up either way.
    let gate = match SmtpMailer::from_env() {
        Ok(mailer) => {
            let store_path = std::env::var("NOTIFIED_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string());
            Some(Arc::new(NotificationGate::new(
                NotifiedStore::new(store_path),
                Arc::new(mailer),
            )))
        }
        Err(e) => {
            tracing::warn!(error = %e, "SMTP not configured, digest notifications disabled");
            None
        }
    };

    if let Some(g) = &gate {
        let cfg = NotifySchedulerCfg {
            interval_secs: env_u64("NOTIFY_INTERVAL_SECS", DEFAULT_NOTIFY_INTERVAL_SECS),
        };
        spawn_notify_scheduler(Arc::clone(&pipeline), Arc::clone(g), cfg);
    }

    let metrics = Metrics::init(ttl.as_secs());
    let state = AppState {
        pipeline,
        cache,
        gate,
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
