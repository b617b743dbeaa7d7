// src/ingest/fetch.rs
//! Per-source fetching with a single raw-text fallback attempt.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::time::Duration;

use crate::ingest::parse::{parse_feed, parse_feed_lenient};
use crate::ingest::types::{AggregatePolicy, Article, RawItem, Source};

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared header set. The explicit Accept ordering matters: some strict
/// servers answer 406 to requests that do not prefer a feed MIME type.
fn common_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        USER_AGENT,
        HeaderValue::from_static("secnews-aggregator/0.1 (+https://github.com/secnews)"),
    );
    h.insert(
        ACCEPT,
        HeaderValue::from_static(
            "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5",
        ),
    );
    h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    h
}

/// Fetches one source at a time; clones share the underlying reqwest pool.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch and normalize one source. Never fails outward: a source whose
    /// strict attempt and fallback attempt both fail contributes nothing
    /// to this round.
    pub async fn fetch_source(
        &self,
        source: &Source,
        now: chrono::DateTime<chrono::Utc>,
        policy: AggregatePolicy,
    ) -> Vec<Article> {
        let raw = match self.fetch_strict(&source.url).await {
            Ok(items) => items,
            Err(first_err) => match self.fetch_fallback(&source.url).await {
                Ok(items) => {
                    counter!("ingest_fallback_recovered_total").increment(1);
                    tracing::debug!(
                        source = %source.name,
                        error = %first_err,
                        "strict fetch failed, fallback recovered"
                    );
                    items
                }
                Err(second_err) => {
                    counter!("ingest_source_errors_total").increment(1);
                    tracing::warn!(
                        source = %source.name,
                        error = %second_err,
                        "source failed both attempts, contributing nothing"
                    );
                    return Vec::new();
                }
            },
        };

        crate::ingest::normalize_items(raw, &source.name, now, policy)
    }

    /// Attempt 1: GET + strict feed parse.
    async fn fetch_strict(&self, url: &str) -> Result<Vec<RawItem>> {
        let body = self.get_body(url).await?;
        parse_feed(&body)
    }

    /// Attempt 2: GET again, parse leniently (entity scrub).
    async fn fetch_fallback(&self, url: &str) -> Result<Vec<RawItem>> {
        let body = self.get_body(url).await?;
        parse_feed_lenient(&body)
    }

    async fn get_body(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .headers(common_headers())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("status {status} from {url}"));
        }
        resp.text().await.with_context(|| format!("reading body of {url}"))
    }
}
