// src/ingest/mod.rs
pub mod config;
pub mod fetch;
pub mod parse;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::ingest::fetch::FeedFetcher;
use crate::ingest::types::{
    AggregatePolicy, Article, DedupKey, MissingDatePolicy, NewsPipeline, RawItem, Source, NO_LINK,
    UNTITLED,
};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items parsed from feed documents.");
        describe_counter!(
            "ingest_articles_kept_total",
            "Articles kept after normalization, dedup, and window filtering."
        );
        describe_counter!(
            "ingest_dedup_removed_total",
            "Articles removed as cross-source duplicates."
        );
        describe_counter!(
            "ingest_window_removed_total",
            "Articles removed by the trailing-window filter."
        );
        describe_counter!(
            "ingest_fallback_recovered_total",
            "Sources recovered by the raw-fetch fallback attempt."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Sources that failed both fetch attempts."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the aggregation pipeline last ran."
        );
    });
}

/// Parse one date candidate into UTC. Feeds disagree wildly here: RFC 3339
/// (Atom), RFC 2822 (RSS pubDate), and a few bare calendar shapes.
pub fn parse_date_candidate(s: &str) -> Option<DateTime<Utc>> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Resolve the item date from the candidate fields, in fixed priority
/// order: isoDate, pubDate, published, updated, date.
pub fn resolve_date(raw: &RawItem) -> Option<DateTime<Utc>> {
    [
        raw.iso_date.as_deref(),
        raw.pub_date.as_deref(),
        raw.published.as_deref(),
        raw.updated.as_deref(),
        raw.date.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(parse_date_candidate)
}

/// Reduce a description candidate to a plain-text excerpt: decode HTML
/// entities, strip tags, collapse whitespace, cap at 500 chars.
pub fn plain_excerpt(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Normalize one raw entry into a canonical `Article`, or `None` when the
/// policy drops undated items and no date candidate parses.
pub fn normalize(
    raw: &RawItem,
    source_name: &str,
    now: DateTime<Utc>,
    policy: MissingDatePolicy,
) -> Option<Article> {
    let date = match resolve_date(raw) {
        Some(d) => d,
        None => match policy {
            MissingDatePolicy::Drop => return None,
            MissingDatePolicy::AssumeNow => now,
        },
    };

    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let link = [raw.link.as_deref(), raw.guid.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(NO_LINK)
        .to_string();

    let description = [
        raw.content_snippet.as_deref(),
        raw.summary.as_deref(),
        raw.content.as_deref(),
        raw.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(plain_excerpt)
    .find(|d| !d.is_empty());

    Some(Article {
        title,
        link,
        date,
        source: source_name.to_string(),
        description,
    })
}

pub fn normalize_items(
    raw: Vec<RawItem>,
    source_name: &str,
    now: DateTime<Utc>,
    policy: AggregatePolicy,
) -> Vec<Article> {
    raw.iter()
        .filter_map(|it| normalize(it, source_name, now, policy.missing_date))
        .collect()
}

/// First occurrence per dedup key wins; later duplicates are discarded.
pub fn dedupe_articles(articles: Vec<Article>, key: DedupKey) -> Vec<Article> {
    let mut seen: HashSet<String> = HashSet::with_capacity(articles.len());
    let mut out = Vec::with_capacity(articles.len());
    let mut removed = 0u64;
    for a in articles {
        if seen.insert(a.dedup_key(key)) {
            out.push(a);
        } else {
            removed += 1;
        }
    }
    counter!("ingest_dedup_removed_total").increment(removed);
    out
}

/// Inclusive trailing window [now - window, now]. Future-dated items are
/// excluded by the upper bound.
pub fn window_filter(
    articles: Vec<Article>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Vec<Article> {
    let cutoff = now - window;
    let before = articles.len();
    let out: Vec<Article> = articles
        .into_iter()
        .filter(|a| a.date >= cutoff && a.date <= now)
        .collect();
    counter!("ingest_window_removed_total").increment((before - out.len()) as u64);
    out
}

/// The production pipeline: every registry source fetched concurrently,
/// merged in registry order, deduped, sorted newest-first, window-filtered.
pub struct FeedAggregator {
    fetcher: FeedFetcher,
    sources: Vec<Source>,
    window: chrono::Duration,
}

impl FeedAggregator {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            fetcher: FeedFetcher::new(),
            sources,
            window: chrono::Duration::days(14),
        }
    }

    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window = chrono::Duration::days(days);
        self
    }
}

#[async_trait::async_trait]
impl NewsPipeline for FeedAggregator {
    async fn aggregate(&self, now: DateTime<Utc>, policy: AggregatePolicy) -> Vec<Article> {
        ensure_metrics_described();

        // One task per source; results are collected in registry order so
        // dedup and tie-breaking stay deterministic.
        let mut handles = Vec::with_capacity(self.sources.len());
        for src in self.sources.iter().cloned() {
            let fetcher = self.fetcher.clone();
            handles.push(tokio::spawn(async move {
                fetcher.fetch_source(&src, now, policy).await
            }));
        }

        let mut merged = Vec::new();
        for h in handles {
            match h.await {
                Ok(items) => merged.extend(items),
                Err(e) => tracing::warn!(error = ?e, "source fetch task panicked"),
            }
        }

        let mut articles = dedupe_articles(merged, policy.dedup_key);
        articles.sort_by(|a, b| b.date.cmp(&a.date)); // stable: ties keep discovery order
        let out = window_filter(articles, now, self.window);

        counter!("ingest_articles_kept_total").increment(out.len() as u64);
        gauge!("ingest_last_run_ts").set(now.timestamp().max(0) as f64);
        out
    }
}
