// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// One feed endpoint from the source registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String, // e.g., "The Hacker News"
    pub url: String,
}

impl Source {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// Canonical article record. Immutable once built; `date` is always set
/// (items without a usable date are handled by `MissingDatePolicy` before
/// an `Article` exists).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub date: DateTime<Utc>, // serialized as ISO-8601 UTC
    pub source: String,      // registry name, not the raw feed title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub const UNTITLED: &str = "(untitled)";
pub const NO_LINK: &str = "#";

impl Article {
    /// Key used for cross-source deduplication.
    pub fn dedup_key(&self, strategy: DedupKey) -> String {
        match strategy {
            DedupKey::LinkOnly => self.link.clone(),
            DedupKey::LinkOrSourceTitle => {
                if self.link.is_empty() || self.link == NO_LINK {
                    format!("{}:{}", self.source, self.title)
                } else {
                    self.link.clone()
                }
            }
        }
    }
}

/// Raw feed entry, reduced to the closed set of fields the normalizer
/// consumes. Feed dialects fill different subsets of these.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    // Date candidates, in normalizer priority order.
    pub iso_date: Option<String>,
    pub pub_date: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub date: Option<String>,
    // Description candidates, in normalizer priority order.
    pub content_snippet: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
}

/// What to do with an item whose date candidates all fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDatePolicy {
    /// Drop the item before it reaches the aggregate.
    Drop,
    /// Stamp the item with the aggregation time.
    AssumeNow,
}

/// Which string identifies a duplicate across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey {
    /// `link`, falling back to `source:title` when the link is the sentinel.
    LinkOrSourceTitle,
    /// `link` verbatim, sentinel or not.
    LinkOnly,
}

/// Pipeline policy. The request-serving path and the notification path
/// historically diverged on these two knobs; both variants are explicit
/// here and share all other pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatePolicy {
    pub missing_date: MissingDatePolicy,
    pub dedup_key: DedupKey,
}

impl AggregatePolicy {
    /// Policy for `GET /api/news`: undated items are dropped, dedup falls
    /// back to a synthetic source:title key.
    pub fn serving() -> Self {
        Self {
            missing_date: MissingDatePolicy::Drop,
            dedup_key: DedupKey::LinkOrSourceTitle,
        }
    }

    /// Policy for the periodic email job: undated items are stamped with
    /// the run time, dedup is by link only.
    pub fn notifying() -> Self {
        Self {
            missing_date: MissingDatePolicy::AssumeNow,
            dedup_key: DedupKey::LinkOnly,
        }
    }
}

/// Seam between the HTTP/notify layers and the feed pipeline, so tests can
/// substitute a counting or canned implementation.
#[async_trait::async_trait]
pub trait NewsPipeline: Send + Sync {
    /// Full aggregation pass: fetch every source, merge, dedupe, sort,
    /// window-filter. Never fails; broken sources degrade to nothing.
    async fn aggregate(&self, now: DateTime<Utc>, policy: AggregatePolicy) -> Vec<Article>;
}
