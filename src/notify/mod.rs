// src/notify/mod.rs
//! Notification gate: emails only articles whose links have never been
//! notified before, persisting the notified-link set between runs.

pub mod email;

use anyhow::Result;
use metrics::counter;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ingest::types::Article;

pub const DEFAULT_STORE_PATH: &str = "notified_links.json";

/// Outbound mail seam, so tests can observe sends and inject failures.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_html(&self, subject: &str, html_body: &str) -> Result<()>;
}

/// Durable set of already-notified links: a JSON string array on disk.
/// Reads and writes are best-effort, never fatal to the job.
pub struct NotifiedStore {
    path: PathBuf,
}

impl NotifiedStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// A missing or unreadable file is treated as "no prior state". That
    /// direction may re-notify already-sent articles, never lose any.
    pub fn load(&self) -> BTreeSet<String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "notified store unreadable");
                return BTreeSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(links) => links.into_iter().collect(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "notified store corrupt");
                BTreeSet::new()
            }
        }
    }

    /// Replaces the persisted state. A write failure is logged and
    /// swallowed; the next run will at worst re-notify.
    pub fn save(&self, links: &BTreeSet<String>) {
        let body = match serde_json::to_string_pretty(&links.iter().collect::<Vec<_>>()) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "notified store serialization failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, body) {
            tracing::warn!(path = %self.path.display(), error = %e, "notified store write failed");
        }
    }
}

/// Compares the latest aggregate against the persisted link set and sends
/// one digest for the unseen subset.
pub struct NotificationGate {
    store: NotifiedStore,
    transport: Arc<dyn MailTransport>,
}

impl NotificationGate {
    pub fn new(store: NotifiedStore, transport: Arc<dyn MailTransport>) -> Self {
        Self { store, transport }
    }

    /// Returns how many articles were newly notified. A send failure
    /// propagates and leaves the persisted set untouched, so a retried run
    /// re-attempts the same articles (at-least-once semantics).
    pub async fn notify(&self, articles: &[Article]) -> Result<usize> {
        let mut seen = self.store.load();
        let fresh: Vec<&Article> = articles
            .iter()
            .filter(|a| !seen.contains(&a.link))
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        let subject = format!("Security news digest: {} new article(s)", fresh.len());
        let html = render_digest(&fresh);
        self.transport.send_html(&subject, &html).await?;

        seen.extend(fresh.iter().map(|a| a.link.clone()));
        self.store.save(&seen);

        counter!("notify_articles_total").increment(fresh.len() as u64);
        counter!("notify_emails_sent_total").increment(1);
        tracing::info!(sent = fresh.len(), "digest sent");
        Ok(fresh.len())
    }
}

/// One HTML message for the whole batch, never one email per article.
fn render_digest(articles: &[&Article]) -> String {
    let mut html = String::from("<h2>New security news</h2>\n<ul>\n");
    for a in articles {
        html.push_str(&format!(
            "  <li><a href=\"{}\">{}</a> &mdash; {} ({})</li>\n",
            html_escape::encode_double_quoted_attribute(&a.link),
            html_escape::encode_text(&a.title),
            html_escape::encode_text(&a.source),
            a.date.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    html.push_str("</ul>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(title: &str, link: &str) -> Article {
        Article {
            title: title.into(),
            link: link.into(),
            date: Utc::now(),
            source: "Wired".into(),
            description: None,
        }
    }

    #[test]
    fn store_roundtrip_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = NotifiedStore::new(dir.path().join("notified.json"));
        assert!(store.load().is_empty());

        let mut links = BTreeSet::new();
        links.insert("https://a".to_string());
        links.insert("https://b".to_string());
        store.save(&links);
        assert_eq!(store.load(), links);

        std::fs::write(dir.path().join("notified.json"), "{ not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn digest_escapes_links_inside_the_href_attribute() {
        let a = article(
            "Feed story",
            "https://example.test/feed/?best-topics=technology&q=\"rss\"",
        );
        let html = render_digest(&[&a]);
        assert!(html.contains("href=\"https://example.test/feed/?best-topics=technology&amp;q=&quot;rss&quot;\""));
        assert!(!html.contains("q=\"rss\""));
    }

    #[test]
    fn digest_contains_link_title_source_timestamp() {
        let a = article("Big <breach>", "https://example.test/breach");
        let html = render_digest(&[&a]);
        assert!(html.contains("https://example.test/breach"));
        assert!(html.contains("Big &lt;breach&gt;"));
        assert!(html.contains("Wired"));
        assert!(html.contains("UTC"));
    }
}
