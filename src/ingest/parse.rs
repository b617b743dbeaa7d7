// src/ingest/parse.rs
//! Feed-dialect parsing: RSS 2.0 and Atom documents into `RawItem`s.
//! Only the fields the normalizer consumes are modeled.

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::RawItem;

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    // quick-xml's serde deserializer strips namespace prefixes, so
    // <dc:date> is seen as "date".
    #[serde(rename = "date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded")]
    content_encoded: Option<String>,
}

/// `<guid isPermaLink="...">` carries its value as text content.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    id: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<Text>,
    content: Option<Text>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Atom text constructs may carry a `type` attribute; the value is text.
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text")]
    value: Option<String>,
}

impl Text {
    fn into_value(self) -> Option<String> {
        self.value
    }
}

/// Parse a feed document, RSS first, Atom second. Errors only when neither
/// dialect accepts the input.
pub fn parse_feed(xml: &str) -> Result<Vec<RawItem>> {
    let t0 = std::time::Instant::now();

    let items: Vec<RawItem> = match from_str::<Rss>(xml) {
        Ok(rss) => rss.channel.items.into_iter().map(raw_from_rss).collect(),
        Err(rss_err) => {
            // Atom deserialization is permissive (entries default to empty),
            // so require an actual <feed> root before accepting it.
            if looks_like_atom(xml) {
                let feed: AtomFeed = from_str(xml).context("parsing atom feed xml")?;
                feed.entries.into_iter().map(raw_from_atom).collect()
            } else {
                return Err(rss_err).context("parsing rss feed xml");
            }
        }
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_items_total").increment(items.len() as u64);
    Ok(items)
}

/// Lenient variant for the raw-fetch fallback path: scrub bare HTML
/// entities that strict XML parsing rejects, then parse normally.
pub fn parse_feed_lenient(xml: &str) -> Result<Vec<RawItem>> {
    parse_feed(&scrub_html_entities_for_xml(xml))
}

fn looks_like_atom(xml: &str) -> bool {
    xml.contains("<feed")
}

fn raw_from_rss(it: RssItem) -> RawItem {
    RawItem {
        title: it.title,
        link: it.link,
        guid: it.guid.and_then(|g| g.value),
        pub_date: it.pub_date,
        date: it.dc_date,
        description: it.description,
        content: it.content_encoded,
        ..RawItem::default()
    }
}

fn raw_from_atom(entry: AtomEntry) -> RawItem {
    // Prefer the alternate (or untyped) link; any link beats none.
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .and_then(|l| l.href.clone());

    RawItem {
        title: entry.title.and_then(Text::into_value),
        link,
        guid: entry.id,
        published: entry.published,
        updated: entry.updated,
        summary: entry.summary.and_then(Text::into_value),
        content: entry.content.and_then(Text::into_value),
        ..RawItem::default()
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Security Feed</title>
    <item>
      <title>Patch now</title>
      <link>https://example.test/patch-now</link>
      <guid isPermaLink="false">tag:example,2024:1</guid>
      <pubDate>Mon, 01 Jul 2024 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Critical fix.</p>]]></description>
    </item>
    <item>
      <title>Advisory</title>
      <dc:date>2024-07-02T09:30:00Z</dc:date>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom Feed</title>
  <entry>
    <title type="html">Zero-day write-up</title>
    <link rel="alternate" href="https://example.test/zero-day"/>
    <id>urn:uuid:1</id>
    <published>2024-07-03T08:00:00Z</published>
    <updated>2024-07-03T09:00:00Z</updated>
    <summary>Short summary.</summary>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_map_to_raw_fields() {
        let items = parse_feed(RSS_SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("Patch now"));
        assert_eq!(items[0].link.as_deref(), Some("https://example.test/patch-now"));
        assert_eq!(items[0].guid.as_deref(), Some("tag:example,2024:1"));
        assert_eq!(
            items[0].pub_date.as_deref(),
            Some("Mon, 01 Jul 2024 10:00:00 GMT")
        );
        assert!(items[0].description.as_deref().unwrap().contains("Critical fix"));
        // dc:date lands in the generic `date` slot
        assert_eq!(items[1].date.as_deref(), Some("2024-07-02T09:30:00Z"));
        assert!(items[1].link.is_none());
    }

    #[test]
    fn atom_entries_map_to_raw_fields() {
        let items = parse_feed(ATOM_SAMPLE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Zero-day write-up"));
        assert_eq!(items[0].link.as_deref(), Some("https://example.test/zero-day"));
        assert_eq!(items[0].guid.as_deref(), Some("urn:uuid:1"));
        assert_eq!(items[0].published.as_deref(), Some("2024-07-03T08:00:00Z"));
        assert_eq!(items[0].updated.as_deref(), Some("2024-07-03T09:00:00Z"));
        assert_eq!(items[0].summary.as_deref(), Some("Short summary."));
    }

    #[test]
    fn non_feed_input_is_an_error() {
        assert!(parse_feed("definitely not xml").is_err());
        assert!(parse_feed("<html><body>404</body></html>").is_err());
    }

    #[test]
    fn lenient_parse_accepts_bare_entities() {
        let dirty = RSS_SAMPLE.replace("Patch now", "Patch&nbsp;now &ndash; today");
        assert!(parse_feed(&dirty).is_err());
        let items = parse_feed_lenient(&dirty).unwrap();
        assert_eq!(items[0].title.as_deref(), Some("Patch now - today"));
    }
}
