// tests/aggregate_dedup.rs
use chrono::{TimeZone, Utc};
use secnews_aggregator::ingest::dedupe_articles;
use secnews_aggregator::ingest::types::{Article, DedupKey, NO_LINK};

fn article(source: &str, title: &str, link: &str) -> Article {
    Article {
        title: title.into(),
        link: link.into(),
        date: Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap(),
        source: source.into(),
        description: None,
    }
}

#[test]
fn first_occurrence_wins_across_sources() {
    let shared = "https://example.test/shared";
    let merged = vec![
        article("The Hacker News", "Breach disclosed", shared),
        article("Wired", "Other story", "https://example.test/other"),
        article("BleepingComputer", "Breach disclosed (syndicated)", shared),
    ];

    let out = dedupe_articles(merged, DedupKey::LinkOrSourceTitle);
    assert_eq!(out.len(), 2);
    // whichever occurrence came first in concatenation order survives
    assert_eq!(out[0].source, "The Hacker News");
    assert_eq!(out[0].title, "Breach disclosed");
}

#[test]
fn dedup_is_idempotent() {
    let merged = vec![
        article("A", "t1", "https://example.test/1"),
        article("B", "t2", "https://example.test/2"),
        article("A", "t1", "https://example.test/1"),
    ];
    let once = dedupe_articles(merged, DedupKey::LinkOrSourceTitle);
    let twice = dedupe_articles(once.clone(), DedupKey::LinkOrSourceTitle);
    assert_eq!(once, twice);
}

#[test]
fn sentinel_links_fall_back_to_source_title_key() {
    let merged = vec![
        article("CISA", "Advisory 1", NO_LINK),
        article("CISA", "Advisory 2", NO_LINK),
        article("CISA", "Advisory 1", NO_LINK), // true duplicate
        article("NATO", "Advisory 1", NO_LINK), // same title, other source
    ];
    let out = dedupe_articles(merged, DedupKey::LinkOrSourceTitle);
    assert_eq!(out.len(), 3);
}

#[test]
fn link_only_policy_collapses_all_sentinel_links() {
    // The notifying path keys on link verbatim: every "#" item is one key.
    let merged = vec![
        article("CISA", "Advisory 1", NO_LINK),
        article("NATO", "Advisory 2", NO_LINK),
        article("Wired", "Story", "https://example.test/story"),
    ];
    let out = dedupe_articles(merged, DedupKey::LinkOnly);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].source, "CISA");
}
