// src/ingest/config.rs
//! Source registry: a static table of {name, url} pairs, optionally
//! overridden by a config file. No dynamic registration at runtime.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::Source;

const ENV_PATH: &str = "NEWS_SOURCES_PATH";

/// The built-in registry of security/news feeds.
pub fn builtin_sources() -> Vec<Source> {
    vec![
        Source::new("The Hacker News", "https://thehackernews.com/feeds/posts/default"),
        Source::new("SecurityWeek", "https://feeds.feedburner.com/securityweek"),
        Source::new("Wired", "https://www.wired.com/feed/rss"),
        Source::new("BleepingComputer", "https://www.bleepingcomputer.com/feed/"),
        Source::new("SC Magazine", "https://www.scmagazine.com/rss-feeds"),
        Source::new("News4Hackers", "https://www.news4hackers.com/feed/"),
        Source::new("CSO Online", "https://www.csoonline.com/index.rss"),
        Source::new("Krebs on Security", "https://krebsonsecurity.com/feed/"),
        Source::new("Dark Reading", "https://www.darkreading.com/rss.xml"),
        Source::new("CyberScoop", "https://www.cyberscoop.com/feed/"),
        Source::new("CISA", "https://www.cisa.gov/cybersecurity-advisories.xml"),
        Source::new("SANS Internet Storm Center", "https://isc.sans.edu/rssfeed.xml"),
        Source::new("Infosecurity Magazine", "https://www.infosecurity-magazine.com/rss/news/"),
        Source::new("Ars Technica", "https://arstechnica.com/feed/"),
        Source::new("Malwarebytes", "https://blog.malwarebytes.com/feed/"),
        Source::new("Cyber Crime Magazine", "https://cybercrimemagazine.com/feed/"),
        Source::new("Reuters", "https://www.reutersagency.com/feed/?best-topics=technology"),
        Source::new(
            "National Cyber Security Centre (UK)",
            "https://www.ncsc.gov.uk/api/1/services/v1/news-rss-feed.xml",
        ),
        Source::new("Sophos News", "https://news.sophos.com/en-us/feed/"),
        Source::new("NATO", "https://www.nato.int/cps/en/natolive/news_rss.htm"),
    ]
}

/// Load the registry from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load the registry using env var + fallbacks:
/// 1) $NEWS_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in table
pub fn load_sources_default() -> Result<Vec<Source>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("NEWS_SOURCES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(builtin_sources())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    struct TomlRegistry {
        sources: Vec<Source>,
    }
    let v: TomlRegistry = toml::from_str(s)?;
    clean_list(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    let v: Vec<Source> = serde_json::from_str(s)?;
    clean_list(v)
}

/// Trim entries, drop blanks, reject an empty registry from a file (an
/// explicitly configured empty list is almost certainly a mistake).
fn clean_list(items: Vec<Source>) -> Result<Vec<Source>> {
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let name = it.name.trim();
        let url = it.url.trim();
        if name.is_empty() || url.is_empty() {
            continue;
        }
        out.push(Source::new(name, url));
    }
    if out.is_empty() {
        return Err(anyhow!("sources file contains no usable entries"));
    }
    Ok(out)
}
