// src/sources/news_rss.rs
//! Article source backed by a Google-News-style RSS search feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::sources::types::{ArticleFields, ContentItem, ItemDetails, SourceKind, SourceProvider};

pub const DEFAULT_NEWS_RSS_BASE: &str = "https://news.google.com/rss";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Signal words matched as substrings against title + description.
const COMMON_NEWS_WORDS: [&str; 7] = [
    "breaking", "update", "report", "announce", "reveal", "confirm", "deny",
];

/// Matched as substrings against the lowercased outlet name.
const MAJOR_OUTLETS: [&str; 10] = [
    "bbc",
    "cnn",
    "reuters",
    "ap",
    "the new york times",
    "washington post",
    "the guardian",
    "wall street journal",
    "bloomberg",
    "forbes",
];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<SourceTag>,
}

#[derive(Debug, Deserialize)]
struct SourceTag {
    #[serde(rename = "$text")]
    name: Option<String>,
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("valid regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Decode entities, drop markup, collapse whitespace. Headlines keep their
/// punctuation.
fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = RE_TAGS.replace_all(&decoded, "");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

/// RSS parsers reject bare HTML entities, so map the common ones first.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

enum Mode {
    Fixture(String),
    Http {
        base: String,
        client: reqwest::Client,
    },
}

pub struct NewsRssSource {
    mode: Mode,
}

impl NewsRssSource {
    pub fn from_url(base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("trend-context-analyzer/0.1")
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            mode: Mode::Http {
                base: base.into(),
                client,
            },
        }
    }

    /// Canned feed, used by tests and offline wiring. The topic argument to
    /// `fetch` is ignored in this mode.
    pub fn from_xml(xml: impl Into<String>) -> Self {
        Self {
            mode: Mode::Fixture(xml.into()),
        }
    }

    fn search_url(base: &str, topic: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}/search", base.trim_end_matches('/')))
            .context("news rss base url")?;
        url.query_pairs_mut()
            .append_pair("q", topic)
            .append_pair("hl", "en-US")
            .append_pair("gl", "US")
            .append_pair("ceid", "US:en");
        Ok(url)
    }

    fn parse_items(xml: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing news rss xml")?;
        let now = Utc::now().timestamp();

        let mut out = Vec::new();
        for entry in rss.channel.item.into_iter().take(limit) {
            let title = clean_text(entry.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let body = clean_text(entry.description.as_deref().unwrap_or_default());
            let outlet = entry
                .source
                .and_then(|tag| tag.name)
                .map(|name| clean_text(&name))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unknown".to_string());

            let published_unix = entry.pub_date.as_deref().and_then(parse_rfc2822_to_unix);
            let published_at = published_unix.and_then(|secs| DateTime::from_timestamp(secs, 0));
            let age_hours = published_unix.and_then(|secs| {
                let age = (now - secs) as f64 / 3600.0;
                if age == 0.0 {
                    None
                } else {
                    Some((age * 10.0).round() / 10.0)
                }
            });

            let haystack = format!("{} {}", title, body).to_lowercase();
            let keywords: Vec<String> = COMMON_NEWS_WORDS
                .iter()
                .filter(|word| haystack.contains(**word))
                .map(|word| word.to_string())
                .collect();
            let outlet_lower = outlet.to_lowercase();
            let is_major_outlet = MAJOR_OUTLETS
                .iter()
                .any(|major| outlet_lower.contains(major));

            out.push(ContentItem {
                title,
                body,
                url: entry.link.unwrap_or_default(),
                author: outlet,
                age_hours,
                published_at,
                details: ItemDetails::Article(ArticleFields {
                    keywords,
                    is_major_outlet,
                    credibility: Some(if is_major_outlet { 1.0 } else { 0.5 }),
                }),
            });
        }

        histogram!("source_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for NewsRssSource {
    async fn fetch(&self, topic: &str, limit: usize) -> Result<Vec<ContentItem>> {
        match &self.mode {
            Mode::Fixture(xml) => Self::parse_items(xml, limit),
            Mode::Http { base, client } => {
                let url = Self::search_url(base, topic)?;
                let response = client
                    .get(url)
                    .send()
                    .await
                    .context("news rss request")?
                    .error_for_status()
                    .context("news rss status")?;
                let body = response.text().await.context("news rss body")?;
                Self::parse_items(&body, limit)
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Article
    }

    fn name(&self) -> &'static str {
        "news_rss"
    }
}
