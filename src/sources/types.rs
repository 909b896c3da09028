// src/sources/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three content-source kinds the pipeline aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Discussion,
    Video,
    Article,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Discussion, SourceKind::Video, SourceKind::Article];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Discussion => "discussion",
            SourceKind::Video => "video",
            SourceKind::Article => "article",
        }
    }

    /// Tolerant parse for analyzer output and config values.
    pub fn parse(s: &str) -> Option<SourceKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discussion" | "discussions" | "forum" | "reddit" => Some(SourceKind::Discussion),
            "video" | "videos" | "youtube" => Some(SourceKind::Video),
            "article" | "articles" | "news" | "google_news" => Some(SourceKind::Article),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top reply attached to a discussion item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub score: i64,
    pub author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscussionFields {
    pub community: String,
    pub score: i64,
    pub num_replies: i64,
    /// Fraction of positive votes in [0,1] when the source exposes it.
    pub approval_ratio: Option<f64>,
    /// Pre-combined engagement metric computed by the connector, 0..100-ish.
    pub engagement_score: Option<f64>,
    #[serde(default)]
    pub top_replies: Vec<Reply>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoFields {
    pub views: Option<u64>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    /// (likes + comments) / views × 100, precomputed by the connector.
    pub engagement_ratio: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleFields {
    #[serde(default)]
    pub keywords: Vec<String>,
    pub is_major_outlet: bool,
    /// Outlet credibility in [0,1] when the connector grades it.
    pub credibility: Option<f64>,
}

/// Source-specific payload; the tag doubles as the item's `SourceKind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemDetails {
    Discussion(DiscussionFields),
    Video(VideoFields),
    Article(ArticleFields),
}

/// One fetched piece of content. Immutable once built; scoring annotates a
/// wrapper instead of mutating the item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    /// Short body or description, already trimmed by the connector.
    pub body: String,
    pub url: String,
    /// Author, channel or outlet name depending on the kind.
    pub author: String,
    /// Hours since publication, when the connector could compute it.
    pub age_hours: Option<f64>,
    pub published_at: Option<DateTime<Utc>>,
    pub details: ItemDetails,
}

impl ContentItem {
    pub fn kind(&self) -> SourceKind {
        match self.details {
            ItemDetails::Discussion(_) => SourceKind::Discussion,
            ItemDetails::Video(_) => SourceKind::Video,
            ItemDetails::Article(_) => SourceKind::Article,
        }
    }

    /// Lowercased text the relevance scorer matches against: title, body and
    /// video tags. Article keywords are derived from the title text upstream
    /// and stay out of the match corpus.
    pub fn searchable_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.body);
        if let ItemDetails::Video(v) = &self.details {
            for t in &v.tags {
                text.push(' ');
                text.push_str(t);
            }
        }
        text.to_lowercase()
    }

    /// Explicit tags/keywords carried by the item, if any.
    pub fn explicit_keywords(&self) -> &[String] {
        match &self.details {
            ItemDetails::Video(v) => &v.tags,
            ItemDetails::Article(a) => &a.keywords,
            ItemDetails::Discussion(_) => &[],
        }
    }
}

/// Boundary contract for one upstream content source. Connectors live behind
/// this trait; a fetch error is captured per source by the aggregator and
/// never aborts the other sources.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self, topic: &str, limit: usize) -> Result<Vec<ContentItem>>;
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &'static str;
}

/// In-memory provider used by tests and offline wiring.
pub struct StaticSource {
    kind: SourceKind,
    name: &'static str,
    items: Vec<ContentItem>,
}

impl StaticSource {
    pub fn new(kind: SourceKind, name: &'static str, items: Vec<ContentItem>) -> Self {
        Self { kind, name, items }
    }
}

#[async_trait::async_trait]
impl SourceProvider for StaticSource {
    async fn fetch(&self, _topic: &str, limit: usize) -> Result<Vec<ContentItem>> {
        Ok(self.items.iter().take(limit).cloned().collect())
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
