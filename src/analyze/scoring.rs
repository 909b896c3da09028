//! Composite scoring and ranking of fetched items.
//!
//! Four normalized signals in [0,100]:
//! - `relevance`   : query-word overlap with the item's searchable text
//! - `engagement`  : source-specific interaction proxy
//! - `recency`     : linear decay over age in hours
//! - `credibility` : source-specific authority proxy
//!
//! Composite = weighted sum under `ScoreWeights`, rounded to 2 decimals.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::sources::types::{ContentItem, ItemDetails};

/// Channels whose videos get the authority credibility boost. Matched by
/// containment against the lowercased channel name.
const AUTHORITY_CHANNELS: [&str; 6] = [
    "ted",
    "ted-ed",
    "veritasium",
    "kurzgesagt",
    "vsauce",
    "national geographic",
];

/// Age assumed when a source reports no timestamp at all.
const STALE_AGE_HOURS: f64 = 720.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub relevance: f64,
    pub engagement: f64,
    pub recency: f64,
    pub credibility: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            relevance: 0.40,
            engagement: 0.30,
            recency: 0.20,
            credibility: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub engagement: f64,
    pub recency: f64,
    pub credibility: f64,
}

/// An item annotated with its composite score; the item itself stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub composite_score: f64,
    pub score_breakdown: ScoreBreakdown,
}

fn clamp100(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Fraction of the query's distinct lowercase words found in the item text,
/// scaled to 100, +20 (capped) when the whole phrase appears verbatim.
pub fn relevance_score(item: &ContentItem, topic: &str) -> f64 {
    let topic_lower = topic.to_lowercase();
    let topic_words: HashSet<&str> = topic_lower.split_whitespace().collect();
    let text = item.searchable_text();

    let matches = topic_words.iter().filter(|w| text.contains(*w)).count();
    let mut relevance = (matches as f64 / topic_words.len().max(1) as f64) * 100.0;

    if text.contains(&topic_lower) {
        relevance = (relevance + 20.0).min(100.0);
    }
    relevance.min(100.0)
}

pub fn engagement_score(item: &ContentItem) -> f64 {
    match &item.details {
        ItemDetails::Discussion(d) => {
            if let Some(pre) = d.engagement_score {
                return clamp100(pre);
            }
            clamp100(d.score as f64 * 0.4 + d.num_replies as f64 * 0.6)
        }
        ItemDetails::Video(v) => {
            if let Some(ratio) = v.engagement_ratio {
                return clamp100(ratio * 10.0);
            }
            match v.views.unwrap_or(0) {
                n if n > 1_000_000 => 100.0,
                n if n > 100_000 => 75.0,
                n if n > 10_000 => 50.0,
                _ => 25.0,
            }
        }
        ItemDetails::Article(a) => clamp100(a.credibility.unwrap_or(0.5) * 100.0),
    }
}

pub fn recency_score(item: &ContentItem) -> f64 {
    if let Some(age) = item.age_hours {
        return (100.0 - age / 24.0).max(0.0);
    }
    // Unknown age: per-kind proxies.
    match &item.details {
        ItemDetails::Video(_) if item.published_at.is_some() => 75.0,
        ItemDetails::Video(_) => 50.0,
        ItemDetails::Discussion(_) => (100.0 - STALE_AGE_HOURS / 24.0).max(0.0),
        ItemDetails::Article(_) => 50.0,
    }
}

pub fn credibility_score(item: &ContentItem) -> f64 {
    match &item.details {
        ItemDetails::Discussion(d) => clamp100(d.approval_ratio.unwrap_or(0.5) * 100.0),
        ItemDetails::Video(_) => {
            let channel = item.author.to_lowercase();
            if AUTHORITY_CHANNELS.iter().any(|c| channel.contains(c)) {
                90.0
            } else {
                70.0
            }
        }
        ItemDetails::Article(a) => match a.credibility {
            Some(c) => clamp100(c * 100.0),
            None => 50.0,
        },
    }
}

/// Compute the composite score and its rounded breakdown for one item.
pub fn composite_score(
    item: &ContentItem,
    topic: &str,
    weights: &ScoreWeights,
) -> (f64, ScoreBreakdown) {
    let relevance = relevance_score(item, topic);
    let engagement = engagement_score(item);
    let recency = recency_score(item);
    let credibility = credibility_score(item);

    let composite = relevance * weights.relevance
        + engagement * weights.engagement
        + recency * weights.recency
        + credibility * weights.credibility;

    (
        round2(composite),
        ScoreBreakdown {
            relevance: round2(relevance),
            engagement: round2(engagement),
            recency: round2(recency),
            credibility: round2(credibility),
        },
    )
}

/// Score, stable-sort descending and truncate to `top_n`. Ties keep the
/// incoming order.
pub fn rank_items(
    items: Vec<ContentItem>,
    topic: &str,
    weights: &ScoreWeights,
    top_n: usize,
) -> Vec<ScoredItem> {
    let mut scored: Vec<ScoredItem> = items
        .into_iter()
        .map(|item| {
            let (composite, breakdown) = composite_score(&item, topic, weights);
            ScoredItem {
                item,
                composite_score: composite,
                score_breakdown: breakdown,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_n);
    scored
}
