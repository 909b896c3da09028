//! Keyword-lexicon sentiment over a source's ranked items.
//!
//! Cues are matched by containment in the combined lowercased title+body
//! text, so a stem like "disappoint" also catches "disappointed". Each cue
//! counts at most once per report.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::sources::types::ContentItem;

#[derive(Deserialize)]
struct Lexicon {
    positive: Vec<String>,
    negative: Vec<String>,
    neutral: Vec<String>,
}

static LEXICON: Lazy<Lexicon> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<Lexicon>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Mixed,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Mixed => "mixed",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub label: SentimentLabel,
    pub positive_signals: usize,
    pub negative_signals: usize,
    pub neutral_signals: usize,
    pub confidence: ConfidenceBand,
}

impl SentimentReport {
    fn empty() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            positive_signals: 0,
            negative_signals: 0,
            neutral_signals: 0,
            confidence: ConfidenceBand::Low,
        }
    }
}

/// Analyze the combined title+body text of a set of items.
pub fn analyze<'a>(items: impl IntoIterator<Item = &'a ContentItem>) -> SentimentReport {
    let mut text = String::new();
    for item in items {
        text.push_str(&item.title);
        text.push(' ');
        text.push_str(&item.body);
        text.push(' ');
    }
    analyze_text(&text)
}

/// Analyze a ready-made text blob.
pub fn analyze_text(text: &str) -> SentimentReport {
    let text = text.to_lowercase();
    if text.trim().is_empty() {
        return SentimentReport::empty();
    }

    let count = |cues: &[String]| cues.iter().filter(|cue| text.contains(cue.as_str())).count();
    let positive = count(&LEXICON.positive);
    let negative = count(&LEXICON.negative);
    let neutral = count(&LEXICON.neutral);

    let total = positive + negative + neutral;
    let label = if total == 0 {
        SentimentLabel::Neutral
    } else if positive as f64 > negative as f64 * 1.5 {
        SentimentLabel::Positive
    } else if negative as f64 > positive as f64 * 1.5 {
        SentimentLabel::Negative
    } else if positive > 0 && negative > 0 {
        SentimentLabel::Mixed
    } else {
        SentimentLabel::Neutral
    };

    let confidence = if total > 5 {
        ConfidenceBand::High
    } else if total > 2 {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    };

    SentimentReport {
        label,
        positive_signals: positive,
        negative_signals: negative,
        neutral_signals: neutral,
        confidence,
    }
}

/// Most frequent label across per-source reports; ties resolve to the label
/// seen first. Drives the overall line of the deterministic summary.
pub fn dominant_label(labels: &[SentimentLabel]) -> SentimentLabel {
    let mut best = SentimentLabel::Neutral;
    let mut best_count = 0usize;
    for candidate in labels {
        let count = labels.iter().filter(|l| *l == candidate).count();
        if count > best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}
