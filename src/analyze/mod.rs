// src/analyze/mod.rs
//! Analysis pipeline entry: ranks each source's items, extracts themes and
//! sentiment, classifies trends and correlates keywords across sources.

pub mod correlate;
pub mod scoring;
pub mod themes;
pub mod trends;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sentiment::{self, SentimentReport};
use crate::sources::types::{ContentItem, SourceKind};

// Re-export convenient types.
pub use crate::analyze::correlate::{CorrelationInsight, CorrelationReport, CorrelationScope};
pub use crate::analyze::scoring::{rank_items, ScoreBreakdown, ScoreWeights, ScoredItem};
pub use crate::analyze::themes::ThemeReport;
pub use crate::analyze::trends::{detect_trends, TrendBucket, TrendReport, TrendThresholds};

/// Tunables for one analysis run. Defaults mirror the historical calibration;
/// a `config/analysis.toml` can override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_n_per_source: usize,
    pub weights: ScoreWeights,
    pub thresholds: TrendThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n_per_source: 5,
            weights: ScoreWeights::default(),
            thresholds: TrendThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parse analysis config")
    }

    /// Load from a TOML file; a missing or broken file falls back to defaults
    /// with a warning so the service still boots.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(raw) => match Self::from_toml_str(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(error = ?e, path = %path.display(), "analysis config unreadable, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Everything the pipeline derived from one source's fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAnalysis {
    pub kind: SourceKind,
    pub ranked: Vec<ScoredItem>,
    pub themes: ThemeReport,
    pub sentiment: SentimentReport,
    pub trends: TrendReport,
}

/// Per-topic analysis bundle; pure input to the summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedAnalysis {
    pub topic: String,
    pub sources: Vec<SourceAnalysis>,
    pub correlations: CorrelationReport,
}

impl AggregatedAnalysis {
    pub fn source(&self, kind: SourceKind) -> Option<&SourceAnalysis> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    pub fn total_items(&self) -> usize {
        self.sources.iter().map(|s| s.ranked.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }
}

/// Run the full per-source pipeline and the cross-source correlation.
///
/// Sources arrive as (kind, raw items) pairs; a kind that was fetched but
/// returned nothing still gets an entry so sentiment labels stay comparable
/// across runs.
pub fn build_analysis(
    items_by_source: Vec<(SourceKind, Vec<ContentItem>)>,
    topic: &str,
    cfg: &AnalysisConfig,
) -> AggregatedAnalysis {
    let mut sources = Vec::with_capacity(items_by_source.len());

    for (kind, items) in items_by_source {
        let ranked = rank_items(items, topic, &cfg.weights, cfg.top_n_per_source);

        let themes = themes::extract(ranked.iter().map(|s| &s.item));
        let sentiment = sentiment::analyze(ranked.iter().map(|s| &s.item));
        let trends = detect_trends(&ranked, &cfg.thresholds);

        tracing::debug!(
            source = %kind,
            ranked = ranked.len(),
            keywords = themes.top_keywords.len(),
            sentiment = %sentiment.label,
            "source analyzed"
        );

        sources.push(SourceAnalysis {
            kind,
            ranked,
            themes,
            sentiment,
            trends,
        });
    }

    let keywords_for = |kind: SourceKind| -> Vec<String> {
        sources
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.themes.top_keywords.clone())
            .unwrap_or_default()
    };
    let correlations = correlate::find_correlations(
        &keywords_for(SourceKind::Discussion),
        &keywords_for(SourceKind::Video),
        &keywords_for(SourceKind::Article),
    );

    AggregatedAnalysis {
        topic: topic.to_string(),
        sources,
        correlations,
    }
}
