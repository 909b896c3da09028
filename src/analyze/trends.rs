//! Trend classification over one source's ranked items.
//!
//! The rule table runs top to bottom, first match wins. Thresholds carry the
//! historical 70/40 calibration as defaults and can be overridden from the
//! analysis config file.

use serde::{Deserialize, Serialize};

use crate::analyze::scoring::{ScoreBreakdown, ScoredItem};
use crate::sources::types::{ItemDetails, SourceKind};

const EMERGING_CAP: usize = 5;
const GAINING_CAP: usize = 5;
const LOSING_CAP: usize = 3;
const STABLE_CAP: usize = 5;
const UNIQUE_CAP: usize = 5;
const TITLE_CAP: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendThresholds {
    /// Above this a signal counts as high.
    pub high: f64,
    /// Above this a signal counts as moderate.
    pub moderate: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            high: 70.0,
            moderate: 40.0,
        }
    }
}

/// Primary, mutually exclusive classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBucket {
    Emerging,
    GainingTraction,
    Stable,
    LosingTraction,
}

/// First-match rule table over the rounded breakdown.
pub fn classify(breakdown: &ScoreBreakdown, t: &TrendThresholds) -> TrendBucket {
    let recency = breakdown.recency;
    let engagement = breakdown.engagement;

    if recency >= t.high && engagement >= t.high {
        TrendBucket::GainingTraction
    } else if recency >= t.high && engagement >= t.moderate {
        TrendBucket::Emerging
    } else if engagement >= t.high && recency >= t.moderate {
        TrendBucket::Stable
    } else if engagement < t.moderate && recency < t.moderate {
        TrendBucket::LosingTraction
    } else if recency >= t.high && engagement < t.moderate {
        TrendBucket::Emerging
    } else {
        TrendBucket::Stable
    }
}

/// Secondary, non-exclusive flag: strongly on-topic yet below the engagement
/// mainstream.
pub fn is_unique_angle(breakdown: &ScoreBreakdown, t: &TrendThresholds) -> bool {
    breakdown.relevance >= t.high && breakdown.engagement < t.high
}

/// Source-specific metrics carried along for display; absent fields are
/// omitted from serialized output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendDescriptor {
    pub title: String,
    pub engagement_score: f64,
    pub recency_score: f64,
    pub composite_score: f64,
    pub source: SourceKind,
    #[serde(flatten)]
    pub metrics: TrendMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueAngle {
    pub title: String,
    pub relevance_score: f64,
    pub engagement_score: f64,
    pub source: SourceKind,
    pub insight: String,
}

/// Bucketed trends for one source, already sorted and truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendReport {
    pub emerging_trends: Vec<TrendDescriptor>,
    pub gaining_traction: Vec<TrendDescriptor>,
    pub losing_traction: Vec<TrendDescriptor>,
    pub stable_trends: Vec<TrendDescriptor>,
    pub unique_angles: Vec<UniqueAngle>,
}

const UNIQUE_INSIGHT: &str = "High relevance but niche engagement - unique perspective";

fn truncate_title(title: &str) -> String {
    title.chars().take(TITLE_CAP).collect()
}

fn descriptor(scored: &ScoredItem) -> TrendDescriptor {
    let mut metrics = TrendMetrics::default();
    match &scored.item.details {
        ItemDetails::Discussion(d) => {
            metrics.score = Some(d.score);
            metrics.replies = Some(d.num_replies);
            metrics.age_hours = Some(scored.item.age_hours.unwrap_or(0.0));
        }
        ItemDetails::Video(v) => {
            metrics.views = Some(v.views.unwrap_or(0));
            metrics.engagement_ratio = Some(v.engagement_ratio.unwrap_or(0.0));
        }
        ItemDetails::Article(_) => {
            metrics.outlet = Some(scored.item.author.clone());
            metrics.age_hours = Some(scored.item.age_hours.unwrap_or(0.0));
        }
    }

    TrendDescriptor {
        title: truncate_title(&scored.item.title),
        engagement_score: scored.score_breakdown.engagement,
        recency_score: scored.score_breakdown.recency,
        composite_score: scored.composite_score,
        source: scored.item.kind(),
        metrics,
    }
}

fn sort_desc_by<F: Fn(&TrendDescriptor) -> f64>(items: &mut [TrendDescriptor], key: F) {
    items.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Classify a ranked item list into trend buckets.
pub fn detect_trends(items: &[ScoredItem], thresholds: &TrendThresholds) -> TrendReport {
    let mut report = TrendReport::default();
    if items.is_empty() {
        return report;
    }

    for scored in items {
        let d = descriptor(scored);
        match classify(&scored.score_breakdown, thresholds) {
            TrendBucket::GainingTraction => report.gaining_traction.push(d),
            TrendBucket::Emerging => report.emerging_trends.push(d),
            TrendBucket::Stable => report.stable_trends.push(d),
            TrendBucket::LosingTraction => report.losing_traction.push(d),
        }
    }

    for scored in items {
        if is_unique_angle(&scored.score_breakdown, thresholds) {
            report.unique_angles.push(UniqueAngle {
                title: truncate_title(&scored.item.title),
                relevance_score: scored.score_breakdown.relevance,
                engagement_score: scored.score_breakdown.engagement,
                source: scored.item.kind(),
                insight: UNIQUE_INSIGHT.to_string(),
            });
        }
    }

    sort_desc_by(&mut report.emerging_trends, |d| d.recency_score);
    report.emerging_trends.truncate(EMERGING_CAP);

    sort_desc_by(&mut report.gaining_traction, |d| d.composite_score);
    report.gaining_traction.truncate(GAINING_CAP);

    // Oldest first.
    report.losing_traction.sort_by(|a, b| {
        a.recency_score
            .partial_cmp(&b.recency_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    report.losing_traction.truncate(LOSING_CAP);

    sort_desc_by(&mut report.stable_trends, |d| d.composite_score);
    report.stable_trends.truncate(STABLE_CAP);

    report.unique_angles.truncate(UNIQUE_CAP);

    report
}
