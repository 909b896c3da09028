//! Cross-source keyword correlation.
//!
//! Works on the per-source theme keywords. Every non-empty intersection
//! (all three, then each pair) becomes one templated insight; keywords in
//! the output are sorted so insights are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::sources::types::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CorrelationScope {
    AllSources,
    Pair { a: SourceKind, b: SourceKind },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationInsight {
    #[serde(flatten)]
    pub scope: CorrelationScope,
    pub keywords: Vec<String>,
    pub insight: String,
}

/// Correlation insights plus each source's non-overlapping keywords.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub correlations: Vec<CorrelationInsight>,
    pub unique_keywords: BTreeMap<SourceKind, Vec<String>>,
}

fn pair_insight(a: SourceKind, b: SourceKind) -> String {
    match (a, b) {
        (SourceKind::Discussion, SourceKind::Video) => {
            "Community discussions align with trending video content on these topics.".into()
        }
        (SourceKind::Discussion, SourceKind::Article) => {
            "Community discussions match recent news coverage.".into()
        }
        (SourceKind::Video, SourceKind::Article) => {
            "Video creators are covering topics that match recent news.".into()
        }
        (a, b) => format!("{a} and {b} sources overlap on these topics."),
    }
}

fn intersect(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> Vec<String> {
    a.intersection(b).map(|s| s.to_string()).collect()
}

/// Find keyword overlaps between the three sources' theme keywords.
pub fn find_correlations(
    discussion: &[String],
    video: &[String],
    article: &[String],
) -> CorrelationReport {
    let d: BTreeSet<&str> = discussion.iter().map(String::as_str).collect();
    let v: BTreeSet<&str> = video.iter().map(String::as_str).collect();
    let a: BTreeSet<&str> = article.iter().map(String::as_str).collect();

    let mut correlations = Vec::new();

    let all_common: Vec<String> = d
        .iter()
        .filter(|k| v.contains(**k) && a.contains(**k))
        .map(|s| s.to_string())
        .collect();
    if !all_common.is_empty() {
        correlations.push(CorrelationInsight {
            scope: CorrelationScope::AllSources,
            keywords: all_common,
            insight:
                "These keywords appear across all sources, indicating strong consensus on these topics."
                    .into(),
        });
    }

    let pairs = [
        (SourceKind::Discussion, SourceKind::Video, intersect(&d, &v)),
        (SourceKind::Discussion, SourceKind::Article, intersect(&d, &a)),
        (SourceKind::Video, SourceKind::Article, intersect(&v, &a)),
    ];
    for (ka, kb, keywords) in pairs {
        if !keywords.is_empty() {
            correlations.push(CorrelationInsight {
                scope: CorrelationScope::Pair { a: ka, b: kb },
                keywords,
                insight: pair_insight(ka, kb),
            });
        }
    }

    let mut unique_keywords = BTreeMap::new();
    unique_keywords.insert(
        SourceKind::Discussion,
        d.iter()
            .filter(|k| !v.contains(**k) && !a.contains(**k))
            .map(|s| s.to_string())
            .collect(),
    );
    unique_keywords.insert(
        SourceKind::Video,
        v.iter()
            .filter(|k| !d.contains(**k) && !a.contains(**k))
            .map(|s| s.to_string())
            .collect(),
    );
    unique_keywords.insert(
        SourceKind::Article,
        a.iter()
            .filter(|k| !d.contains(**k) && !v.contains(**k))
            .map(|s| s.to_string())
            .collect(),
    );

    CorrelationReport {
        correlations,
        unique_keywords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn shared_pair_keyword_yields_exactly_one_pairwise_insight() {
        let report = find_correlations(
            &kw(&["election", "turnout"]),
            &kw(&["election", "debate"]),
            &kw(&["economy"]),
        );
        assert_eq!(report.correlations.len(), 1);
        let insight = &report.correlations[0];
        assert_eq!(
            insight.scope,
            CorrelationScope::Pair {
                a: SourceKind::Discussion,
                b: SourceKind::Video
            }
        );
        assert_eq!(insight.keywords, vec!["election".to_string()]);
    }

    #[test]
    fn three_way_overlap_also_appears_in_every_pair() {
        let report = find_correlations(&kw(&["rust"]), &kw(&["rust"]), &kw(&["rust"]));
        assert_eq!(report.correlations.len(), 4);
        assert_eq!(report.correlations[0].scope, CorrelationScope::AllSources);
    }

    #[test]
    fn unique_keywords_exclude_any_overlap() {
        let report = find_correlations(
            &kw(&["alpha", "shared"]),
            &kw(&["beta", "shared"]),
            &kw(&["gamma"]),
        );
        assert_eq!(report.unique_keywords[&SourceKind::Discussion], kw(&["alpha"]));
        assert_eq!(report.unique_keywords[&SourceKind::Video], kw(&["beta"]));
        assert_eq!(report.unique_keywords[&SourceKind::Article], kw(&["gamma"]));
    }

    #[test]
    fn disjoint_sources_produce_no_insights() {
        let report = find_correlations(&kw(&["one"]), &kw(&["two"]), &kw(&["three"]));
        assert!(report.correlations.is_empty());
    }
}
