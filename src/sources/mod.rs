// src/sources/mod.rs
pub mod news_rss;
pub mod types;

pub use news_rss::{NewsRssSource, DEFAULT_NEWS_RSS_BASE};
pub use types::{ContentItem, ItemDetails, SourceKind, SourceProvider, StaticSource};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Titles this similar (normalized Levenshtein) within one source are
/// treated as reposts of the same content.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "source_items_fetched_total",
            "Content items fetched per source."
        );
        describe_counter!("source_fetch_errors_total", "Source fetch failures.");
        describe_counter!(
            "source_duplicates_dropped_total",
            "Near-duplicate items dropped after fetch."
        );
        describe_gauge!("source_last_fetch_ts", "Unix ts of the last fetch pass.");
        describe_histogram!("source_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Items fetched for one source kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBatch {
    pub kind: SourceKind,
    pub items: Vec<ContentItem>,
}

/// Result of one aggregation pass. A failed source lands in `errors` with
/// its message; the other batches are unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub topic: String,
    pub batches: Vec<SourceBatch>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<SourceKind, String>,
    #[serde(default)]
    pub duplicates_dropped: usize,
    pub fetched_at: i64,
}

impl FetchOutcome {
    /// Kinds that returned a batch, in fixed source order.
    pub fn sources_available(&self) -> Vec<SourceKind> {
        self.batches.iter().map(|batch| batch.kind).collect()
    }

    pub fn total_items(&self) -> usize {
        self.batches.iter().map(|batch| batch.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    /// Per-source input for the analysis pipeline.
    pub fn analysis_input(&self) -> Vec<(SourceKind, Vec<ContentItem>)> {
        self.batches
            .iter()
            .map(|batch| (batch.kind, batch.items.clone()))
            .collect()
    }
}

pub struct SourceAggregator {
    providers: Vec<Arc<dyn SourceProvider>>,
}

impl SourceAggregator {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>) -> Self {
        ensure_metrics_described();
        Self { providers }
    }

    /// Kinds at least one registered provider can serve.
    pub fn available_kinds(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.providers.iter().any(|p| p.kind() == *kind))
            .collect()
    }

    /// Fetch `limit` items per requested kind. Provider failures are caught
    /// per source and reported in the outcome instead of propagating.
    pub async fn fetch_all(
        &self,
        topic: &str,
        kinds: &[SourceKind],
        limit: usize,
    ) -> FetchOutcome {
        let mut batches = Vec::new();
        let mut errors = BTreeMap::new();
        let mut duplicates_dropped = 0usize;

        for kind in SourceKind::ALL {
            if !kinds.contains(&kind) {
                continue;
            }
            let providers: Vec<_> = self
                .providers
                .iter()
                .filter(|provider| provider.kind() == kind)
                .collect();
            if providers.is_empty() {
                errors.insert(kind, "no provider registered for this source".to_string());
                continue;
            }

            let mut collected = Vec::new();
            let mut failure = None;
            for provider in providers {
                match provider.fetch(topic, limit).await {
                    Ok(items) => {
                        counter!("source_items_fetched_total", "source" => kind.as_str())
                            .increment(items.len() as u64);
                        collected.extend(items);
                    }
                    Err(error) => {
                        tracing::warn!(error = ?error, source = provider.name(), "source fetch failed");
                        counter!("source_fetch_errors_total", "source" => kind.as_str())
                            .increment(1);
                        failure = Some(format!("{error:#}"));
                    }
                }
            }
            if collected.is_empty() {
                if let Some(error) = failure {
                    errors.insert(kind, error);
                    continue;
                }
            }

            let before = collected.len();
            let items = drop_near_duplicates(collected, DEFAULT_SIMILARITY_THRESHOLD);
            let dropped = before - items.len();
            if dropped > 0 {
                counter!("source_duplicates_dropped_total", "source" => kind.as_str())
                    .increment(dropped as u64);
            }
            duplicates_dropped += dropped;
            batches.push(SourceBatch { kind, items });
        }

        let fetched_at = chrono::Utc::now().timestamp();
        gauge!("source_last_fetch_ts").set(fetched_at.max(0) as f64);
        tracing::debug!(
            topic,
            sources = batches.len(),
            errors = errors.len(),
            duplicates_dropped,
            "aggregation pass finished"
        );

        FetchOutcome {
            topic: topic.to_string(),
            batches,
            errors,
            duplicates_dropped,
            fetched_at,
        }
    }
}

/// Keep the first of each near-identical title run; reposts and mirrors of
/// the same story would otherwise crowd the ranked list.
fn drop_near_duplicates(items: Vec<ContentItem>, threshold: f64) -> Vec<ContentItem> {
    let mut kept: Vec<ContentItem> = Vec::with_capacity(items.len());
    let mut kept_titles: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let title = item.title.to_lowercase();
        let duplicate = kept_titles
            .iter()
            .any(|seen| strsim::normalized_levenshtein(seen, &title) >= threshold);
        if duplicate {
            continue;
        }
        kept_titles.push(title);
        kept.push(item);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    struct FailingSource(SourceKind);

    #[async_trait]
    impl SourceProvider for FailingSource {
        async fn fetch(&self, _topic: &str, _limit: usize) -> anyhow::Result<Vec<ContentItem>> {
            bail!("connection refused")
        }

        fn kind(&self) -> SourceKind {
            self.0
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn article(title: &str) -> ContentItem {
        ContentItem {
            title: title.to_string(),
            body: String::new(),
            url: String::new(),
            author: "Outlet".to_string(),
            age_hours: Some(1.0),
            published_at: None,
            details: ItemDetails::Article(Default::default()),
        }
    }

    #[tokio::test]
    async fn failed_source_does_not_block_the_others() {
        let aggregator = SourceAggregator::new(vec![
            Arc::new(StaticSource::new(
                SourceKind::Article,
                "static-articles",
                vec![article("Rust hits a milestone")],
            )),
            Arc::new(FailingSource(SourceKind::Discussion)),
        ]);
        let outcome = aggregator.fetch_all("rust", &SourceKind::ALL, 5).await;

        assert_eq!(outcome.sources_available(), vec![SourceKind::Article]);
        assert_eq!(outcome.total_items(), 1);
        assert!(outcome.errors[&SourceKind::Discussion].contains("connection refused"));
        assert!(outcome.errors[&SourceKind::Video].contains("no provider registered"));
    }

    #[tokio::test]
    async fn only_requested_kinds_are_fetched() {
        let aggregator = SourceAggregator::new(vec![Arc::new(StaticSource::new(
            SourceKind::Article,
            "static-articles",
            vec![article("One")],
        ))]);
        let outcome = aggregator
            .fetch_all("rust", &[SourceKind::Video], 5)
            .await;
        assert!(outcome.is_empty());
        assert!(outcome.batches.is_empty());
        assert!(outcome.errors.contains_key(&SourceKind::Video));
        assert!(!outcome.errors.contains_key(&SourceKind::Article));
    }

    #[tokio::test]
    async fn near_duplicate_titles_collapse_to_the_first() {
        let aggregator = SourceAggregator::new(vec![Arc::new(StaticSource::new(
            SourceKind::Article,
            "static-articles",
            vec![
                article("Big tech announces new AI model"),
                article("Big tech announces new AI model!"),
                article("Completely different local story"),
            ],
        ))]);
        let outcome = aggregator
            .fetch_all("ai", &[SourceKind::Article], 5)
            .await;
        assert_eq!(outcome.total_items(), 2);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(
            outcome.batches[0].items[0].title,
            "Big tech announces new AI model"
        );
    }

    #[test]
    fn similarity_threshold_spares_distinct_titles() {
        let items = vec![article("Alpha release notes"), article("Beta release notes")];
        let kept = drop_near_duplicates(items, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn outcome_round_trips_through_json() {
        let outcome = FetchOutcome {
            topic: "rust".to_string(),
            batches: vec![SourceBatch {
                kind: SourceKind::Article,
                items: vec![article("One")],
            }],
            errors: BTreeMap::new(),
            duplicates_dropped: 0,
            fetched_at: 1_700_000_000,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        let back: FetchOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back.topic, "rust");
        assert_eq!(back.analysis_input().len(), 1);
    }
}
