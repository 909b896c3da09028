// src/orchestrator.rs
//! The entrypoint behind `POST /query`: analyze a free-text query, fetch the
//! context its intent calls for, and dispatch to the matching workflow.
//!
//! Expensive stages are memoized independently in the context cache: the
//! intent analysis by query hash, the fetched bundle and the rendered summary
//! by topic + source set. Media synthesis (audio, video, voice cloning) runs
//! in downstream pipelines; those intents return the prepared context and
//! guidance instead.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::analyze::{build_analysis, AggregatedAnalysis, AnalysisConfig};
use crate::cache::{self, ContextCache, DEFAULT_TTL};
use crate::completion::FallbackChain;
use crate::config::AppConfig;
use crate::intent::{
    determine_context_needs, ContextNeeds, IntentAnalyzer, QueryAnalysis, QueryIntent,
    Requirements,
};
use crate::script::{
    ScriptGenerator, ScriptRequest, DEFAULT_DURATION_SECS, DEFAULT_STYLE,
};
use crate::sources::{FetchOutcome, SourceAggregator, SourceKind, SourceProvider};
use crate::summary::{enriched_prompt, ContextSummary, Summarizer};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("queries_total", "Queries processed, labeled by intent.");
    });
}

/// Structured outcome of one query. `intent`, `topics` and `requirements`
/// mirror the analysis for callers that do not want to unpack it.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorResult {
    pub query: String,
    pub analysis: QueryAnalysis,
    pub intent: QueryIntent,
    pub topics: Vec<String>,
    pub requirements: Requirements,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OrchestratorResult {
    fn base(query: &str, analysis: QueryAnalysis) -> Self {
        Self {
            query: query.to_string(),
            intent: analysis.intent,
            topics: analysis.topics.clone(),
            requirements: analysis.requirements.clone(),
            analysis,
            success: false,
            data: None,
            error: None,
            message: None,
        }
    }

    fn ok(mut self, data: Value, message: impl Into<String>) -> Self {
        self.success = true;
        self.data = Some(data);
        self.message = Some(message.into());
        self
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Everything derived for one topic: the raw bundle, the scored analysis and
/// the rendered summary.
#[derive(Debug, Clone, Serialize)]
pub struct TrendingContext {
    pub bundle: FetchOutcome,
    pub analysis: AggregatedAnalysis,
    pub summary: ContextSummary,
}

impl TrendingContext {
    /// Response payload: per-source counts and errors, then the analysis and
    /// summary themselves.
    pub fn data(&self) -> Value {
        let mut sources = serde_json::Map::new();
        for batch in &self.bundle.batches {
            sources.insert(
                batch.kind.as_str().to_string(),
                json!({ "count": batch.items.len() }),
            );
        }
        for (kind, error) in &self.bundle.errors {
            sources.insert(
                kind.as_str().to_string(),
                json!({ "count": 0, "error": error }),
            );
        }
        json!({
            "topic": self.bundle.topic,
            "sources": Value::Object(sources),
            "total_items": self.bundle.total_items(),
            "sources_available": self.bundle.sources_available(),
            "analysis": self.analysis,
            "summary": self.summary,
        })
    }
}

pub struct TrendOrchestrator {
    analyzer: IntentAnalyzer,
    aggregator: SourceAggregator,
    summarizer: Summarizer,
    scripts: ScriptGenerator,
    cache: Arc<ContextCache>,
    analysis_config: AnalysisConfig,
}

impl TrendOrchestrator {
    pub fn new(
        config: &AppConfig,
        providers: Vec<Arc<dyn SourceProvider>>,
        cache: Arc<ContextCache>,
    ) -> Self {
        let chain = Arc::new(FallbackChain::from_config(config));
        Self::with_chain(config, providers, cache, chain)
    }

    /// Wire an explicit completion chain; `new` builds one from the config.
    pub fn with_chain(
        config: &AppConfig,
        providers: Vec<Arc<dyn SourceProvider>>,
        cache: Arc<ContextCache>,
        chain: Arc<FallbackChain>,
    ) -> Self {
        ensure_metrics_described();
        let analysis_config = AnalysisConfig::load_or_default(&config.analysis_config_path);
        Self {
            analyzer: IntentAnalyzer::new(Arc::clone(&chain)),
            aggregator: SourceAggregator::new(providers),
            summarizer: Summarizer::new(Arc::clone(&chain)),
            scripts: ScriptGenerator::new(chain, config.speaking_rate_wpm),
            cache,
            analysis_config,
        }
    }

    pub async fn process_query(&self, query: &str) -> OrchestratorResult {
        let analysis = self.analyze_query(query).await;
        counter!("queries_total", "intent" => analysis.intent.as_str()).increment(1);
        tracing::info!(intent = %analysis.intent, topics = ?analysis.topics, "dispatching query");
        self.dispatch(query, analysis).await
    }

    /// Intent analysis, memoized by normalized query hash.
    pub async fn analyze_query(&self, query: &str) -> QueryAnalysis {
        let key = cache::analysis_key(query);
        if let Some(value) = self.cache.get(&key) {
            if let Ok(cached) = serde_json::from_value::<QueryAnalysis>(value) {
                return cached;
            }
        }
        let analysis = self.analyzer.analyze(query).await;
        if let Ok(value) = serde_json::to_value(&analysis) {
            self.cache.set(key, value, DEFAULT_TTL);
        }
        analysis
    }

    pub async fn dispatch(&self, query: &str, analysis: QueryAnalysis) -> OrchestratorResult {
        let needs = determine_context_needs(analysis.intent, &analysis.topics);
        match analysis.intent {
            QueryIntent::TrendingTopics => self.handle_trending(query, analysis, &needs).await,
            QueryIntent::ScriptGeneration => self.handle_script(query, analysis, &needs).await,
            QueryIntent::VideoCreation => self.handle_video(query, analysis, &needs).await,
            QueryIntent::VoiceCloning => self.handle_voice(query, analysis),
            QueryIntent::AudioGeneration => self.handle_audio(query, analysis).await,
            QueryIntent::GeneralQuery => self.handle_general(query, analysis, &needs).await,
        }
    }

    /// Fetch, score and summarize context for a topic. The bundle and the
    /// summary are cached independently for the TTL window.
    pub async fn trending_context(
        &self,
        topic: &str,
        kinds: &[SourceKind],
        limit: usize,
    ) -> TrendingContext {
        let bundle = self.fetch_bundle(topic, kinds, limit).await;
        let analysis = build_analysis(bundle.analysis_input(), topic, &self.analysis_config);
        let summary = self.summary_for(topic, kinds, &analysis).await;
        TrendingContext {
            bundle,
            analysis,
            summary,
        }
    }

    async fn fetch_bundle(&self, topic: &str, kinds: &[SourceKind], limit: usize) -> FetchOutcome {
        let key = cache::trending_key(topic, kinds);
        if let Some(value) = self.cache.get(&key) {
            if let Ok(cached) = serde_json::from_value::<FetchOutcome>(value) {
                return cached;
            }
        }
        let outcome = self.aggregator.fetch_all(topic, kinds, limit).await;
        if let Ok(value) = serde_json::to_value(&outcome) {
            self.cache.set(key, value, DEFAULT_TTL);
        }
        outcome
    }

    async fn summary_for(
        &self,
        topic: &str,
        kinds: &[SourceKind],
        analysis: &AggregatedAnalysis,
    ) -> ContextSummary {
        let key = cache::summary_key(topic, kinds);
        if let Some(value) = self.cache.get(&key) {
            if let Ok(cached) = serde_json::from_value::<ContextSummary>(value) {
                return cached;
            }
        }
        let summary = self.summarizer.create_summary(analysis).await;
        if let Ok(value) = serde_json::to_value(&summary) {
            self.cache.set(key, value, DEFAULT_TTL);
        }
        summary
    }

    async fn handle_trending(
        &self,
        query: &str,
        analysis: QueryAnalysis,
        needs: &ContextNeeds,
    ) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        let Some(topic) = result.topics.first().cloned() else {
            return result.fail("No topic specified. Please provide a topic.");
        };
        let context = self
            .trending_context(&topic, &needs.sources, needs.limit)
            .await;
        let message = format!(
            "Retrieved {} trending items about '{topic}'",
            context.bundle.total_items()
        );
        result.ok(context.data(), message)
    }

    async fn handle_script(
        &self,
        query: &str,
        analysis: QueryAnalysis,
        needs: &ContextNeeds,
    ) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        if result.topics.is_empty() {
            return result.fail("No topic specified. Please provide a topic.");
        }
        let topic = joined_topic(&result.topics);
        let duration = result
            .requirements
            .duration_secs
            .unwrap_or(DEFAULT_DURATION_SECS);
        let style = result
            .requirements
            .style
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());

        let context = self
            .trending_context(&topic, &needs.sources, needs.limit)
            .await;
        if context.bundle.is_empty() {
            return result
                .fail("No trending topics found. Unable to generate script without source material.");
        }

        let request = ScriptRequest::new(&topic)
            .with_duration(duration)
            .with_style(style)
            .with_context(context.summary.text.clone());
        match self.scripts.generate(&request).await {
            Ok(script) => {
                let message = format!("Generated {duration}-second script about '{topic}'");
                result.ok(
                    json!({
                        "script": script.script,
                        "metadata": script.metadata,
                        "trending": context.data(),
                    }),
                    message,
                )
            }
            Err(error) => result.fail(format!("{error:#}")),
        }
    }

    async fn handle_video(
        &self,
        query: &str,
        analysis: QueryAnalysis,
        needs: &ContextNeeds,
    ) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        if result.topics.is_empty() {
            return result.fail("No topic specified. Please provide a topic.");
        }
        let topic = joined_topic(&result.topics);
        let context = self
            .trending_context(&topic, &needs.sources, needs.limit)
            .await;
        let message = format!(
            "Prepared trending context for a video about '{topic}'. Video assembly runs in the downstream pipeline."
        );
        result.ok(context.data(), message)
    }

    fn handle_voice(&self, query: &str, analysis: QueryAnalysis) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        if result.requirements.video_path.is_none() {
            return result.fail("Need a video file to clone voice from.");
        }
        result.ok(
            json!({
                "hint": "Try: 'Generate audio about [topic] using [video_path] as voice sample'",
            }),
            "Voice cloning runs in the downstream audio pipeline; pass the video sample there.",
        )
    }

    async fn handle_audio(&self, query: &str, analysis: QueryAnalysis) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        if result.topics.is_empty() {
            return result.fail("No topic or script specified.");
        }
        let topic = joined_topic(&result.topics);
        let duration = result
            .requirements
            .duration_secs
            .unwrap_or(DEFAULT_DURATION_SECS);
        let style = result
            .requirements
            .style
            .clone()
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());

        let request = ScriptRequest::new(&topic)
            .with_duration(duration)
            .with_style(style);
        match self.scripts.generate(&request).await {
            Ok(script) => {
                let message = format!(
                    "Generated narration script about '{topic}'; audio synthesis runs in the downstream pipeline."
                );
                result.ok(
                    json!({ "script": script.script, "metadata": script.metadata }),
                    message,
                )
            }
            Err(error) => result.fail(format!("{error:#}")),
        }
    }

    async fn handle_general(
        &self,
        query: &str,
        analysis: QueryAnalysis,
        needs: &ContextNeeds,
    ) -> OrchestratorResult {
        let result = OrchestratorResult::base(query, analysis);
        if !needs.should_fetch || result.topics.is_empty() {
            return result.ok(
                json!({ "prompt": query, "enriched": false }),
                "No additional context needed for this query.",
            );
        }
        let topic = joined_topic(&result.topics);
        let context = self
            .trending_context(&topic, &needs.sources, needs.limit)
            .await;
        let prompt = enriched_prompt(&context.summary.text, query);
        let message = format!("Enriched the query with trending context about '{topic}'");
        result.ok(
            json!({
                "prompt": prompt,
                "enriched": true,
                "topic": topic,
                "summary": context.summary,
            }),
            message,
        )
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }
}

/// A single topic is used as-is; multiple topics collapse to the first two
/// joined, which keeps compound subjects together.
fn joined_topic(topics: &[String]) -> String {
    if topics.len() > 1 {
        topics[..2].join(" ")
    } else {
        topics.first().cloned().unwrap_or_default()
    }
}
