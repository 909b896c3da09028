// src/summary.rs
//! Context summary synthesis.
//!
//! A summary has two layers: an optional generative narrative (provider
//! fallback chain, skipped when none is configured or all fail) and the
//! deterministic structured breakdown, which always renders. The result is
//! never empty, whatever the providers do.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::analyze::trends::TrendDescriptor;
use crate::analyze::{AggregatedAnalysis, SourceAnalysis, TrendReport};
use crate::completion::{sanitize, CompletionOutcome, CompletionRequest, FallbackChain};
use crate::sentiment::{dominant_label, SentimentLabel};
use crate::sources::types::{ItemDetails, SourceKind};

const SEPARATOR_WIDTH: usize = 70;
const BODY_SNIPPET_CHARS: usize = 150;
const REPLY_SNIPPET_CHARS: usize = 100;
const BLOCK_ITEMS: usize = 3;
const BUCKET_PER_SOURCE: usize = 2;
const BUCKET_LINE_CAP: usize = 5;
const KEYWORD_LINE_CAP: usize = 10;
const CORRELATION_LINES: usize = 3;
const CORRELATION_KEYWORDS: usize = 5;
const PAYLOAD_TOP_ITEMS: usize = 3;
const PAYLOAD_THEMES: usize = 10;
const PAYLOAD_TRENDS: usize = 2;
const PAYLOAD_CORRELATIONS: usize = 3;
const PAYLOAD_UNIQUE_PER_SOURCE: usize = 2;

const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert content analyst who identifies trends and insights from social media, video platforms, and news sources.";

/// Final summary text plus provenance of the generated section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub text: String,
    pub generated_by: Option<String>,
}

pub struct Summarizer {
    chain: Arc<FallbackChain>,
}

impl Summarizer {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }

    pub async fn create_summary(&self, analysis: &AggregatedAnalysis) -> ContextSummary {
        let generated = self.generate_narrative(analysis).await;
        let text = render_summary(analysis, generated.as_ref().map(|(text, _)| text.as_str()));
        ContextSummary {
            text,
            generated_by: generated.map(|(_, provider)| provider.to_string()),
        }
    }

    async fn generate_narrative(
        &self,
        analysis: &AggregatedAnalysis,
    ) -> Option<(String, &'static str)> {
        if self.chain.is_empty() {
            return None;
        }
        let request = CompletionRequest::new(build_prompt(analysis))
            .with_system(SUMMARY_SYSTEM_PROMPT)
            .with_temperature(0.7);
        match self.chain.run(&request).await {
            CompletionOutcome::Completed { content, provider } => {
                let cleaned = sanitize::clean_completion(&content);
                if cleaned.is_empty() {
                    None
                } else {
                    Some((cleaned, provider))
                }
            }
            outcome @ CompletionOutcome::Exhausted { .. } => {
                tracing::warn!(
                    errors = outcome.error_summary().as_deref().unwrap_or_default(),
                    "generative summary failed, rendering structured summary only"
                );
                None
            }
        }
    }
}

fn source_payload(source: Option<&SourceAnalysis>) -> Value {
    match source {
        Some(source) => json!({
            "top_items": source.ranked.iter().take(PAYLOAD_TOP_ITEMS)
                .map(|scored| scored.item.title.clone()).collect::<Vec<_>>(),
            "themes": source.themes.top_keywords.iter().take(PAYLOAD_THEMES)
                .cloned().collect::<Vec<_>>(),
            "sentiment": source.sentiment.label.as_str(),
            "emerging_trends": source.trends.emerging_trends.iter().take(PAYLOAD_TRENDS)
                .map(|trend| trend.title.clone()).collect::<Vec<_>>(),
            "gaining_traction": source.trends.gaining_traction.iter().take(PAYLOAD_TRENDS)
                .map(|trend| trend.title.clone()).collect::<Vec<_>>(),
        }),
        None => json!({
            "top_items": [],
            "themes": [],
            "sentiment": SentimentLabel::Neutral.as_str(),
            "emerging_trends": [],
            "gaining_traction": [],
        }),
    }
}

/// Compact per-source digest handed to the narrative prompt.
pub(crate) fn build_payload(analysis: &AggregatedAnalysis) -> Value {
    let mut unique_angles: Vec<String> = Vec::new();
    for kind in SourceKind::ALL {
        if let Some(source) = analysis.source(kind) {
            unique_angles.extend(
                source
                    .trends
                    .unique_angles
                    .iter()
                    .take(PAYLOAD_UNIQUE_PER_SOURCE)
                    .map(|angle| angle.title.clone()),
            );
        }
    }
    json!({
        "topic": analysis.topic,
        "discussion_summary": source_payload(analysis.source(SourceKind::Discussion)),
        "video_summary": source_payload(analysis.source(SourceKind::Video)),
        "article_summary": source_payload(analysis.source(SourceKind::Article)),
        "correlations": analysis.correlations.correlations.iter().take(PAYLOAD_CORRELATIONS)
            .map(|corr| corr.insight.clone()).collect::<Vec<_>>(),
        "unique_angles": unique_angles,
    })
}

pub(crate) fn build_prompt(analysis: &AggregatedAnalysis) -> String {
    let payload = serde_json::to_string_pretty(&build_payload(analysis))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"Analyze the following trending topics data about "{topic}" and generate a comprehensive, intelligent summary.

DATA SUMMARY:
{payload}

Your task:
1. Identify the key insights and trends
2. Highlight what's gaining traction vs what's stable
3. Find unique angles or perspectives that others might miss
4. Summarize cross-source correlations
5. Provide actionable insights for content creation

Generate a concise but comprehensive summary (300-500 words) that:
- Starts with the most important trends and insights
- Highlights emerging topics that are gaining momentum
- Identifies unique angles or niche perspectives
- Explains cross-source connections
- Provides clear takeaways for content creators

IMPORTANT: Focus on the CONTENT and themes themselves. Minimize or avoid explicit mentions of the platforms
(discussion forums, video platforms, news outlets) - instead, describe what people are discussing, what's
trending, and why it matters. The summary should read as insights about the topic, not as a report about
social media activity.

Output ONLY the summary text, no meta-commentary or explanations."#,
        topic = analysis.topic,
    )
}

fn block_header(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Discussion => "TOP DISCUSSIONS (Community Insights):",
        SourceKind::Video => "TRENDING VIDEOS (Popular Content):",
        SourceKind::Article => "RECENT NEWS (Current Events):",
    }
}

/// Render the full summary text: generated narrative first when present,
/// then the structured breakdown.
pub fn render_summary(analysis: &AggregatedAnalysis, generated: Option<&str>) -> String {
    let heavy = "=".repeat(SEPARATOR_WIDTH);
    let light = "-".repeat(SEPARATOR_WIDTH);

    let mut out = format!("TRENDING TOPICS ANALYSIS: {}\n{heavy}\n\n", analysis.topic);
    if let Some(narrative) = generated {
        out.push_str("AI-GENERATED INTELLIGENT SUMMARY:\n");
        out.push_str(&light);
        out.push('\n');
        out.push_str(narrative);
        out.push_str("\n\n");
        out.push_str(&heavy);
        out.push_str("\n\nDETAILED BREAKDOWN:\n\n");
    }

    let keywords = keyword_union(analysis);
    out.push_str("KEY THEMES & KEYWORDS:\n");
    out.push_str(&format!(
        "- Top trending keywords: {}\n",
        keywords
            .iter()
            .take(KEYWORD_LINE_CAP)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    ));
    let correlation_count = analysis.correlations.correlations.len();
    if correlation_count > 0 {
        out.push_str(&format!(
            "- Cross-source correlations found: {correlation_count} connections\n"
        ));
    }
    out.push('\n');

    out.push_str("TREND ANALYSIS:\n");
    out.push_str(&light);
    out.push('\n');

    let emerging = collect_bucket(analysis, |trends| &trends.emerging_trends);
    if !emerging.is_empty() {
        out.push_str("\u{1F331} EMERGING TRENDS (New topics gaining attention):\n");
        for trend in emerging.iter().take(BUCKET_LINE_CAP) {
            out.push_str(&format!("- {}\n", trend.title));
        }
        out.push('\n');
    }

    let gaining = collect_bucket(analysis, |trends| &trends.gaining_traction);
    if !gaining.is_empty() {
        out.push_str("\u{1F4C8} GAINING TRACTION (Rapidly growing topics):\n");
        for trend in gaining.iter().take(BUCKET_LINE_CAP) {
            out.push_str(&format!("- {}\n", trend.title));
        }
        out.push('\n');
    }

    let mut unique_angles = Vec::new();
    for kind in SourceKind::ALL {
        if let Some(source) = analysis.source(kind) {
            unique_angles.extend(source.trends.unique_angles.iter().take(BUCKET_PER_SOURCE));
        }
    }
    if !unique_angles.is_empty() {
        out.push_str("\u{1F4A1} UNIQUE ANGLES (Niche perspectives worth exploring):\n");
        for angle in unique_angles.iter().take(BUCKET_LINE_CAP) {
            out.push_str(&format!("- {}\n", angle.title));
            if !angle.insight.is_empty() {
                out.push_str(&format!("  {}\n", angle.insight));
            }
        }
        out.push('\n');
    }

    for kind in SourceKind::ALL {
        if let Some(source) = analysis.source(kind) {
            if !source.ranked.is_empty() {
                render_source_block(&mut out, source);
            }
        }
    }

    if correlation_count > 0 {
        out.push_str("CROSS-SOURCE INSIGHTS:\n");
        for corr in analysis.correlations.correlations.iter().take(CORRELATION_LINES) {
            out.push_str(&format!("- {}\n", corr.insight));
            out.push_str(&format!(
                "  Keywords: {}\n",
                corr.keywords
                    .iter()
                    .take(CORRELATION_KEYWORDS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        out.push('\n');
    }

    let labels: Vec<SentimentLabel> = SourceKind::ALL
        .iter()
        .filter_map(|kind| analysis.source(*kind))
        .map(|source| source.sentiment.label)
        .collect();
    out.push_str(&format!("OVERALL SENTIMENT: {}\n", dominant_label(&labels)));
    out
}

fn render_source_block(out: &mut String, source: &SourceAnalysis) {
    out.push_str(block_header(source.kind));
    out.push('\n');
    for (index, scored) in source.ranked.iter().take(BLOCK_ITEMS).enumerate() {
        let item = &scored.item;
        out.push_str(&format!("{}. {}\n", index + 1, item.title));
        match &item.details {
            ItemDetails::Discussion(d) => {
                if !item.body.is_empty() {
                    out.push_str(&format!(
                        "   Content: {}...\n",
                        snippet(&item.body, BODY_SNIPPET_CHARS)
                    ));
                }
                if let Some(reply) = d.top_replies.first() {
                    out.push_str(&format!(
                        "   Top comment: \"{}...\" ({} upvotes)\n",
                        snippet(&reply.text, REPLY_SNIPPET_CHARS),
                        reply.score
                    ));
                }
                out.push_str(&format!(
                    "   Engagement: {} upvotes, {} comments\n",
                    d.score, d.num_replies
                ));
                out.push_str(&format!("   Community: {}\n", d.community));
            }
            ItemDetails::Video(v) => {
                if !item.body.is_empty() {
                    out.push_str(&format!(
                        "   About: {}...\n",
                        snippet(&item.body, BODY_SNIPPET_CHARS)
                    ));
                }
                out.push_str(&format!(
                    "   Views: {} | Engagement: {:.2}%\n",
                    group_thousands(v.views.unwrap_or(0)),
                    v.engagement_ratio.unwrap_or(0.0)
                ));
                out.push_str(&format!("   Channel: {}\n", item.author));
                if !v.tags.is_empty() {
                    out.push_str(&format!(
                        "   Tags: {}\n",
                        v.tags.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
                    ));
                }
            }
            ItemDetails::Article(a) => {
                if !item.body.is_empty() {
                    out.push_str(&format!(
                        "   Summary: {}...\n",
                        snippet(&item.body, BODY_SNIPPET_CHARS)
                    ));
                }
                out.push_str(&format!("   Source: {}", item.author));
                if a.is_major_outlet {
                    out.push_str(" (Major Outlet)");
                }
                out.push('\n');
                if let Some(age) = item.age_hours.filter(|age| *age != 0.0) {
                    out.push_str(&format!("   Published: {age:.1} hours ago\n"));
                }
            }
        }
    }
    out.push_str(&format!("Sentiment: {}\n\n", source.sentiment.label));
}

/// Per-source keywords in source order (discussion, video, article),
/// deduplicated by first occurrence.
fn keyword_union(analysis: &AggregatedAnalysis) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for kind in SourceKind::ALL {
        if let Some(source) = analysis.source(kind) {
            for keyword in &source.themes.top_keywords {
                if seen.insert(keyword.clone()) {
                    out.push(keyword.clone());
                }
            }
        }
    }
    out
}

fn collect_bucket<'a>(
    analysis: &'a AggregatedAnalysis,
    pick: impl Fn(&'a TrendReport) -> &'a Vec<TrendDescriptor>,
) -> Vec<&'a TrendDescriptor> {
    let mut out = Vec::new();
    for kind in SourceKind::ALL {
        if let Some(source) = analysis.source(kind) {
            out.extend(pick(&source.trends).iter().take(BUCKET_PER_SOURCE));
        }
    }
    out
}

fn snippet(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Wrap a context summary around the user's query for downstream generation.
pub fn enriched_prompt(context: &str, query: &str) -> String {
    format!(
        "CONTEXT: {context}\n\nUSER QUERY: {query}\n\nBased on the context above, please provide a comprehensive response."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{build_analysis, AnalysisConfig};
    use crate::completion::MockProvider;
    use crate::sources::types::{
        ArticleFields, ContentItem, DiscussionFields, Reply, VideoFields,
    };

    fn sample_analysis() -> AggregatedAnalysis {
        let discussion = ContentItem {
            title: "Rust adoption keeps growing".into(),
            body: "Great discussion about why teams love the compiler".into(),
            url: "https://example.com/d".into(),
            author: "user1".into(),
            age_hours: Some(3.0),
            published_at: None,
            details: ItemDetails::Discussion(DiscussionFields {
                community: "programming".into(),
                score: 420,
                num_replies: 180,
                approval_ratio: Some(0.94),
                engagement_score: None,
                top_replies: vec![Reply {
                    text: "The borrow checker finally clicked for me".into(),
                    score: 42,
                    author: "user2".into(),
                }],
            }),
        };
        let video = ContentItem {
            title: "Why Rust is taking over infrastructure".into(),
            body: "A tour of production deployments".into(),
            url: "https://example.com/v".into(),
            author: "Veritasium".into(),
            age_hours: Some(10.0),
            published_at: None,
            details: ItemDetails::Video(VideoFields {
                views: Some(1_234_567),
                likes: Some(50_000),
                comments: Some(4_000),
                engagement_ratio: Some(3.1),
                tags: vec!["rust".into(), "infrastructure".into()],
            }),
        };
        let article = ContentItem {
            title: "Rust reaches new stability milestone".into(),
            body: "The release brings improvements across the toolchain".into(),
            url: "https://example.com/a".into(),
            author: "Reuters".into(),
            age_hours: Some(5.5),
            published_at: None,
            details: ItemDetails::Article(ArticleFields {
                keywords: vec!["rust".into(), "release".into()],
                is_major_outlet: true,
                credibility: Some(0.9),
            }),
        };
        build_analysis(
            vec![
                (SourceKind::Discussion, vec![discussion]),
                (SourceKind::Video, vec![video]),
                (SourceKind::Article, vec![article]),
            ],
            "rust",
            &AnalysisConfig::default(),
        )
    }

    #[test]
    fn structured_summary_has_every_section() {
        let analysis = sample_analysis();
        let text = render_summary(&analysis, None);
        assert!(text.starts_with("TRENDING TOPICS ANALYSIS: rust\n"));
        assert!(!text.contains("AI-GENERATED INTELLIGENT SUMMARY:"));
        assert!(text.contains("KEY THEMES & KEYWORDS:"));
        assert!(text.contains("TREND ANALYSIS:"));
        assert!(text.contains("TOP DISCUSSIONS (Community Insights):"));
        assert!(text.contains("   Community: programming\n"));
        assert!(text.contains("Top comment: \"The borrow checker finally clicked for me...\" (42 upvotes)"));
        assert!(text.contains("   Engagement: 420 upvotes, 180 comments\n"));
        assert!(text.contains("TRENDING VIDEOS (Popular Content):"));
        assert!(text.contains("   Views: 1,234,567 | Engagement: 3.10%\n"));
        assert!(text.contains("   Channel: Veritasium\n"));
        assert!(text.contains("RECENT NEWS (Current Events):"));
        assert!(text.contains("   Source: Reuters (Major Outlet)\n"));
        assert!(text.contains("   Published: 5.5 hours ago\n"));
        assert!(text.contains("OVERALL SENTIMENT: "));
    }

    #[test]
    fn generated_section_is_prepended_when_present() {
        let analysis = sample_analysis();
        let text = render_summary(&analysis, Some("The narrative."));
        assert!(text.contains("AI-GENERATED INTELLIGENT SUMMARY:\n"));
        assert!(text.contains("The narrative.\n"));
        assert!(text.contains("DETAILED BREAKDOWN:\n\n"));
        // Structured sections still follow.
        assert!(text.contains("KEY THEMES & KEYWORDS:"));
    }

    #[test]
    fn empty_analysis_still_renders() {
        let analysis = build_analysis(vec![], "ghosts", &AnalysisConfig::default());
        let text = render_summary(&analysis, None);
        assert!(text.starts_with("TRENDING TOPICS ANALYSIS: ghosts\n"));
        assert!(!text.contains("TOP DISCUSSIONS"));
        assert!(text.ends_with("OVERALL SENTIMENT: neutral\n"));
    }

    #[test]
    fn payload_caps_lists_per_source() {
        let analysis = sample_analysis();
        let payload = build_payload(&analysis);
        for key in ["discussion_summary", "video_summary", "article_summary"] {
            let summary = &payload[key];
            assert!(summary["top_items"].as_array().unwrap().len() <= PAYLOAD_TOP_ITEMS);
            assert!(summary["emerging_trends"].as_array().unwrap().len() <= PAYLOAD_TRENDS);
            assert!(summary["gaining_traction"].as_array().unwrap().len() <= PAYLOAD_TRENDS);
        }
        assert_eq!(payload["topic"], "rust");
    }

    #[test]
    fn prompt_embeds_topic_and_payload() {
        let analysis = sample_analysis();
        let prompt = build_prompt(&analysis);
        assert!(prompt.contains("trending topics data about \"rust\""));
        assert!(prompt.contains("DATA SUMMARY:"));
        assert!(prompt.contains("Output ONLY the summary text"));
    }

    #[tokio::test]
    async fn summarizer_tags_provenance() {
        let analysis = sample_analysis();
        let chain = Arc::new(FallbackChain::new(vec![Arc::new(MockProvider::succeeding(
            "mock",
            "A crisp narrative about rust.",
        ))
            as Arc<dyn crate::completion::CompletionProvider>]));
        let summary = Summarizer::new(chain).create_summary(&analysis).await;
        assert_eq!(summary.generated_by.as_deref(), Some("mock"));
        assert!(summary.text.contains("A crisp narrative about rust."));

        let empty_chain = Arc::new(FallbackChain::new(Vec::new()));
        let fallback = Summarizer::new(empty_chain).create_summary(&analysis).await;
        assert_eq!(fallback.generated_by, None);
        assert!(fallback.text.contains("KEY THEMES & KEYWORDS:"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn enriched_prompt_wraps_context_and_query() {
        let prompt = enriched_prompt("summary here", "what's new");
        assert!(prompt.starts_with("CONTEXT: summary here\n\nUSER QUERY: what's new"));
        assert!(prompt.ends_with("comprehensive response."));
    }
}
