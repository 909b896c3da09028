// src/intent.rs
//! Query intent analysis: what the user wants, which topics they named,
//! and which source kinds should feed the answer.
//!
//! A generative pass runs first when a provider is configured; any failure
//! (transport, exhausted fallback, unparseable JSON) drops to the rule-based
//! analyzer, so `analyze` always returns a usable [`QueryAnalysis`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::completion::{sanitize, CompletionOutcome, CompletionRequest, FallbackChain};
use crate::sources::types::SourceKind;

/// A duration match converts to minutes when a spelled-out minute unit
/// appears within this many characters past the match.
pub const MINUTE_WINDOW: usize = 10;

const RULE_CONFIDENCE: f64 = 0.7;
const GENERATIVE_DEFAULT_CONFIDENCE: f64 = 0.8;
const TOPIC_CAP: usize = 5;

const TRENDING_CUES: &[&str] = &[
    "trending",
    "what's happening",
    "current",
    "latest",
    "news",
    "what's going on",
];
const SCRIPT_CUES: &[&str] = &["script", "monologue", "write", "content"];
const VIDEO_CUES: &[&str] = &["video", "talking head"];
const VOICE_CUES: &[&str] = &["voice", "clone", "mimic"];
const AUDIO_CUES: &[&str] = &["audio", "speech", "tts"];

const TOPIC_STOP_WORDS: &[&str] = &[
    "what", "is", "are", "the", "a", "an", "about", "for", "to", "with", "how", "when", "where",
    "why",
];

const STYLE_TABLE: &[(&str, &[&str])] = &[
    ("informative", &["informative", "educational", "factual"]),
    ("engaging", &["engaging", "exciting", "captivating"]),
    ("funny", &["funny", "humorous", "comedy"]),
    ("serious", &["serious", "formal", "professional"]),
    ("casual", &["casual", "relaxed", "conversational"]),
];

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));
static ABOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:about|on|regarding)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").expect("valid regex")
});
static CAPS_PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)").expect("valid regex"));
static DURATION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\d+)\s*(?:second|sec|minute|min)",
        r"(\d+)\s*s(?:ec)?",
        r"(\d+)\s*m(?:in)?",
        r"for\s+(\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});
static VOICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"voice["\s]+(?:named|called|is)?["\s]*([A-Za-z_][A-Za-z0-9_]*)"#)
        .expect("valid regex")
});
static VIDEO_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([/\\][\w/\\]+\.(?:mp4|mov|avi))").expect("valid regex"));

const QUERY_ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert query analyzer for a content creation service.

Analyze the user's query and determine:
1. Intent: What does the user want? Choose from: trending_topics, script_generation, video_creation, voice_cloning, audio_generation, general_query
2. Topics: What subjects are mentioned? Extract all topics/subjects
3. Context needs: What external data is needed? Choose from: discussion, video, article, all, none
4. Implicit requirements: duration (in seconds), style, voice preferences, video preferences, etc.

Return ONLY valid JSON with this exact structure:
{
    "intent": "trending_topics",
    "topics": ["AI", "machine learning"],
    "context_sources": ["discussion", "video", "article"],
    "requirements": {
        "duration": 60,
        "style": "informative",
        "voice_name": null,
        "video_path": null
    },
    "confidence": 0.95
}

Intent types:
- trending_topics: User wants to know what's trending, current events, what's happening
- script_generation: User wants to generate a script or monologue
- video_creation: User wants to create a video
- voice_cloning: User wants to clone a voice
- audio_generation: User wants to generate audio
- general_query: General question that might need context

Context sources:
- discussion: Need community discussion data
- video: Need video platform data
- article: Need news article data
- all: Need all sources
- none: No external context needed"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    TrendingTopics,
    ScriptGeneration,
    VideoCreation,
    VoiceCloning,
    AudioGeneration,
    GeneralQuery,
}

impl QueryIntent {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "trending_topics" => Some(Self::TrendingTopics),
            "script_generation" => Some(Self::ScriptGeneration),
            "video_creation" => Some(Self::VideoCreation),
            "voice_cloning" => Some(Self::VoiceCloning),
            "audio_generation" => Some(Self::AudioGeneration),
            "general_query" => Some(Self::GeneralQuery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrendingTopics => "trending_topics",
            Self::ScriptGeneration => "script_generation",
            Self::VideoCreation => "video_creation",
            Self::VoiceCloning => "voice_cloning",
            Self::AudioGeneration => "audio_generation",
            Self::GeneralQuery => "general_query",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implicit requirements mined from the query text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// Seconds; minute phrasings are converted on extraction.
    #[serde(rename = "duration")]
    pub duration_secs: Option<u64>,
    pub style: Option<String>,
    pub voice_name: Option<String>,
    pub video_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOrigin {
    Generative,
    RuleBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    pub topics: Vec<String>,
    pub context_sources: Vec<SourceKind>,
    pub requirements: Requirements,
    pub confidence: f64,
    pub origin: AnalysisOrigin,
}

/// Fetch policy derived from intent: which kinds, whether to fetch at all,
/// and how many items per source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextNeeds {
    pub sources: Vec<SourceKind>,
    pub should_fetch: bool,
    pub limit: usize,
}

pub fn determine_context_needs(intent: QueryIntent, topics: &[String]) -> ContextNeeds {
    match intent {
        QueryIntent::TrendingTopics => ContextNeeds {
            sources: SourceKind::ALL.to_vec(),
            should_fetch: true,
            limit: 10,
        },
        QueryIntent::ScriptGeneration | QueryIntent::VideoCreation => ContextNeeds {
            sources: SourceKind::ALL.to_vec(),
            should_fetch: true,
            limit: 5,
        },
        QueryIntent::VoiceCloning | QueryIntent::AudioGeneration => ContextNeeds {
            sources: Vec::new(),
            should_fetch: false,
            limit: 5,
        },
        QueryIntent::GeneralQuery => {
            if topics.is_empty() {
                ContextNeeds {
                    sources: Vec::new(),
                    should_fetch: false,
                    limit: 5,
                }
            } else {
                ContextNeeds {
                    sources: SourceKind::ALL.to_vec(),
                    should_fetch: true,
                    limit: 3,
                }
            }
        }
    }
}

pub struct IntentAnalyzer {
    chain: Arc<FallbackChain>,
}

impl IntentAnalyzer {
    pub fn new(chain: Arc<FallbackChain>) -> Self {
        Self { chain }
    }

    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        if self.chain.is_empty() {
            tracing::debug!("no completion providers, using rule-based query analysis");
            return analyze_with_rules(query);
        }

        let request = CompletionRequest::new(format!("Analyze this query: \"{query}\""))
            .with_system(format!(
                "{QUERY_ANALYSIS_SYSTEM_PROMPT}\n\nIMPORTANT: Return ONLY valid JSON, no other text."
            ))
            .with_temperature(0.3);

        match self.chain.run(&request).await {
            CompletionOutcome::Completed { content, provider } => {
                match parse_generative(&content, query) {
                    Some(analysis) => analysis,
                    None => {
                        tracing::warn!(
                            provider,
                            "query analysis returned unparseable JSON, falling back to rules"
                        );
                        analyze_with_rules(query)
                    }
                }
            }
            outcome @ CompletionOutcome::Exhausted { .. } => {
                tracing::warn!(
                    errors = outcome.error_summary().as_deref().unwrap_or_default(),
                    "generative query analysis failed, falling back to rules"
                );
                analyze_with_rules(query)
            }
        }
    }
}

/// Keyword-driven analysis; first matching intent family wins.
pub fn analyze_with_rules(query: &str) -> QueryAnalysis {
    let query_lower = query.to_lowercase();
    let intent = rule_based_intent(&query_lower);
    let topics = extract_topics(query);
    let context_sources = match intent {
        QueryIntent::VoiceCloning | QueryIntent::AudioGeneration => Vec::new(),
        _ => SourceKind::ALL.to_vec(),
    };
    QueryAnalysis {
        intent,
        topics,
        context_sources,
        requirements: detect_requirements(query),
        confidence: RULE_CONFIDENCE,
        origin: AnalysisOrigin::RuleBased,
    }
}

fn rule_based_intent(query_lower: &str) -> QueryIntent {
    let matches_any = |cues: &[&str]| cues.iter().any(|cue| query_lower.contains(cue));
    if matches_any(TRENDING_CUES) {
        QueryIntent::TrendingTopics
    } else if matches_any(SCRIPT_CUES) {
        QueryIntent::ScriptGeneration
    } else if matches_any(VIDEO_CUES) {
        QueryIntent::VideoCreation
    } else if matches_any(VOICE_CUES) {
        QueryIntent::VoiceCloning
    } else if matches_any(AUDIO_CUES) {
        QueryIntent::AudioGeneration
    } else {
        QueryIntent::GeneralQuery
    }
}

/// Pull topic phrases out of a query: quoted strings first, then runs of
/// capitalized or long words. Stop words neither join nor break a run.
pub fn extract_topics(query: &str) -> Vec<String> {
    let mut topics: Vec<String> = QUOTED_RE
        .captures_iter(query)
        .map(|cap| cap[1].to_string())
        .collect();

    let mut run: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let clean: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if clean.is_empty() || TOPIC_STOP_WORDS.contains(&clean.to_lowercase().as_str()) {
            continue;
        }
        let starts_upper = clean.chars().next().is_some_and(char::is_uppercase);
        if starts_upper || clean.chars().count() > 4 {
            run.push(clean);
        } else if !run.is_empty() {
            topics.push(run.join(" "));
            run.clear();
        }
    }
    if !run.is_empty() {
        topics.push(run.join(" "));
    }

    if topics.is_empty() {
        for re in [&*ABOUT_RE, &*CAPS_PHRASE_RE] {
            topics.extend(re.captures_iter(query).map(|cap| cap[1].to_string()));
        }
    }

    let mut seen = HashSet::new();
    let mut cleaned: Vec<String> = Vec::new();
    for topic in topics {
        let topic = topic.trim().to_string();
        if topic.chars().count() > 2 && seen.insert(topic.clone()) {
            cleaned.push(topic);
        }
    }

    if cleaned.is_empty() {
        let words: Vec<&str> = query
            .split_whitespace()
            .filter(|word| {
                word.chars().count() > 2 && !TOPIC_STOP_WORDS.contains(&word.to_lowercase().as_str())
            })
            .take(3)
            .collect();
        if !words.is_empty() {
            cleaned.push(words.join(" "));
        }
    }

    cleaned.truncate(TOPIC_CAP);
    cleaned
}

pub fn detect_requirements(query: &str) -> Requirements {
    let query_lower = query.to_lowercase();
    Requirements {
        duration_secs: parse_duration(&query_lower),
        style: parse_style(&query_lower).map(str::to_string),
        voice_name: VOICE_RE
            .captures(query)
            .map(|cap| cap[1].to_string()),
        video_path: VIDEO_PATH_RE
            .captures(query)
            .map(|cap| cap[1].to_string()),
    }
}

fn parse_duration(query_lower: &str) -> Option<u64> {
    for re in DURATION_RES.iter() {
        let Some(caps) = re.captures(query_lower) else {
            continue;
        };
        let whole = caps.get(0)?;
        let Ok(mut duration) = caps[1].parse::<u64>() else {
            continue;
        };
        let window: String = query_lower[whole.start()..]
            .chars()
            .take(whole.as_str().chars().count() + MINUTE_WINDOW)
            .collect();
        if whole.as_str().contains("min") || window.contains("minute") {
            duration = duration.saturating_mul(60);
        }
        return Some(duration);
    }
    None
}

fn parse_style(query_lower: &str) -> Option<&'static str> {
    STYLE_TABLE
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| query_lower.contains(cue)))
        .map(|(style, _)| *style)
}

fn parse_generative(content: &str, query: &str) -> Option<QueryAnalysis> {
    let cleaned = sanitize::clean_completion(content);
    let object = sanitize::extract_json_object(&cleaned)?;
    let value: Value = serde_json::from_str(object).ok()?;
    Some(normalize_generative(&value, query))
}

/// Field-by-field validation of the model's JSON; anything malformed falls
/// back to the rule-based extraction for that field.
fn normalize_generative(value: &Value, query: &str) -> QueryAnalysis {
    let intent = value
        .get("intent")
        .and_then(Value::as_str)
        .and_then(QueryIntent::parse)
        .unwrap_or(QueryIntent::GeneralQuery);

    let topics = match value.get("topics") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => extract_topics(query),
    };

    let mut context_sources: Vec<SourceKind> = Vec::new();
    let mut saw_none = false;
    match value.get("context_sources") {
        Some(Value::Array(tokens)) => {
            for token in tokens.iter().filter_map(Value::as_str) {
                let token = token.trim().to_lowercase();
                if token == "all" {
                    for kind in SourceKind::ALL {
                        if !context_sources.contains(&kind) {
                            context_sources.push(kind);
                        }
                    }
                } else if token == "none" {
                    saw_none = true;
                } else if let Some(kind) = SourceKind::parse(&token) {
                    if !context_sources.contains(&kind) {
                        context_sources.push(kind);
                    }
                }
            }
        }
        _ => context_sources = SourceKind::ALL.to_vec(),
    }

    // Context-dependent intents always fetch; synthesis-only intents never do.
    match intent {
        QueryIntent::TrendingTopics | QueryIntent::ScriptGeneration | QueryIntent::VideoCreation => {
            if saw_none || context_sources.is_empty() {
                context_sources = SourceKind::ALL.to_vec();
            }
        }
        QueryIntent::VoiceCloning | QueryIntent::AudioGeneration => context_sources.clear(),
        QueryIntent::GeneralQuery => {
            if context_sources.is_empty() && !saw_none {
                context_sources = SourceKind::ALL.to_vec();
            }
        }
    }

    let rule_requirements = detect_requirements(query);
    let requirements = match value.get("requirements").and_then(Value::as_object) {
        Some(object) => Requirements {
            duration_secs: object
                .get("duration")
                .and_then(Value::as_u64)
                .or(rule_requirements.duration_secs),
            style: object
                .get("style")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(rule_requirements.style),
            voice_name: object
                .get("voice_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(rule_requirements.voice_name),
            video_path: object
                .get("video_path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(rule_requirements.video_path),
        },
        None => rule_requirements,
    };

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(GENERATIVE_DEFAULT_CONFIDENCE);

    QueryAnalysis {
        intent,
        topics,
        context_sources,
        requirements,
        confidence,
        origin: AnalysisOrigin::Generative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn script_query_with_style_and_minutes() {
        let analysis = analyze_with_rules("Write a funny 2 minute script about space exploration");
        assert_eq!(analysis.intent, QueryIntent::ScriptGeneration);
        assert_eq!(analysis.requirements.duration_secs, Some(120));
        assert_eq!(analysis.requirements.style.as_deref(), Some("funny"));
        assert_eq!(analysis.context_sources, SourceKind::ALL.to_vec());
        assert!((analysis.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn second_durations_stay_in_seconds() {
        let analysis = analyze_with_rules("Generate a 30 second script about AI");
        assert_eq!(analysis.intent, QueryIntent::ScriptGeneration);
        assert_eq!(analysis.requirements.duration_secs, Some(30));
        assert!(analysis.topics.iter().any(|t| t.contains("AI")));
    }

    #[test]
    fn trending_beats_script_keywords() {
        let analysis = analyze_with_rules("write about the latest AI news");
        assert_eq!(analysis.intent, QueryIntent::TrendingTopics);
    }

    #[test]
    fn voice_query_needs_no_sources() {
        let analysis = analyze_with_rules("Clone the voice named Alice please");
        assert_eq!(analysis.intent, QueryIntent::VoiceCloning);
        assert!(analysis.context_sources.is_empty());
        assert_eq!(analysis.requirements.voice_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn topics_come_from_quotes_and_capitalized_runs() {
        let topics = extract_topics("Tell me about \"quantum computing\" and Machine Learning");
        assert!(topics.contains(&"quantum computing".to_string()));
        assert!(topics.contains(&"Machine Learning".to_string()));
        assert!(topics.len() <= 5);
    }

    #[test]
    fn topic_fallback_takes_first_meaningful_words() {
        let topics = extract_topics("why is it so hot");
        assert_eq!(topics, vec!["hot".to_string()]);
    }

    #[test]
    fn seconds_and_bare_for_durations() {
        assert_eq!(parse_duration("a 45 second teaser"), Some(45));
        assert_eq!(parse_duration("keep it going for 90"), Some(90));
        assert_eq!(parse_duration("no numbers here"), None);
    }

    #[test]
    fn minute_unit_within_window_multiplies() {
        assert_eq!(parse_duration("3 m is minute talk"), Some(180));
        assert_eq!(parse_duration("3 m check, the minute mark later"), Some(3));
        assert_eq!(parse_duration("2 minutes on this"), Some(120));
    }

    #[test]
    fn video_path_is_detected() {
        let requirements = detect_requirements("use the clip at /media/takes/intro.mp4");
        assert_eq!(
            requirements.video_path.as_deref(),
            Some("/media/takes/intro.mp4")
        );
    }

    #[test]
    fn context_needs_follow_intent() {
        let trending = determine_context_needs(QueryIntent::TrendingTopics, &[]);
        assert!(trending.should_fetch);
        assert_eq!(trending.limit, 10);
        assert_eq!(trending.sources.len(), 3);

        let script = determine_context_needs(QueryIntent::ScriptGeneration, &[]);
        assert_eq!(script.limit, 5);

        let voice = determine_context_needs(QueryIntent::VoiceCloning, &[]);
        assert!(!voice.should_fetch);
        assert!(voice.sources.is_empty());

        let general_no_topics = determine_context_needs(QueryIntent::GeneralQuery, &[]);
        assert!(!general_no_topics.should_fetch);

        let general = determine_context_needs(QueryIntent::GeneralQuery, &["rust".to_string()]);
        assert!(general.should_fetch);
        assert_eq!(general.limit, 3);
    }

    #[test]
    fn generative_json_is_normalized() {
        let raw = r#"```json
{
    "intent": "trending_topics",
    "topics": ["AI"],
    "context_sources": ["none"],
    "requirements": {"style": "casual"},
    "confidence": 1.4
}
```"#;
        let analysis = parse_generative(raw, "what is trending in AI for 30 seconds").unwrap();
        assert_eq!(analysis.intent, QueryIntent::TrendingTopics);
        assert_eq!(analysis.topics, vec!["AI".to_string()]);
        // "none" is overridden for context-dependent intents.
        assert_eq!(analysis.context_sources, SourceKind::ALL.to_vec());
        assert_eq!(analysis.requirements.style.as_deref(), Some("casual"));
        // Rule-based extraction fills the missing duration.
        assert_eq!(analysis.requirements.duration_secs, Some(30));
        assert!((analysis.confidence - 1.0).abs() < 1e-9);
        assert_eq!(analysis.origin, AnalysisOrigin::Generative);
    }

    #[test]
    fn unknown_intent_and_sources_fall_back() {
        let value = json!({
            "intent": "world_domination",
            "topics": "rust",
            "context_sources": ["twitter"],
            "confidence": "high"
        });
        let analysis = normalize_generative(&value, "tell me about Rust");
        assert_eq!(analysis.intent, QueryIntent::GeneralQuery);
        assert_eq!(analysis.topics, vec!["rust".to_string()]);
        assert_eq!(analysis.context_sources, SourceKind::ALL.to_vec());
        assert!((analysis.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn synthesis_intent_clears_sources_from_model() {
        let value = json!({
            "intent": "audio_generation",
            "topics": ["narration"],
            "context_sources": ["discussion", "video"]
        });
        let analysis = normalize_generative(&value, "generate audio narration");
        assert!(analysis.context_sources.is_empty());
    }

    #[tokio::test]
    async fn analyzer_falls_back_when_chain_is_empty() {
        let analyzer = IntentAnalyzer::new(Arc::new(FallbackChain::new(Vec::new())));
        let analysis = analyzer.analyze("what's happening in tech").await;
        assert_eq!(analysis.intent, QueryIntent::TrendingTopics);
        assert_eq!(analysis.origin, AnalysisOrigin::RuleBased);
    }

    #[tokio::test]
    async fn analyzer_uses_generative_result() {
        use crate::completion::MockProvider;
        let chain = FallbackChain::new(vec![Arc::new(MockProvider::succeeding(
            "mock",
            r#"{"intent": "script_generation", "topics": ["espresso"], "context_sources": ["all"], "requirements": {}, "confidence": 0.9}"#,
        )) as Arc<dyn crate::completion::CompletionProvider>]);
        let analyzer = IntentAnalyzer::new(Arc::new(chain));
        let analysis = analyzer.analyze("make something about espresso").await;
        assert_eq!(analysis.intent, QueryIntent::ScriptGeneration);
        assert_eq!(analysis.origin, AnalysisOrigin::Generative);
        assert_eq!(analysis.topics, vec!["espresso".to_string()]);
    }
}
