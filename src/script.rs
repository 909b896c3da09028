// src/script.rs
//! Monologue script generation through the completion fallback chain.
//!
//! A script request carries a topic, a target duration and a delivery style.
//! The prompt converts duration into a word budget at the configured speaking
//! rate and, when a trending-context summary is supplied, embeds it so the
//! script covers what is actually being talked about.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::completion::{sanitize, CompletionOutcome, CompletionRequest, FallbackChain};
use crate::config::DEFAULT_SPEAKING_RATE_WPM;

pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_STYLE: &str = "informative and engaging";

const MIN_COMPLETION_TOKENS: u32 = 100;
const MAX_COMPLETION_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct ScriptRequest {
    pub topic: String,
    pub duration_seconds: u64,
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ScriptRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            duration_seconds: DEFAULT_DURATION_SECS,
            style: DEFAULT_STYLE.to_string(),
            context: None,
        }
    }

    pub fn with_duration(mut self, duration_seconds: u64) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptMetadata {
    pub topic: String,
    pub provider: &'static str,
    pub requested_duration_seconds: u64,
    pub estimated_duration_seconds: f64,
    pub target_word_count: u32,
    pub actual_word_count: usize,
    pub style: String,
    pub speaking_rate_wpm: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedScript {
    pub script: String,
    pub metadata: ScriptMetadata,
}

pub struct ScriptGenerator {
    chain: Arc<FallbackChain>,
    speaking_rate_wpm: u32,
}

impl ScriptGenerator {
    pub fn new(chain: Arc<FallbackChain>, speaking_rate_wpm: u32) -> Self {
        let speaking_rate_wpm = if speaking_rate_wpm == 0 {
            DEFAULT_SPEAKING_RATE_WPM
        } else {
            speaking_rate_wpm
        };
        Self {
            chain,
            speaking_rate_wpm,
        }
    }

    pub async fn generate(&self, request: &ScriptRequest) -> Result<GeneratedScript> {
        if self.chain.is_empty() {
            bail!("no completion provider configured; set OPENROUTER_API_KEY or GROQ_API_KEY");
        }
        let target_word_count = target_word_count(request.duration_seconds, self.speaking_rate_wpm);
        let prompt = build_script_prompt(request, target_word_count, self.speaking_rate_wpm);
        let completion = CompletionRequest::new(prompt)
            .with_temperature(0.7)
            .with_max_tokens(completion_token_budget(target_word_count));

        match self.chain.run(&completion).await {
            CompletionOutcome::Completed { content, provider } => {
                let cleaned = sanitize::clean_script_text(&content);
                // Cleanup can eat everything on a degenerate reply; fall back
                // to the raw text rather than returning an empty script.
                let script = if cleaned.is_empty() {
                    content.trim().to_string()
                } else {
                    cleaned
                };
                let actual_word_count = script.split_whitespace().count();
                let estimated = estimated_duration_secs(actual_word_count, self.speaking_rate_wpm);
                tracing::info!(
                    topic = %request.topic,
                    provider,
                    words = actual_word_count,
                    "script generated"
                );
                Ok(GeneratedScript {
                    script,
                    metadata: ScriptMetadata {
                        topic: request.topic.clone(),
                        provider,
                        requested_duration_seconds: request.duration_seconds,
                        estimated_duration_seconds: estimated,
                        target_word_count,
                        actual_word_count,
                        style: request.style.clone(),
                        speaking_rate_wpm: self.speaking_rate_wpm,
                    },
                })
            }
            outcome @ CompletionOutcome::Exhausted { .. } => {
                bail!(
                    "all completion providers failed: {}",
                    outcome
                        .error_summary()
                        .unwrap_or_else(|| "unknown error".to_string())
                )
            }
        }
    }
}

fn target_word_count(duration_seconds: u64, speaking_rate_wpm: u32) -> u32 {
    ((duration_seconds as f64 / 60.0) * speaking_rate_wpm as f64) as u32
}

fn completion_token_budget(target_word_count: u32) -> u32 {
    (target_word_count * 2).clamp(MIN_COMPLETION_TOKENS, MAX_COMPLETION_TOKENS)
}

fn estimated_duration_secs(word_count: usize, speaking_rate_wpm: u32) -> f64 {
    let secs = (word_count as f64 / speaking_rate_wpm as f64) * 60.0;
    (secs * 10.0).round() / 10.0
}

fn build_script_prompt(request: &ScriptRequest, target_word_count: u32, wpm: u32) -> String {
    let mut prompt = format!(
        "Write a {duration}-second monologue script about: {topic}\n\n\
         Style: {style}\n\
         Target word count: approximately {words} words (for {duration} seconds at {wpm} words per minute)\n",
        duration = request.duration_seconds,
        topic = request.topic,
        style = request.style,
        words = target_word_count,
    );

    if let Some(context) = &request.context {
        prompt.push_str(&format!("\nContext from trending data:\n{context}\n"));
        prompt.push_str(
            "\nIMPORTANT: Use the context information above to write about the ACTUAL CONTENT and topics. \
             DO NOT mention discussion forums, video platforms, or other sources in the script. \
             Focus on the subject matter itself, not where the information came from.\n",
        );
    }

    prompt.push_str(
        r#"
VOICE ENHANCEMENT: You can use bracketed emotion and delivery tags to make the script more expressive when voiced.
Available tags (use sparingly and naturally):
- Emotions: [happy], [excited], [sad], [angry], [nervous], [curious], [mischievously], [sarcastic]
- Delivery: [whispers], [shouts], [speaking softly], [calm], [slowly], [rushed]
- Sounds: [laughs], [chuckles], [giggles], [sighs], [clears throat]
- Timing: [pause], [long pause]

Example: "This is incredible! [excited] The results show a 300% increase [pause] which nobody expected."

Use these tags naturally to enhance emotion and pacing. Don't overuse them - 2-4 tags per 30 seconds is ideal.

Requirements:
- Write in a conversational, engaging tone suitable for spoken delivery
- Structure the content with a clear beginning, middle, and end
- Make it interesting and informative
- Write ONLY the script content, no stage directions or meta-commentary
- Include emotion/delivery tags where appropriate to enhance expressiveness
- Ensure it flows naturally when read aloud

Script:"#,
    );
    prompt
}
