// src/completion/mod.rs
//! Generative completions with ordered provider fallback.
//!
//! Every generative step in the pipeline (intent analysis, summarization,
//! script generation) goes through a [`FallbackChain`]: providers are tried
//! in configuration order, the first success wins, and exhaustion is an
//! ordinary value rather than a panic so callers can switch to their
//! deterministic fallback.

pub mod providers;
pub mod sanitize;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{AppConfig, ProviderChoice};
pub use providers::{CompletionProvider, MockProvider, OpenAiCompatibleProvider};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "completion_requests_total",
            "Completion attempts per provider and outcome."
        );
        describe_counter!(
            "completion_fallback_exhausted_total",
            "Completion calls where every configured provider failed."
        );
    });
}

/// One chat-completion call: prompts plus sampling knobs.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// What a fallback run produced. `Exhausted` carries one error per attempted
/// provider, in attempt order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Completed {
        content: String,
        provider: &'static str,
    },
    Exhausted {
        errors: Vec<String>,
    },
}

impl CompletionOutcome {
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Completed { content, .. } => Some(content),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Self::Completed { provider, .. } => Some(provider),
            Self::Exhausted { .. } => None,
        }
    }

    pub fn error_summary(&self) -> Option<String> {
        match self {
            Self::Completed { .. } => None,
            Self::Exhausted { errors } if errors.is_empty() => {
                Some("no completion providers configured".to_string())
            }
            Self::Exhausted { errors } => Some(errors.join("; ")),
        }
    }
}

pub struct FallbackChain {
    providers: Vec<Arc<dyn CompletionProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>) -> Self {
        ensure_metrics_described();
        Self { providers }
    }

    /// Candidate order comes from the configured preference; providers
    /// without credentials are skipped entirely.
    pub fn from_config(config: &AppConfig) -> Self {
        let order = match config.preferred_provider {
            ProviderChoice::OpenRouter => [ProviderChoice::OpenRouter, ProviderChoice::Groq],
            ProviderChoice::Groq => [ProviderChoice::Groq, ProviderChoice::OpenRouter],
        };
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::new();
        for choice in order {
            match choice {
                ProviderChoice::OpenRouter => {
                    if let Some(key) = config.openrouter_api_key.as_deref() {
                        providers.push(Arc::new(OpenAiCompatibleProvider::openrouter(
                            key,
                            config.openrouter_model.clone(),
                        )));
                    }
                }
                ProviderChoice::Groq => {
                    if let Some(key) = config.groq_api_key.as_deref() {
                        providers.push(Arc::new(OpenAiCompatibleProvider::groq(
                            key,
                            config.groq_model.clone(),
                        )));
                    }
                }
            }
        }
        Self::new(providers)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Try providers in order; first non-empty completion wins.
    pub async fn run(&self, request: &CompletionRequest) -> CompletionOutcome {
        let mut errors = Vec::new();
        for provider in &self.providers {
            match provider.complete(request).await {
                Ok(content) => {
                    counter!(
                        "completion_requests_total",
                        "provider" => provider.name(),
                        "outcome" => "ok"
                    )
                    .increment(1);
                    tracing::debug!(
                        provider = provider.name(),
                        model = provider.model(),
                        "completion succeeded"
                    );
                    return CompletionOutcome::Completed {
                        content,
                        provider: provider.name(),
                    };
                }
                Err(error) => {
                    counter!(
                        "completion_requests_total",
                        "provider" => provider.name(),
                        "outcome" => "error"
                    )
                    .increment(1);
                    tracing::warn!(
                        provider = provider.name(),
                        error = %error,
                        "completion provider failed, trying next"
                    );
                    errors.push(format!("{}: {error:#}", provider.name()));
                }
            }
        }
        counter!("completion_fallback_exhausted_total").increment(1);
        CompletionOutcome::Exhausted { errors }
    }
}
