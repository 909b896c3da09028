// src/completion/providers.rs
//! Chat-completion providers speaking the OpenAI-compatible wire format.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::CompletionRequest;

/// Generative calls get a generous budget; source fetches use a shorter one.
pub const GENERATIVE_TIMEOUT: Duration = Duration::from_secs(30);

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
    /// Provider name for diagnostics and fallback error reports.
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// One provider struct covers every OpenAI-compatible endpoint; the
/// constructors pin down endpoint and diagnostic name.
pub struct OpenAiCompatibleProvider {
    http: reqwest::Client,
    endpoint: &'static str,
    api_key: String,
    model: String,
    name: &'static str,
}

impl OpenAiCompatibleProvider {
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_endpoint(OPENROUTER_ENDPOINT, "openrouter", api_key, model)
    }

    pub fn groq(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_endpoint(GROQ_ENDPOINT, "groq", api_key, model)
    }

    fn with_endpoint(
        endpoint: &'static str,
        name: &'static str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("trend-context-analyzer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(GENERATIVE_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint,
            api_key: api_key.into(),
            model: model.into(),
            name,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("no API key configured");
        }

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let snippet: String = detail.chars().take(200).collect();
            bail!("{} returned {status}: {snippet}", self.name);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("{} sent an unparseable response", self.name))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        let content = content.trim().to_string();
        if content.is_empty() {
            bail!("{} returned an empty completion", self.name);
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic provider for tests and offline runs.
pub struct MockProvider {
    name: &'static str,
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn succeeding(name: &'static str, content: impl Into<String>) -> Self {
        Self {
            name,
            reply: Ok(content.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, error: impl Into<String>) -> Self {
        Self {
            name,
            reply: Err(error.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times `complete` ran; lets ordering tests assert short-circuits.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(content) => Ok(content.clone()),
            Err(error) => bail!("{error}"),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        "mock"
    }
}
