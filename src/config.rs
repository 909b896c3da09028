// src/config.rs
//! Runtime configuration read from the environment (`.env` friendly).
//!
//! Generative providers are optional: the pipeline degrades to deterministic
//! output when no key is configured, so `from_env` never fails. Invalid
//! values fall back to defaults with a warning instead of aborting startup.

use serde::Serialize;
use std::env;
use std::net::SocketAddr;

pub const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_SPEAKING_RATE_WPM: u32 = 150;
pub const DEFAULT_ANALYSIS_CONFIG_PATH: &str = "config/analysis.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    OpenRouter,
    Groq,
}

impl ProviderChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "openrouter" => Some(Self::OpenRouter),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub preferred_provider: ProviderChoice,
    pub speaking_rate_wpm: u32,
    pub news_rss_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub analysis_config_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_model: DEFAULT_OPENROUTER_MODEL.to_string(),
            groq_api_key: None,
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            preferred_provider: ProviderChoice::OpenRouter,
            speaking_rate_wpm: DEFAULT_SPEAKING_RATE_WPM,
            news_rss_url: None,
            bind_addr: default_bind_addr(),
            analysis_config_path: DEFAULT_ANALYSIS_CONFIG_PATH.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let preferred_provider = match env::var("INFERENCE_PROVIDER") {
            Ok(raw) => ProviderChoice::parse(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unrecognized INFERENCE_PROVIDER, using openrouter");
                ProviderChoice::OpenRouter
            }),
            Err(_) => ProviderChoice::OpenRouter,
        };

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "unparseable BIND_ADDR, using default");
                default_bind_addr()
            }),
            Err(_) => default_bind_addr(),
        };

        Self {
            openrouter_api_key: non_empty_var("OPENROUTER_API_KEY"),
            openrouter_model: env_or("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL),
            groq_api_key: non_empty_var("GROQ_API_KEY"),
            groq_model: env_or("GROQ_MODEL", DEFAULT_GROQ_MODEL),
            preferred_provider,
            speaking_rate_wpm: env::var("SPEAKING_RATE_WPM")
                .ok()
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|wpm| *wpm > 0)
                .unwrap_or(DEFAULT_SPEAKING_RATE_WPM),
            news_rss_url: non_empty_var("NEWS_RSS_URL"),
            bind_addr,
            analysis_config_path: env_or("ANALYSIS_CONFIG_PATH", DEFAULT_ANALYSIS_CONFIG_PATH),
        }
    }

    /// True when at least one generative provider has credentials.
    pub fn has_completion_api(&self) -> bool {
        self.openrouter_api_key.is_some() || self.groq_api_key.is_some()
    }

    /// Env vars the preferred provider needs but does not have.
    pub fn missing_configs(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.preferred_provider {
            ProviderChoice::OpenRouter if self.openrouter_api_key.is_none() => {
                missing.push("OPENROUTER_API_KEY");
            }
            ProviderChoice::Groq if self.groq_api_key.is_none() => {
                missing.push("GROQ_API_KEY");
            }
            _ => {}
        }
        missing
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    non_empty_var(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "OPENROUTER_API_KEY",
        "OPENROUTER_MODEL",
        "GROQ_API_KEY",
        "GROQ_MODEL",
        "INFERENCE_PROVIDER",
        "SPEAKING_RATE_WPM",
        "NEWS_RSS_URL",
        "BIND_ADDR",
        "ANALYSIS_CONFIG_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn defaults_when_nothing_is_set() {
        clear_env();
        let config = AppConfig::from_env();
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.openrouter_model, DEFAULT_OPENROUTER_MODEL);
        assert_eq!(config.preferred_provider, ProviderChoice::OpenRouter);
        assert_eq!(config.speaking_rate_wpm, DEFAULT_SPEAKING_RATE_WPM);
        assert_eq!(config.bind_addr, default_bind_addr());
        assert!(!config.has_completion_api());
        assert_eq!(config.missing_configs(), vec!["OPENROUTER_API_KEY"]);
    }

    #[test]
    #[serial]
    fn reads_provider_preference_and_keys() {
        clear_env();
        env::set_var("GROQ_API_KEY", "gsk-test");
        env::set_var("INFERENCE_PROVIDER", "Groq");
        env::set_var("BIND_ADDR", "127.0.0.1:9001");
        let config = AppConfig::from_env();
        assert_eq!(config.preferred_provider, ProviderChoice::Groq);
        assert_eq!(config.groq_api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.bind_addr.port(), 9001);
        assert!(config.has_completion_api());
        assert!(config.missing_configs().is_empty());
        clear_env();
    }

    #[test]
    #[serial]
    fn blank_key_counts_as_unset_and_bad_values_fall_back() {
        clear_env();
        env::set_var("OPENROUTER_API_KEY", "   ");
        env::set_var("INFERENCE_PROVIDER", "azure");
        env::set_var("SPEAKING_RATE_WPM", "zero");
        env::set_var("BIND_ADDR", "not-an-addr");
        let config = AppConfig::from_env();
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.preferred_provider, ProviderChoice::OpenRouter);
        assert_eq!(config.speaking_rate_wpm, DEFAULT_SPEAKING_RATE_WPM);
        assert_eq!(config.bind_addr, default_bind_addr());
        clear_env();
    }
}
