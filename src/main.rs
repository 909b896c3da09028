//! Trend Context Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring source connectors, the orchestrator,
//! shared state, and middleware.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_context_analyzer::api;
use trend_context_analyzer::cache::{ContextCache, DEFAULT_TTL};
use trend_context_analyzer::config::AppConfig;
use trend_context_analyzer::metrics::Metrics;
use trend_context_analyzer::orchestrator::TrendOrchestrator;
use trend_context_analyzer::sources::{NewsRssSource, SourceProvider, DEFAULT_NEWS_RSS_BASE};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_context_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments. This enables
    // OPENROUTER_API_KEY / GROQ_API_KEY / NEWS_RSS_URL from .env.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::from_env();

    // Install the Prometheus recorder before anything registers counters.
    let metrics = Metrics::init(DEFAULT_TTL.as_secs());

    let news_url = config
        .news_rss_url
        .clone()
        .unwrap_or_else(|| DEFAULT_NEWS_RSS_BASE.to_string());
    let providers: Vec<Arc<dyn SourceProvider>> =
        vec![Arc::new(NewsRssSource::from_url(news_url))];

    let cache = Arc::new(ContextCache::new());
    let orchestrator = Arc::new(TrendOrchestrator::new(&config, providers, cache));

    let router = api::create_router(orchestrator).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
