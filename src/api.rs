// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::cache::CacheStats;
use crate::intent::QueryAnalysis;
use crate::orchestrator::{OrchestratorResult, TrendOrchestrator};
use crate::sources::SourceKind;

const DEFAULT_TRENDING_LIMIT: usize = 10;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<TrendOrchestrator>,
}

pub fn create_router(orchestrator: Arc<TrendOrchestrator>) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/query", post(process_query))
        .route("/analyze", post(analyze_query))
        .route("/trending/{topic}", get(trending))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(cache_clear))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct QueryReq {
    query: String,
}

async fn process_query(
    State(state): State<AppState>,
    Json(body): Json<QueryReq>,
) -> Json<OrchestratorResult> {
    Json(state.orchestrator.process_query(&body.query).await)
}

async fn analyze_query(
    State(state): State<AppState>,
    Json(body): Json<QueryReq>,
) -> Json<QueryAnalysis> {
    Json(state.orchestrator.analyze_query(&body.query).await)
}

#[derive(serde::Deserialize)]
struct TrendingParams {
    #[serde(default)]
    sources: Option<String>, // comma-separated kinds, e.g. "video,news"
    #[serde(default)]
    limit: Option<usize>,
}

async fn trending(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<TrendingParams>,
) -> Json<Value> {
    let kinds = parse_kinds(params.sources.as_deref());
    let limit = params.limit.unwrap_or(DEFAULT_TRENDING_LIMIT);
    let context = state
        .orchestrator
        .trending_context(&topic, &kinds, limit)
        .await;
    Json(context.data())
}

fn parse_kinds(raw: Option<&str>) -> Vec<SourceKind> {
    let Some(raw) = raw else {
        return SourceKind::ALL.to_vec();
    };
    let kinds: Vec<SourceKind> = raw.split(',').filter_map(SourceKind::parse).collect();
    if kinds.is_empty() {
        SourceKind::ALL.to_vec()
    } else {
        kinds
    }
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache().stats())
}

async fn cache_clear(State(state): State<AppState>) -> &'static str {
    state.orchestrator.cache().clear();
    "cleared"
}
