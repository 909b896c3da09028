// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /analyze  (intent contract for UI consumers)
// - POST /query    (trending flow end to end)
// - GET /trending/{topic}  (sources + limit query params)
// - GET /cache/stats, POST /cache/clear

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use trend_context_analyzer::cache::ContextCache;
use trend_context_analyzer::config::AppConfig;
use trend_context_analyzer::orchestrator::TrendOrchestrator;
use trend_context_analyzer::sources::types::{
    ArticleFields, ContentItem, DiscussionFields, ItemDetails, VideoFields,
};
use trend_context_analyzer::sources::{SourceKind, SourceProvider, StaticSource};
use trend_context_analyzer::{api, create_router};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn discussion(title: &str) -> ContentItem {
    ContentItem {
        title: title.to_string(),
        body: "Long thread with detailed breakdowns.".to_string(),
        url: "https://forum.example/post".to_string(),
        author: "afan".to_string(),
        age_hours: Some(4.0),
        published_at: None,
        details: ItemDetails::Discussion(DiscussionFields {
            community: "programming".to_string(),
            score: 420,
            num_replies: 55,
            approval_ratio: Some(0.96),
            engagement_score: None,
            top_replies: Vec::new(),
        }),
    }
}

fn video(title: &str) -> ContentItem {
    ContentItem {
        title: title.to_string(),
        body: "A ten minute explainer.".to_string(),
        url: "https://video.example/watch".to_string(),
        author: "Veritasium".to_string(),
        age_hours: Some(9.0),
        published_at: None,
        details: ItemDetails::Video(VideoFields {
            views: Some(1_500_000),
            likes: Some(80_000),
            comments: Some(4_000),
            engagement_ratio: Some(5.6),
            tags: vec!["science".to_string()],
        }),
    }
}

fn article(title: &str) -> ContentItem {
    ContentItem {
        title: title.to_string(),
        body: "Coverage of the announcement.".to_string(),
        url: "https://news.example/story".to_string(),
        author: "Reuters".to_string(),
        age_hours: Some(2.0),
        published_at: None,
        details: ItemDetails::Article(ArticleFields {
            keywords: vec!["update".to_string()],
            is_major_outlet: true,
            credibility: Some(1.0),
        }),
    }
}

/// Build the same Router the binary uses, backed by fixture sources and no
/// completion providers (deterministic summaries).
fn test_router() -> Router {
    let providers: Vec<Arc<dyn SourceProvider>> = vec![
        Arc::new(StaticSource::new(
            SourceKind::Discussion,
            "static-discussions",
            vec![discussion("Big rust thread"), discussion("Another take")],
        )),
        Arc::new(StaticSource::new(
            SourceKind::Video,
            "static-videos",
            vec![video("Rust explained")],
        )),
        Arc::new(StaticSource::new(
            SourceKind::Article,
            "static-articles",
            vec![article("Rust release update"), article("Industry reaction")],
        )),
    ];
    let orchestrator = TrendOrchestrator::new(
        &AppConfig::default(),
        providers,
        Arc::new(ContextCache::new()),
    );
    api::create_router(Arc::new(orchestrator))
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json body")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    let body = String::from_utf8(bytes).expect("utf8");
    assert_eq!(body.trim(), "ok", "health body should be 'ok'");
}

#[tokio::test]
async fn api_analyze_returns_expected_json_fields() {
    let app = test_router();

    let payload = json!({ "query": "Write a script about Rust" });
    let req = Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /analyze");

    let resp = app.oneshot(req).await.expect("oneshot /analyze");
    assert!(
        resp.status().is_success(),
        "POST /analyze should be 2xx, got {}",
        resp.status()
    );

    let v = read_json(resp).await;

    // Contract checks for UI consumers
    assert_eq!(v["intent"], "script_generation");
    assert!(v.get("topics").is_some(), "missing 'topics'");
    assert!(v.get("context_sources").is_some(), "missing 'context_sources'");
    assert!(v.get("requirements").is_some(), "missing 'requirements'");
    assert!(v.get("confidence").is_some(), "missing 'confidence'");
    assert_eq!(v["origin"], "rule_based");
}

#[tokio::test]
async fn api_query_runs_the_trending_flow() {
    let app = test_router();

    let payload = json!({ "query": "What's trending about rust?" });
    let req = Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /query");

    let resp = app.oneshot(req).await.expect("oneshot /query");
    assert!(
        resp.status().is_success(),
        "POST /query should be 2xx, got {}",
        resp.status()
    );

    let v = read_json(resp).await;
    assert_eq!(v["success"], true, "query should succeed: {v}");
    assert_eq!(v["intent"], "trending_topics");

    let data = &v["data"];
    assert_eq!(data["total_items"], 5, "all fixture items should surface");
    assert_eq!(data["sources"]["discussion"]["count"], 2);
    assert_eq!(data["sources"]["video"]["count"], 1);
    assert_eq!(data["sources"]["article"]["count"], 2);
    assert!(
        data["summary"]["text"]
            .as_str()
            .expect("summary text")
            .contains("TREND ANALYSIS"),
        "structured summary should carry the trend section"
    );
    assert!(v["message"]
        .as_str()
        .expect("message")
        .starts_with("Retrieved 5 trending items"));
}

#[tokio::test]
async fn api_trending_honors_sources_and_limit_params() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/trending/rust?sources=news&limit=1")
        .body(Body::empty())
        .expect("build GET /trending");

    let resp = app.oneshot(req).await.expect("oneshot /trending");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["topic"], "rust");
    assert_eq!(v["sources"]["article"]["count"], 1, "limit=1 should cap items");
    assert!(
        v["sources"].get("discussion").is_none(),
        "unrequested kinds must not appear: {v}"
    );
    assert_eq!(v["total_items"], 1);
}

#[tokio::test]
async fn api_cache_stats_and_clear_roundtrip() {
    let app = test_router();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/cache/stats")
                .body(Body::empty())
                .expect("build GET /cache/stats"),
        )
        .await
        .expect("oneshot /cache/stats");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["size"], 0);
    assert!(v.get("hit_rate").is_some(), "missing 'hit_rate'");

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cache/clear")
                .body(Body::empty())
                .expect("build POST /cache/clear"),
        )
        .await
        .expect("oneshot /cache/clear");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "cleared");
}

#[tokio::test]
async fn router_reexport_matches_api_router() {
    // The lib-level re-export must build the same surface.
    let providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
    let orchestrator = TrendOrchestrator::new(
        &AppConfig::default(),
        providers,
        Arc::new(ContextCache::new()),
    );
    let app = create_router(Arc::new(orchestrator));

    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("build GET /health"),
        )
        .await
        .expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
}
