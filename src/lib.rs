// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod completion;
pub mod config;
pub mod intent;
pub mod metrics;
pub mod orchestrator;
pub mod script;
pub mod sentiment;
pub mod sources;
pub mod summary;

// Analysis pipeline (scoring, trends, themes, correlations)
pub mod analyze;

// ---- Re-exports for stable public API ----
// Convenient router access: `trend_context_analyzer::api::create_router` or
// `trend_context_analyzer::create_router`
pub use crate::api::create_router;
pub use crate::orchestrator::{OrchestratorResult, TrendOrchestrator};

// Re-export the cache for easy use in bins/tests
pub use crate::cache::ContextCache;
