//! HTTP surface for the Festplan backend.
//!
//! # Responsibility
//! - Route polling/auto-save traffic onto the core plan service.
//! - Host the generative-text helper endpoints and static assets.
//!
//! # Invariants
//! - Handlers never hold storage locks across await points; core calls run
//!   on the blocking pool.

use axum::routing::{get, post};
use axum::Router;
use festplan_core::{PlanService, SqlitePartitionStore};
use std::path::PathBuf;
use std::sync::Arc;

pub mod ai;
pub mod config;
pub mod handlers;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PlanService<SqlitePartitionStore>>,
    /// Absent when no API key is configured; AI routes answer 503 then.
    pub ai: Option<Arc<ai::AiClient>>,
    pub static_dir: PathBuf,
}

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/static/*path", get(handlers::static_asset))
        .route("/healthz", get(handlers::healthz))
        .route("/api/data", get(handlers::get_data).post(handlers::post_data))
        .route("/api/ai/recipe", post(ai::recipe_handler))
        .route("/api/ai/suggest", post(ai::suggest_handler))
        .route("/api/ai/categorize", post(ai::categorize_handler))
        .with_state(state)
}
