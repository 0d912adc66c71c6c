//! Axum router assembly: routes, request logging, CORS.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{health, submit_job, AppState};

/// Build the full HTTP application. `TraceLayer` supplies the
/// `METHOD PATH elapsed-duration` request logging spec.md §6 requires, the
/// same layer `fourthplaces-mntogether`'s `server::app::build_app` uses.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health/", get(health))
        .route("/api/v1/jobs/", post(submit_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
