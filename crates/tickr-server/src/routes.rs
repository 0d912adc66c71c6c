//! HTTP handlers for the two endpoints spec.md §6 names.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::ingress::{IngressAdapter, SubmitJobRequest, SubmitJobResponse};
use crate::response::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub ingress: Arc<IngressAdapter>,
}

pub async fn health() -> impl axum::response::IntoResponse {
    ApiResponse::ok(StatusCode::OK, "REST API Up and Working!!!", ())
}

pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitJobResponse>>), tickr_core::TickrError> {
    let submitted = state.ingress.submit(req).await?;
    Ok(ApiResponse::ok(StatusCode::OK, "job submitted", submitted))
}
