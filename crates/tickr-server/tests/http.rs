//! HTTP-level tests for the ingress routes, driven through the router with
//! `tower::ServiceExt::oneshot` against in-memory store doubles so no
//! Postgres or Redis instance is required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tickr_core::{DurableStore, FastStore, JobStatus, Scheduler};
use tickr_server::app::build_app;
use tickr_server::ingress::IngressAdapter;
use tickr_server::routes::AppState;
use tickr_testing::{InMemoryDurableStore, InMemoryFastStore};
use tower::ServiceExt;

fn test_app() -> (axum::Router, Arc<InMemoryDurableStore>) {
    let durable = Arc::new(InMemoryDurableStore::new());
    let fast = Arc::new(InMemoryFastStore::new());
    let durable_dyn: Arc<dyn DurableStore> = durable.clone();
    let fast_dyn: Arc<dyn FastStore> = fast;

    let (scheduler, _handoff_rx) = Scheduler::new(durable_dyn.clone(), fast_dyn);
    let ingress = Arc::new(IngressAdapter::new(durable_dyn, scheduler, 3));
    let app = build_app(AppState { ingress });
    (app, durable)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

#[tokio::test]
async fn health_reports_up() {
    let (app, _durable) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/api/v1/health/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], 200);
}

#[tokio::test]
async fn submit_job_persists_and_returns_envelope() {
    let (app, durable) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs/")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"jobtype": "email", "payload": {"to": "a@example.com"}, "delay": 0}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let job_id = body["data"]["jobID"].as_i64().expect("jobID is an integer");

    let record = durable.fetch(job_id).await.expect("job was persisted");
    assert_eq!(record.job_type, "email");
    assert_eq!(record.status, JobStatus::Pending);
    assert_eq!(record.max_attempts, 3);
}

#[tokio::test]
async fn submit_job_rejects_empty_jobtype() {
    let (app, _durable) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs/")
        .header("content-type", "application/json")
        .body(Body::from(json!({"jobtype": "", "delay": 0}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn submit_job_rejects_negative_delay() {
    let (app, _durable) = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/jobs/")
        .header("content-type", "application/json")
        .body(Body::from(json!({"jobtype": "email", "delay": -5}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
