//! Round-trip tests against a real Postgres instance.
//!
//! Ignored by default since they need `DATABASE_URL` pointed at a scratch
//! database; run with:
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/tickr_test cargo test -p tickr-store-postgres -- --ignored
//! ```

use serde_json::json;
use sqlx::PgPool;
use tickr_core::{DurableStore, JobRecord, JobStatus};
use tickr_store_postgres::PgDurableStore;

async fn connect() -> PgDurableStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let pool = PgPool::connect(&url).await.expect("connect to postgres");
    let store = PgDurableStore::new(pool);
    store.migrate().await.expect("run migrations");
    store
}

#[tokio::test]
#[ignore]
async fn insert_fetch_round_trip() {
    let store = connect().await;
    let record = JobRecord::new("email", json!({"to": "a@example.com"}), chrono::Utc::now(), 3);

    let id = store.insert(record).await.expect("insert");
    let fetched = store.fetch(id).await.expect("fetch");

    assert_eq!(fetched.id, id);
    assert_eq!(fetched.job_type, "email");
    assert_eq!(fetched.status, JobStatus::Pending);
    assert_eq!(fetched.attempt, 0);
}

#[tokio::test]
#[ignore]
async fn update_clears_worker_id_when_not_executing() {
    let store = connect().await;
    let record = JobRecord::new("email", json!({}), chrono::Utc::now(), 3);
    let id = store.insert(record).await.expect("insert");

    let mut fetched = store.fetch(id).await.expect("fetch");
    fetched.status = JobStatus::Completed;
    fetched.worker_id = Some(7); // caller forgot to clear it; store must enforce invariant 4
    store.update(fetched).await.expect("update");

    let after = store.fetch(id).await.expect("fetch");
    assert_eq!(after.status, JobStatus::Completed);
    assert!(after.worker_id.is_none());
}

#[tokio::test]
#[ignore]
async fn list_incomplete_only_returns_pending_and_retrying() {
    let store = connect().await;

    let pending = JobRecord::new("email", json!({}), chrono::Utc::now(), 3);
    let pending_id = store.insert(pending).await.expect("insert pending");

    let mut completed = JobRecord::new("email", json!({}), chrono::Utc::now(), 3);
    completed.status = JobStatus::Completed;
    store.insert(completed).await.expect("insert completed");

    let incomplete = store.list_incomplete().await.expect("list_incomplete");
    assert!(incomplete.iter().any(|e| e.id == pending_id));
    assert_eq!(incomplete.len(), 1);
}

#[tokio::test]
#[ignore]
async fn fetch_missing_id_is_not_found() {
    let store = connect().await;
    let result = store.fetch(i64::MAX).await;
    assert!(matches!(result, Err(tickr_core::TickrError::NotFoundError(_))));
}
