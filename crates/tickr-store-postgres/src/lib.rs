//! PostgreSQL-backed [`DurableStore`].
//!
//! Schema lives in `migrations/` as embedded sqlx migrations (run via
//! [`PgDurableStore::migrate`]), matching the durable store table spec.md §6
//! names: `jobs`, indexed on `status` for the recovery scan
//! ([`DurableStore::list_incomplete`]).
//!
//! Each trait method is a single self-contained statement or transaction, in
//! keeping with the "no long-lived transaction spans a scheduler/worker
//! boundary" rule in spec.md §4.1.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tickr_core::{DurableStore, JobId, JobRecord, JobStatus, QueueEntry, TickrError};

/// PostgreSQL implementation of [`DurableStore`].
#[derive(Clone)]
pub struct PgDurableStore {
    pool: PgPool,
}

impl PgDurableStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations. Call once at process start, before the
    /// scheduler's recovery scan.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        tracing::info!("running tickr-store-postgres migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Retrying => "retrying",
        JobStatus::Executing => "executing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> Result<JobStatus, TickrError> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "retrying" => Ok(JobStatus::Retrying),
        "executing" => Ok(JobStatus::Executing),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(TickrError::StorePersistError(anyhow!(
            "unrecognized job status in database: {other}"
        ))),
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<JobRecord, TickrError> {
    let status_str: String = row.try_get("status").map_err(persist_err)?;
    Ok(JobRecord {
        id: row.try_get("id").map_err(persist_err)?,
        job_type: row.try_get("job_type").map_err(persist_err)?,
        payload: row.try_get("payload").map_err(persist_err)?,
        status: status_from_str(&status_str)?,
        attempt: row.try_get::<i32, _>("attempt").map_err(persist_err)? as u32,
        max_attempts: row.try_get::<i32, _>("max_attempts").map_err(persist_err)? as u32,
        scheduled_at: row.try_get("scheduled_at").map_err(persist_err)?,
        created_at: row.try_get("created_at").map_err(persist_err)?,
        started_at: row.try_get("started_at").map_err(persist_err)?,
        finished_at: row.try_get("finished_at").map_err(persist_err)?,
        last_error: row.try_get("last_error").map_err(persist_err)?,
        worker_id: row
            .try_get::<Option<i32>, _>("worker_id")
            .map_err(persist_err)?
            .map(|w| w as u32),
        result: row.try_get("result").map_err(persist_err)?,
    })
}

fn persist_err(e: sqlx::Error) -> TickrError {
    TickrError::StorePersistError(e.into())
}

#[async_trait]
impl DurableStore for PgDurableStore {
    async fn insert(&self, mut record: JobRecord) -> Result<JobId, TickrError> {
        record.clear_worker_if_not_executing();

        // `id` is assigned by the `jobs.id BIGSERIAL` column, not generated
        // here: `RETURNING id` reports the value Postgres chose.
        let row = sqlx::query(
            r#"
            INSERT INTO jobs
                (job_type, payload, status, attempt, max_attempts, scheduled_at,
                 created_at, started_at, finished_at, last_error, worker_id, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&record.job_type)
        .bind(&record.payload)
        .bind(status_to_str(record.status))
        .bind(record.attempt as i32)
        .bind(record.max_attempts as i32)
        .bind(record.scheduled_at)
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(&record.last_error)
        .bind(record.worker_id.map(|w| w as i32))
        .bind(&record.result)
        .fetch_one(&self.pool)
        .await
        .map_err(persist_err)?;

        row.try_get("id").map_err(persist_err)
    }

    async fn fetch(&self, id: JobId) -> Result<JobRecord, TickrError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persist_err)?
            .ok_or(TickrError::NotFoundError(id))?;

        row_to_record(&row)
    }

    async fn update(&self, mut record: JobRecord) -> Result<(), TickrError> {
        record.clear_worker_if_not_executing();

        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = $2,
                attempt = $3,
                scheduled_at = $4,
                started_at = $5,
                finished_at = $6,
                last_error = $7,
                worker_id = $8,
                result = $9
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(status_to_str(record.status))
        .bind(record.attempt as i32)
        .bind(record.scheduled_at)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(&record.last_error)
        .bind(record.worker_id.map(|w| w as i32))
        .bind(&record.result)
        .execute(&self.pool)
        .await
        .map_err(persist_err)?;

        if result.rows_affected() == 0 {
            return Err(TickrError::NotFoundError(record.id));
        }
        Ok(())
    }

    async fn list_incomplete(&self) -> Result<Vec<QueueEntry>, TickrError> {
        let rows = sqlx::query("SELECT id, scheduled_at FROM jobs WHERE status IN ('pending', 'retrying')")
            .fetch_all(&self.pool)
            .await
            .map_err(persist_err)?;

        rows.iter()
            .map(|row| {
                Ok(QueueEntry {
                    id: row.try_get("id").map_err(persist_err)?,
                    scheduled_at: row
                        .try_get::<DateTime<Utc>, _>("scheduled_at")
                        .map_err(persist_err)?,
                })
            })
            .collect()
    }
}
