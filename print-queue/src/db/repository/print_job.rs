//! Print Job Repository
//!
//! Durable store for `print_queue`. The three pipeline transitions
//! (`claim`, `mark_printed`, `record_failure`) are single
//! `UPDATE ... WHERE status = ? RETURNING *` statements, so the row
//! itself is the lock and no read-modify-write window exists.

use super::{RepoError, RepoResult};
use crate::db::models::print_job::DEFAULT_MAX_ATTEMPTS;
use crate::db::models::{PrintJob, PrintJobStatus};
use crate::utils::time::now_millis;
use sqlx::{Executor, Sqlite, SqlitePool};
use std::time::Duration;

/// Message recorded on jobs whose `printing` lease expired
pub const LEASE_EXPIRED_MESSAGE: &str = "print lease expired";

/// Create a pending job with the default retry ceiling
///
/// Accepts any executor so it can join the caller's transaction.
pub async fn create<'e, E>(
    executor: E,
    order_id: i64,
    printer_name: Option<&str>,
) -> RepoResult<PrintJob>
where
    E: Executor<'e, Database = Sqlite>,
{
    create_with_limit(executor, order_id, printer_name, DEFAULT_MAX_ATTEMPTS).await
}

/// Create a pending job with an explicit retry ceiling
pub async fn create_with_limit<'e, E>(
    executor: E,
    order_id: i64,
    printer_name: Option<&str>,
    max_attempts: i64,
) -> RepoResult<PrintJob>
where
    E: Executor<'e, Database = Sqlite>,
{
    if max_attempts <= 0 {
        return Err(RepoError::Validation(format!(
            "max_attempts must be positive, got {max_attempts}"
        )));
    }

    let job = sqlx::query_as::<_, PrintJob>(
        r#"
        INSERT INTO print_queue (order_id, status, printer_name, attempts, max_attempts, created_at)
        VALUES (?, 'pending', ?, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(printer_name)
    .bind(max_attempts)
    .bind(now_millis())
    .fetch_one(executor)
    .await?;

    Ok(job)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<PrintJob>> {
    let job = sqlx::query_as::<_, PrintJob>("SELECT * FROM print_queue WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// All jobs, oldest first
pub async fn find_all(pool: &SqlitePool) -> RepoResult<Vec<PrintJob>> {
    let jobs = sqlx::query_as::<_, PrintJob>(
        "SELECT * FROM print_queue ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

/// Pending jobs in FIFO order
pub async fn list_pending(pool: &SqlitePool) -> RepoResult<Vec<PrintJob>> {
    let jobs = sqlx::query_as::<_, PrintJob>(
        "SELECT * FROM print_queue WHERE status = 'pending' ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

/// Most recent job for an order
pub async fn find_by_order(pool: &SqlitePool, order_id: i64) -> RepoResult<Option<PrintJob>> {
    let job = sqlx::query_as::<_, PrintJob>(
        "SELECT * FROM print_queue WHERE order_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?;
    Ok(job)
}

/// Failed jobs, newest first
pub async fn find_failed(pool: &SqlitePool) -> RepoResult<Vec<PrintJob>> {
    let jobs = sqlx::query_as::<_, PrintJob>(
        "SELECT * FROM print_queue WHERE status = 'failed' ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

/// Claim a pending job for printing
///
/// Returns `None` when the row is no longer `pending` (another watcher
/// won, or the job left the claimable state). Exactly one concurrent
/// caller gets the row.
pub async fn claim(pool: &SqlitePool, id: i64) -> RepoResult<Option<PrintJob>> {
    let job = sqlx::query_as::<_, PrintJob>(
        r#"
        UPDATE print_queue
        SET status = 'printing', started_at = ?
        WHERE id = ? AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(now_millis())
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(job)
}

/// Complete a claimed job
///
/// Acts only on a `printing` row. An already printed job is returned
/// unchanged; any other state is an invalid transition.
pub async fn mark_printed(pool: &SqlitePool, id: i64) -> RepoResult<PrintJob> {
    let updated = sqlx::query_as::<_, PrintJob>(
        r#"
        UPDATE print_queue
        SET status = 'printed', printed_at = ?
        WHERE id = ? AND status = 'printing'
        RETURNING *
        "#,
    )
    .bind(now_millis())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    if let Some(job) = updated {
        return Ok(job);
    }

    match find_by_id(pool, id).await? {
        Some(job) if job.status == PrintJobStatus::Printed => Ok(job),
        Some(job) => Err(RepoError::InvalidTransition(format!(
            "job {id} is {}, cannot mark printed",
            job.status
        ))),
        None => Err(RepoError::NotFound(format!("print job {id}"))),
    }
}

/// Record one failed attempt of a claimed job
///
/// `attempts + 1`; at the ceiling the job becomes `failed` with
/// `failed_at` set, otherwise it goes back to `pending`. The error detail
/// is stored either way.
pub async fn record_failure(
    pool: &SqlitePool,
    id: i64,
    message: &str,
    stack: Option<&str>,
) -> RepoResult<PrintJob> {
    let updated = sqlx::query_as::<_, PrintJob>(
        r#"
        UPDATE print_queue
        SET attempts = attempts + 1,
            status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
            failed_at = CASE WHEN attempts + 1 >= max_attempts THEN ? ELSE NULL END,
            error_message = ?,
            error_stack = ?
        WHERE id = ? AND status = 'printing'
        RETURNING *
        "#,
    )
    .bind(now_millis())
    .bind(message)
    .bind(stack)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    if let Some(job) = updated {
        return Ok(job);
    }

    match find_by_id(pool, id).await? {
        Some(job) => Err(RepoError::InvalidTransition(format!(
            "job {id} is {}, cannot record failure",
            job.status
        ))),
        None => Err(RepoError::NotFound(format!("print job {id}"))),
    }
}

/// Operator reset back to `pending` with a fresh attempt budget
///
/// Clears the error detail. A printed job is returned unchanged.
pub async fn retry(pool: &SqlitePool, id: i64) -> RepoResult<PrintJob> {
    let updated = sqlx::query_as::<_, PrintJob>(
        r#"
        UPDATE print_queue
        SET status = 'pending',
            attempts = 0,
            error_message = NULL,
            error_stack = NULL,
            failed_at = NULL
        WHERE id = ? AND status != 'printed'
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    if let Some(job) = updated {
        return Ok(job);
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("print job {id}")))
}

/// Treat every `printing` job older than `lease` as a failed attempt
///
/// Re-queued or failed by the same ceiling rule as [`record_failure`].
/// Returns the affected jobs.
pub async fn reclaim_stale(pool: &SqlitePool, lease: Duration) -> RepoResult<Vec<PrintJob>> {
    let now = now_millis();
    let cutoff = now - i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);

    let jobs = sqlx::query_as::<_, PrintJob>(
        r#"
        UPDATE print_queue
        SET attempts = attempts + 1,
            status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'pending' END,
            failed_at = CASE WHEN attempts + 1 >= max_attempts THEN ? ELSE NULL END,
            error_message = ?,
            error_stack = NULL
        WHERE status = 'printing' AND started_at <= ?
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(LEASE_EXPIRED_MESSAGE)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

/// Administrative hard delete
pub async fn delete(pool: &SqlitePool, id: i64) -> RepoResult<bool> {
    let result = sqlx::query("DELETE FROM print_queue WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
