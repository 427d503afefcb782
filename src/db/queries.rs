use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::job::{JobStatus, RenderJob};

const JOB_COLUMNS: &str = "id, product_id, status, operations, progress, results, error, \
                           created_at, started_at, completed_at";

fn job_from_row(row: &PgRow) -> Result<RenderJob, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = JobStatus::from_str(&status_str)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(RenderJob {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        status,
        operations: row.try_get("operations")?,
        progress: row.try_get("progress")?,
        results: row.try_get("results")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Insert a new render job in `queued` state.
pub async fn create_job(
    pool: &PgPool,
    product_id: Uuid,
    operations: &[String],
) -> Result<RenderJob, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO render_jobs (product_id, operations)
        VALUES ($1, $2)
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(product_id)
    .bind(operations)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<RenderJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM render_jobs
        WHERE id = $1
        "#,
    ))
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Get all jobs for a product, newest first.
pub async fn get_jobs_by_product(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<Vec<RenderJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM render_jobs
        WHERE product_id = $1
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Transition a job to `processing`, stamping `started_at` once.
/// `GREATEST` keeps progress monotonic if the update is ever replayed.
pub async fn mark_processing(
    pool: &PgPool,
    job_id: Uuid,
    initial_progress: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE render_jobs
        SET status = 'processing',
            progress = GREATEST(progress, $2),
            started_at = COALESCE(started_at, NOW())
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(initial_progress)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record one operation's output and advance progress.
///
/// `results` is merged (JSONB `||`), so earlier entries survive and partial
/// results are visible while the job is still processing. `GREATEST` keeps
/// progress monotonic even if updates land out of order.
pub async fn merge_job_result(
    pool: &PgPool,
    job_id: Uuid,
    operation: &str,
    output: serde_json::Value,
    progress: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE render_jobs
        SET results = results || jsonb_build_object($2::text, $3::jsonb),
            progress = GREATEST(progress, $4)
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(operation)
    .bind(output)
    .bind(progress)
    .execute(pool)
    .await?;

    Ok(())
}

/// Terminal transition to `completed`.
pub async fn complete_job(pool: &PgPool, job_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE render_jobs
        SET status = 'completed',
            progress = 100,
            completed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Terminal transition to `failed`, recording which operation broke.
pub async fn fail_job(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE render_jobs
        SET status = 'failed',
            error = $2,
            completed_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}
