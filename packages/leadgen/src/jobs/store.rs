//! Job persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{JobStatus, ScrapingJob};

/// Storage seam for scraping jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ScrapingJob>>;

    async fn insert(&self, job: &ScrapingJob) -> Result<()>;

    /// Persist the whole job row.
    async fn update(&self, job: &ScrapingJob) -> Result<()>;

    /// Cheap progress-only write used by mid-run callbacks.
    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<()>;

    /// Re-read the persisted status; cancellation is signalled by
    /// another actor flipping it to `cancelled`.
    async fn is_cancelled(&self, id: Uuid) -> Result<bool>;
}

/// Postgres-backed job store.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ScrapingJob>> {
        let job = sqlx::query_as::<_, ScrapingJob>(
            r#"
            SELECT id, source, city, industry, status, progress, started_at, completed_at,
                   results_count, new_companies, updated_companies, errors_count,
                   error_message, stats, duration_seconds, config, created_at
            FROM scraping_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load scraping job")?;

        Ok(job)
    }

    async fn insert(&self, job: &ScrapingJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO scraping_jobs (
                id, source, city, industry, status, progress, started_at, completed_at,
                results_count, new_companies, updated_companies, errors_count,
                error_message, stats, duration_seconds, config, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(job.id)
        .bind(&job.source)
        .bind(&job.city)
        .bind(&job.industry)
        .bind(job.status)
        .bind(job.progress)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.results_count)
        .bind(job.new_companies)
        .bind(job.updated_companies)
        .bind(job.errors_count)
        .bind(&job.error_message)
        .bind(&job.stats)
        .bind(job.duration_seconds)
        .bind(&job.config)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert scraping job")?;

        Ok(())
    }

    async fn update(&self, job: &ScrapingJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scraping_jobs
            SET status = $2, progress = $3, started_at = $4, completed_at = $5,
                results_count = $6, new_companies = $7, updated_companies = $8,
                errors_count = $9, error_message = $10, stats = $11, duration_seconds = $12
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(job.status)
        .bind(job.progress)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.results_count)
        .bind(job.new_companies)
        .bind(job.updated_companies)
        .bind(job.errors_count)
        .bind(&job.error_message)
        .bind(&job.stats)
        .bind(job.duration_seconds)
        .execute(&self.pool)
        .await
        .context("Failed to update scraping job")?;

        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<()> {
        sqlx::query("UPDATE scraping_jobs SET progress = $2 WHERE id = $1")
            .bind(id)
            .bind(progress)
            .execute(&self.pool)
            .await
            .context("Failed to update job progress")?;

        Ok(())
    }

    async fn is_cancelled(&self, id: Uuid) -> Result<bool> {
        let status: Option<JobStatus> =
            sqlx::query_scalar("SELECT status FROM scraping_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read job status")?;

        Ok(status == Some(JobStatus::Cancelled))
    }
}
