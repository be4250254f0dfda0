//! Job metrics and the shared active-jobs gauge.
//!
//! Metrics are emitted as structured tracing events behind a seam, so a
//! real metrics backend can replace `LogMetrics` without touching the
//! worker.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::jobs::ScrapingJob;

/// Sink for per-job outcome metrics. Recording failures are swallowed
/// by the caller.
#[async_trait]
pub trait JobMetrics: Send + Sync {
    async fn record_job_metrics(&self, job: &ScrapingJob) -> Result<()>;
}

/// Emits job metrics as structured log events.
pub struct LogMetrics;

#[async_trait]
impl JobMetrics for LogMetrics {
    async fn record_job_metrics(&self, job: &ScrapingJob) -> Result<()> {
        info!(
            job_id = %job.id,
            source = %job.source,
            status = ?job.status,
            results = job.results_count,
            new_companies = job.new_companies,
            updated_companies = job.updated_companies,
            errors = job.errors_count,
            duration_seconds = job.duration_seconds,
            "Job metrics"
        );
        Ok(())
    }
}

/// Per-source gauge of currently running jobs.
///
/// Shared across all concurrent jobs; the worker guarantees every
/// increment is paired with a decrement however the run ends.
#[derive(Default)]
pub struct ActiveJobsGauge {
    counts: Mutex<HashMap<String, i64>>,
}

impl ActiveJobsGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, source: &str) -> i64 {
        let mut counts = self.counts.lock().expect("gauge lock");
        let value = counts.entry(source.to_string()).or_insert(0);
        *value += 1;
        debug!(source, active = *value, "Active jobs gauge incremented");
        *value
    }

    pub fn dec(&self, source: &str) -> i64 {
        let mut counts = self.counts.lock().expect("gauge lock");
        let value = counts.entry(source.to_string()).or_insert(0);
        *value = (*value - 1).max(0);
        debug!(source, active = *value, "Active jobs gauge decremented");
        *value
    }

    pub fn get(&self, source: &str) -> i64 {
        self.counts
            .lock()
            .expect("gauge lock")
            .get(source)
            .copied()
            .unwrap_or(0)
    }
}
