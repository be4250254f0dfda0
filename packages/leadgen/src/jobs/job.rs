//! Persisted scraping-job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Job lifecycle. `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One scraping run, exclusively mutated by the job worker while running.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct ScrapingJob {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub source: String,
    #[builder(default)]
    pub city: String,
    #[builder(default)]
    pub industry: String,

    #[builder(default)]
    pub status: JobStatus,
    /// 0..=100. Monotone while running; clamped to <= 99 on cancellation.
    #[builder(default = 0)]
    pub progress: i32,

    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,

    #[builder(default = 0)]
    pub results_count: i32,
    #[builder(default = 0)]
    pub new_companies: i32,
    #[builder(default = 0)]
    pub updated_companies: i32,
    #[builder(default = 0)]
    pub errors_count: i32,

    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    /// Open counter map (auto_merged_duplicates, duplicate_candidates_created, ...).
    #[builder(default = serde_json::json!({}))]
    pub stats: serde_json::Value,

    #[builder(default, setter(strip_option))]
    pub duration_seconds: Option<f64>,

    /// Serialized [`crate::config::JobConfig`] this job was created with.
    #[builder(default, setter(strip_option))]
    pub config: Option<serde_json::Value>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl ScrapingJob {
    /// Create a pending job for a source/city/industry triple.
    pub fn pending(source: &str, city: &str, industry: &str) -> Self {
        Self::builder()
            .source(source)
            .city(city)
            .industry(industry)
            .build()
    }

    /// Raise progress to `value`; never lowers it.
    pub fn raise_progress(&mut self, value: i32) {
        self.progress = self.progress.max(value.clamp(0, 100));
    }

    /// Read a counter out of the open stats map.
    pub fn stat_i64(&self, key: &str) -> i64 {
        self.stats.get(key).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    /// Write a value into the open stats map.
    pub fn set_stat(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        if !self.stats.is_object() {
            self.stats = serde_json::json!({});
        }
        if let serde_json::Value::Object(map) = &mut self.stats {
            map.insert(key.to_string(), value.into());
        }
    }

    /// Stamp completion time and derive the duration from `started_at`.
    pub fn finish_clock(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        if let Some(started_at) = self.started_at {
            self.duration_seconds = Some((now - started_at).num_milliseconds() as f64 / 1000.0);
        }
    }
}
