//! Lead-generation service core.
//!
//! Collects business-lead records from public web directories through a
//! cancellable, progress-tracked job pipeline with inline duplicate
//! detection and best-effort event notification. The scraping mechanics
//! live in the `scraping` crate; this crate owns the job state machine,
//! persistence, and outbound side effects.
//!
//! # Modules
//!
//! - [`jobs`] - job model, store, and the orchestrating worker
//! - [`companies`] - company rows and their storage seam
//! - [`dedup`] - duplicate-detection contract and thresholds
//! - [`validate`] - result validation/normalization pipeline
//! - [`events`] / [`metrics`] / [`alerts`] - best-effort side channels
//! - [`config`] - app and per-job configuration
//! - [`testing`] - in-memory stores and recording collaborators

pub mod alerts;
pub mod companies;
pub mod config;
pub mod dedup;
pub mod events;
pub mod jobs;
pub mod metrics;
pub mod testing;
pub mod validate;

pub use alerts::{AlertContext, Alerter, NoopAlerter, WebhookAlerter};
pub use companies::{Company, CompanyStore, PgCompanyStore, COMPANY_COLUMNS};
pub use config::{AppConfig, JobConfig, SmartScraperMode};
pub use dedup::{DedupThresholds, DuplicateEngine, NoopDuplicateEngine};
pub use events::{event, EventDispatcher, NullDispatcher, WebhookDispatcher};
pub use jobs::{JobStatus, JobStore, PgJobStore, RunOutcome, ScrapeJobWorker, ScrapingJob, WorkerDeps};
pub use metrics::{ActiveJobsGauge, JobMetrics, LogMetrics};
