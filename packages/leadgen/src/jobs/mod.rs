//! Scraping jobs: model, persistence, and the orchestrating worker.

pub mod job;
pub mod store;
pub mod worker;

pub use job::{JobStatus, ScrapingJob};
pub use store::{JobStore, PgJobStore};
pub use worker::{RunOutcome, ScrapeJobWorker, WorkerDeps};
