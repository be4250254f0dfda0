//! The scraping job worker.
//!
//! Owns the job state machine end-to-end: primary scrape, optional
//! smart-scraper discovery/enrichment, per-result validation and
//! upserts, inline duplicate checks, cooperative cancellation, and
//! best-effort event/metric/alert dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scraping::browser::PageRenderer;
use scraping::limiter::DomainRateLimiter;
use scraping::proxy::ProxyManager;
use scraping::runner::{RunnerConfig, ScraperRunner};
use scraping::search::WebSearcher;
use scraping::smart::{ExtractionStrategy, SmartScraper, SmartStats, StrategyKind};
use scraping::sources::SiteScraper;
use scraping::types::{LeadRecord, SearchHit};

use crate::alerts::{AlertContext, Alerter};
use crate::companies::{Company, CompanyStore};
use crate::config::{JobConfig, SmartScraperMode};
use crate::dedup::{DedupThresholds, DuplicateEngine};
use crate::events::{event, EventDispatcher};
use crate::jobs::job::{JobStatus, ScrapingJob};
use crate::jobs::store::JobStore;
use crate::metrics::{ActiveJobsGauge, JobMetrics};
use crate::validate;

/// Error message for runs that persisted nothing.
pub const NO_RESULTS_ERROR: &str = "Scraping returned no results";

/// Progress values logged once when first crossed during the scrape phase.
const MILESTONES: [i32; 4] = [20, 40, 60, 80];

/// How many near-duplicates to examine per new company.
const DEDUP_SCAN_LIMIT: usize = 5;

/// Everything a worker needs, shared across concurrent jobs.
pub struct WorkerDeps {
    pub jobs: Arc<dyn JobStore>,
    pub companies: Arc<dyn CompanyStore>,
    pub dedup: Arc<dyn DuplicateEngine>,
    pub events: Arc<dyn EventDispatcher>,
    pub metrics: Arc<dyn JobMetrics>,
    pub gauge: Arc<ActiveJobsGauge>,
    pub alerter: Arc<dyn Alerter>,
    pub limiter: Arc<dyn DomainRateLimiter>,
    pub proxies: Arc<dyn ProxyManager>,
    pub renderer: Option<Arc<dyn PageRenderer>>,
    pub searcher: Arc<dyn WebSearcher>,
    pub sources: HashMap<String, Arc<dyn SiteScraper>>,
    pub strategies: Vec<Arc<dyn ExtractionStrategy>>,
    pub preferred_strategy: StrategyKind,
    pub thresholds: DedupThresholds,
    pub realtime_dedup: bool,
    pub environment: String,
    pub alerting_enabled: bool,
}

/// Outcome of one worker invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// No job row with that id; nothing was touched.
    Missing,
    /// The job reached a terminal state; final row attached.
    Finished(ScrapingJob),
}

/// Runs one scraping job per call. One instance may serve many jobs;
/// runner and smart-scraper state is created per run.
pub struct ScrapeJobWorker {
    deps: Arc<WorkerDeps>,
}

impl ScrapeJobWorker {
    pub fn new(deps: Arc<WorkerDeps>) -> Self {
        Self { deps }
    }

    /// Execute the job end-to-end. Returns `Err` only when the job row
    /// itself cannot be read or initialized; every later failure is
    /// absorbed into the job's terminal state.
    pub async fn run(&self, job_id: Uuid, config: &JobConfig) -> Result<RunOutcome> {
        let Some(mut job) = self.deps.jobs.get(job_id).await? else {
            warn!(job_id = %job_id, "Scraping job not found");
            return Ok(RunOutcome::Missing);
        };

        info!(
            job_id = %job.id,
            source = %config.source_name,
            city = %config.city,
            industry = %config.industry,
            "Starting scraping job"
        );

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        job.progress = 0;
        job.error_message = None;
        self.deps.jobs.update(&job).await?;

        self.deps.gauge.inc(&job.source);

        if let Err(e) = self.execute(&mut job, config).await {
            self.fail_job(&mut job, config, &e).await;
        }

        // Paired with the increment above on every exit path.
        self.deps.gauge.dec(&job.source);

        Ok(RunOutcome::Finished(job))
    }

    /// Steps 2-7 of the pipeline. An `Err` here means an uncaught
    /// failure and converts the job to failed in `fail_job`.
    async fn execute(&self, job: &mut ScrapingJob, config: &JobConfig) -> Result<()> {
        let site = self
            .deps
            .sources
            .get(config.source_name.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("Unknown scraper source: {}", config.source_name))?;

        let mut records = self.scrape_phase(job, config, site.as_ref()).await?;
        job.raise_progress(80);
        self.deps.jobs.update(job).await?;

        let mode = config.effective_mode();
        let run_smart = match mode {
            SmartScraperMode::Disabled => false,
            SmartScraperMode::Fallback => records.is_empty(),
            SmartScraperMode::Enrichment => true,
        };

        if run_smart {
            match self.smart_phase(job, config, &mut records, mode).await {
                Ok(stats) => {
                    job.set_stat("smart_scraper_attempts", stats.attempts as i64);
                    job.set_stat("smart_scraper_successes", stats.successes as i64);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Smart scraper failed; continuing without it");
                    job.progress = 80;
                    if let Err(e) = self.deps.jobs.update_progress(job.id, 80).await {
                        warn!(job_id = %job.id, error = %e, "Failed to reset progress after smart-scraper failure");
                    }
                }
            }
        }

        let cancelled = self.persist_results(job, config, &records).await?;
        job.finish_clock();

        if cancelled {
            job.status = JobStatus::Cancelled;
            job.progress = job.progress.min(99);
            self.deps.jobs.update(job).await?;
            info!(
                job_id = %job.id,
                progress = job.progress,
                results = job.results_count,
                "Job cancelled; keeping work committed so far"
            );
            return Ok(());
        }

        if job.results_count == 0 {
            job.status = JobStatus::Failed;
            job.progress = 100;
            job.error_message = Some(NO_RESULTS_ERROR.to_string());
        } else {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.error_message = None;
        }
        self.deps.jobs.update(job).await?;

        if let Err(e) = self.deps.metrics.record_job_metrics(job).await {
            warn!(job_id = %job.id, error = %e, "Failed to record job metrics");
        }

        if job.status == JobStatus::Completed {
            self.deps
                .events
                .dispatch_event(
                    event::JOB_COMPLETED,
                    serde_json::json!({
                        "job_id": job.id,
                        "source": job.source,
                        "city": job.city,
                        "results_count": job.results_count,
                        "new_companies": job.new_companies,
                        "updated_companies": job.updated_companies,
                        "errors_count": job.errors_count,
                        "duration_seconds": job.duration_seconds,
                    }),
                )
                .await;
        }

        info!(
            job_id = %job.id,
            status = ?job.status,
            results = job.results_count,
            new_companies = job.new_companies,
            updated_companies = job.updated_companies,
            errors = job.errors_count,
            "Scraping job finished"
        );

        Ok(())
    }

    /// Primary scrape, mapped onto the [0, 80] progress band.
    async fn scrape_phase(
        &self,
        job: &mut ScrapingJob,
        config: &JobConfig,
        site: &dyn SiteScraper,
    ) -> Result<Vec<LeadRecord>> {
        let runner_config = RunnerConfig::new(site.name(), site.domain())
            .with_anonymizer(config.use_anonymizer)
            .with_browser(site.needs_browser());

        let mut runner = ScraperRunner::new(
            runner_config,
            self.deps.limiter.clone(),
            self.deps.proxies.clone(),
            self.deps.renderer.clone(),
        )?;

        let store = self.deps.jobs.clone();
        let job_id = job.id;
        let mut milestone_logged = [false; MILESTONES.len()];

        let records = runner
            .scrape(
                site,
                &config.city,
                &config.industry,
                config.max_pages,
                |done, total| {
                    let progress = ((done as f64 / total.max(1) as f64) * 80.0).round() as i32;
                    for (i, milestone) in MILESTONES.iter().enumerate() {
                        if progress >= *milestone && !milestone_logged[i] {
                            milestone_logged[i] = true;
                            info!(job_id = %job_id, progress, milestone, "Scrape progress milestone crossed");
                        }
                    }
                    let store = store.clone();
                    async move {
                        if let Err(e) = store.update_progress(job_id, progress).await {
                            warn!(job_id = %job_id, error = %e, "Failed to persist scrape progress");
                        }
                    }
                },
            )
            .await?;

        let stats = runner.stats();
        job.set_stat("requests", stats.requests as i64);
        job.set_stat("request_errors", stats.errors as i64);

        Ok(records)
    }

    /// Smart-scraper phase, mapped onto the [80, 90] progress band.
    ///
    /// In fallback mode the (empty) result set is replaced with
    /// discovery stubs first; both modes then enrich.
    async fn smart_phase(
        &self,
        job: &mut ScrapingJob,
        config: &JobConfig,
        records: &mut Vec<LeadRecord>,
        mode: SmartScraperMode,
    ) -> Result<SmartStats> {
        let mut smart = SmartScraper::new(
            self.deps.strategies.clone(),
            self.deps.preferred_strategy,
        )
        .with_ai(config.use_ai);

        if mode == SmartScraperMode::Fallback && records.is_empty() {
            let stubs = self.discover_stubs(config).await?;
            info!(job_id = %job.id, stubs = stubs.len(), "Discovery synthesized lead stubs");
            *records = stubs;
        }

        let store = self.deps.jobs.clone();
        let job_id = job.id;

        smart
            .enrich_records(records, config.max_sites(), |done, total| {
                let progress = 80 + ((done as f64 / total.max(1) as f64) * 10.0).round() as i32;
                let store = store.clone();
                async move {
                    if let Err(e) = store.update_progress(job_id, progress).await {
                        warn!(job_id = %job_id, error = %e, "Failed to persist enrichment progress");
                    }
                }
            })
            .await;

        job.raise_progress(90);
        Ok(smart.stats().clone())
    }

    /// Synthesize lead stubs from search-engine hits.
    async fn discover_stubs(&self, config: &JobConfig) -> Result<Vec<LeadRecord>> {
        let query = format!("{} {}", config.industry, config.city)
            .trim()
            .to_string();

        let hits = self
            .deps
            .searcher
            .search(&query, config.max_sites())
            .await?;

        Ok(hits.into_iter().filter_map(stub_from_hit).collect())
    }

    /// Validate, upsert and dedup-check each record in order.
    ///
    /// Returns true when a cancellation was observed; rows already
    /// upserted stay committed.
    async fn persist_results(
        &self,
        job: &mut ScrapingJob,
        config: &JobConfig,
        records: &[LeadRecord],
    ) -> Result<bool> {
        let total = records.len();
        let interval = config.check_interval();
        let mut auto_merged: i64 = 0;
        let mut candidates_created: i64 = 0;
        let mut processed = 0usize;
        let mut cancelled = false;

        for record in records {
            if processed > 0 && processed % interval == 0 {
                match self.deps.jobs.is_cancelled(job.id).await {
                    Ok(true) => {
                        cancelled = true;
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Cancellation check failed; continuing")
                    }
                }
            }
            processed += 1;

            let Some(mut fields) = validate::map_for_persistence(record) else {
                job.errors_count += 1;
                debug!(job_id = %job.id, company = %record.company_name, "Skipping unusable result");
                continue;
            };

            fields
                .entry("lead_source".to_string())
                .or_insert_with(|| job.source.clone());
            if !config.industry.is_empty() {
                fields
                    .entry("industry".to_string())
                    .or_insert_with(|| config.industry.clone());
            }

            let name = fields.get("company_name").cloned().unwrap_or_default();
            let city = fields.get("city").cloned();

            match self
                .deps
                .companies
                .find_by_name_city(&name, city.as_deref())
                .await
            {
                Ok(Some(existing)) => {
                    match self.deps.companies.update_fields(existing.id, &fields).await {
                        Ok(()) => {
                            job.updated_companies += 1;
                            job.results_count += 1;
                        }
                        Err(e) => {
                            job.errors_count += 1;
                            warn!(job_id = %job.id, company = %name, error = %e, "Company update failed");
                        }
                    }
                }
                Ok(None) => match self.deps.companies.insert(&fields).await {
                    Ok(company) => {
                        job.results_count += 1;
                        let merged = if self.deps.realtime_dedup {
                            self.check_duplicates(job, &company, &mut auto_merged, &mut candidates_created)
                                .await
                        } else {
                            false
                        };
                        if !merged {
                            job.new_companies += 1;
                        }
                    }
                    Err(e) => {
                        job.errors_count += 1;
                        warn!(job_id = %job.id, company = %name, error = %e, "Company insert failed");
                    }
                },
                Err(e) => {
                    job.errors_count += 1;
                    warn!(job_id = %job.id, company = %name, error = %e, "Company lookup failed");
                }
            }
        }

        job.set_stat("auto_merged_duplicates", auto_merged);
        job.set_stat("duplicate_candidates_created", candidates_created);

        if cancelled {
            // Best available estimate: persisted progress, local progress,
            // or a bounded linear guess from the processed ratio.
            let persisted = self
                .deps
                .jobs
                .get(job.id)
                .await
                .ok()
                .flatten()
                .map(|j| j.progress)
                .unwrap_or(0);
            let linear = ((processed as f64 / total.max(1) as f64) * 100.0).round() as i32;
            job.progress = persisted.max(job.progress).max(linear).min(99);
            info!(
                job_id = %job.id,
                processed,
                total,
                progress = job.progress,
                "Cancellation observed; stopping result loop"
            );
        }

        Ok(cancelled)
    }

    /// Inline duplicate scan for a freshly inserted company.
    ///
    /// Returns true when the row was merged away. A failing candidate
    /// never rolls back the upsert.
    async fn check_duplicates(
        &self,
        job: &ScrapingJob,
        company: &Company,
        auto_merged: &mut i64,
        candidates_created: &mut i64,
    ) -> bool {
        let mut matches = match self.deps.dedup.find_duplicates(company, DEDUP_SCAN_LIMIT).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(job_id = %job.id, company = %company.company_name, error = %e, "Duplicate lookup failed");
                return false;
            }
        };
        matches.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (candidate, similarity) in matches {
            if similarity >= self.deps.thresholds.auto_merge {
                match self.deps.dedup.merge_companies(&candidate, company).await {
                    Ok(()) => {
                        *auto_merged += 1;
                        info!(
                            job_id = %job.id,
                            company = %company.company_name,
                            merged_into = %candidate.company_name,
                            similarity,
                            "Auto-merged duplicate company"
                        );
                        self.deps
                            .events
                            .dispatch_event(
                                event::DUPLICATE_MERGED,
                                serde_json::json!({
                                    "job_id": job.id,
                                    "company_id": company.id,
                                    "merged_into": candidate.id,
                                    "similarity": similarity,
                                }),
                            )
                            .await;
                        return true;
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Auto-merge failed; keeping the new row");
                    }
                }
            } else if similarity >= self.deps.thresholds.candidate {
                match self
                    .deps
                    .dedup
                    .create_duplicate_candidate(company, &candidate, similarity)
                    .await
                {
                    Ok(()) => {
                        *candidates_created += 1;
                        self.deps
                            .events
                            .dispatch_event(
                                event::DUPLICATE_DETECTED,
                                serde_json::json!({
                                    "job_id": job.id,
                                    "company_id": company.id,
                                    "candidate_id": candidate.id,
                                    "similarity": similarity,
                                }),
                            )
                            .await;
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to record duplicate candidate");
                    }
                }
            }
        }

        false
    }

    /// Step 8: convert an uncaught failure into a failed job and alert.
    async fn fail_job(&self, job: &mut ScrapingJob, config: &JobConfig, failure: &anyhow::Error) {
        error!(job_id = %job.id, error = %failure, "Scraping job failed");

        job.status = JobStatus::Failed;
        job.progress = 100;
        job.error_message = Some(failure.to_string());
        job.finish_clock();

        if let Err(e) = self.deps.jobs.update(job).await {
            error!(job_id = %job.id, error = %e, "Failed to persist failed job state");
        }

        if let Err(e) = self.deps.metrics.record_job_metrics(job).await {
            warn!(job_id = %job.id, error = %e, "Failed to record job metrics");
        }

        if self.deps.alerting_enabled {
            let context = AlertContext {
                job_id: job.id,
                source: job.source.clone(),
                city: config.city.clone(),
                industry: config.industry.clone(),
                error: failure.to_string(),
                duration_seconds: job.duration_seconds.unwrap_or(0.0),
                environment: self.deps.environment.clone(),
                auto_merged_duplicates: job.stat_i64("auto_merged_duplicates"),
                duplicate_candidates_created: job.stat_i64("duplicate_candidates_created"),
            };
            if let Err(e) = self
                .deps
                .alerter
                .send_templated_alert("scraping_job_failed", &context)
                .await
            {
                warn!(job_id = %job.id, error = %e, "Failed to send failure alert");
            }
        }
    }
}

/// Turn a search hit into a lead stub: name from the cleaned title,
/// falling back to the domain; website from the hit URL.
fn stub_from_hit(hit: SearchHit) -> Option<LeadRecord> {
    let name = clean_title(&hit.title).or_else(|| domain_of(&hit.url))?;

    let mut record = LeadRecord::new(name).with_website(hit.url.clone());
    record.add_source(
        "web_search",
        &hit.url,
        vec!["company_name".to_string(), "website".to_string()],
    );
    Some(record)
}

/// "Acme GmbH - Impressum | acme.de" -> "Acme GmbH".
fn clean_title(title: &str) -> Option<String> {
    let cleaned = title
        .split(&['|', '–'][..])
        .next()
        .unwrap_or(title)
        .split(" - ")
        .next()
        .unwrap_or(title)
        .trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .filter(|h| !h.is_empty())
}
