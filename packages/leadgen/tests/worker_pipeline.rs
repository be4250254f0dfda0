//! End-to-end worker tests over in-memory stores and scripted
//! collaborators. No network, no database.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use leadgen_core::testing::{
    InMemoryCompanyStore, InMemoryJobStore, RecordingAlerter, RecordingDispatcher,
    RecordingMetrics, ScriptedDuplicateEngine,
};
use leadgen_core::{
    event, ActiveJobsGauge, Company, DedupThresholds, JobConfig, JobStatus, JobStore, RunOutcome,
    ScrapeJobWorker, ScrapingJob, SmartScraperMode, WorkerDeps,
};
use scraping::testing::{
    FailingSearcher, MockRenderer, MockSearcher, MockSiteScraper, ScriptedResponse,
    ScriptedStrategy,
};
use scraping::types::LeadRecord;
use scraping::{
    DirectProxyManager, ExtractionStrategy, NoopRateLimiter, SiteScraper, StrategyKind,
    WebSearcher,
};

struct TestBed {
    jobs: Arc<InMemoryJobStore>,
    companies: Arc<InMemoryCompanyStore>,
    dedup: Arc<ScriptedDuplicateEngine>,
    events: Arc<RecordingDispatcher>,
    metrics: Arc<RecordingMetrics>,
    gauge: Arc<ActiveJobsGauge>,
    alerter: Arc<RecordingAlerter>,
    worker: ScrapeJobWorker,
}

struct TestBedBuilder {
    site: Arc<dyn SiteScraper>,
    source_key: String,
    searcher: Arc<dyn WebSearcher>,
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    dedup_matches: Vec<(Company, f32)>,
    job_store: Option<Arc<dyn JobStore>>,
    inner_jobs: Arc<InMemoryJobStore>,
}

impl TestBedBuilder {
    fn new(site: MockSiteScraper) -> Self {
        Self {
            site: Arc::new(site),
            source_key: "mock".to_string(),
            searcher: Arc::new(MockSearcher::new(vec![])),
            strategies: vec![],
            dedup_matches: vec![],
            job_store: None,
            inner_jobs: Arc::new(InMemoryJobStore::new()),
        }
    }

    fn source_key(mut self, key: &str) -> Self {
        self.source_key = key.to_string();
        self
    }

    fn searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.searcher = searcher;
        self
    }

    fn strategies(mut self, strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    fn dedup_matches(mut self, matches: Vec<(Company, f32)>) -> Self {
        self.dedup_matches = matches;
        self
    }

    fn job_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(store);
        self
    }

    fn build(self) -> TestBed {
        let companies = Arc::new(InMemoryCompanyStore::new());
        let dedup = Arc::new(ScriptedDuplicateEngine::new(self.dedup_matches));
        let events = Arc::new(RecordingDispatcher::new());
        let metrics = Arc::new(RecordingMetrics::new());
        let gauge = Arc::new(ActiveJobsGauge::new());
        let alerter = Arc::new(RecordingAlerter::new());

        let mut sources: HashMap<String, Arc<dyn SiteScraper>> = HashMap::new();
        sources.insert(self.source_key, self.site);

        let jobs: Arc<dyn JobStore> = self
            .job_store
            .unwrap_or_else(|| self.inner_jobs.clone() as Arc<dyn JobStore>);

        let deps = WorkerDeps {
            jobs,
            companies: companies.clone(),
            dedup: dedup.clone(),
            events: events.clone(),
            metrics: metrics.clone(),
            gauge: gauge.clone(),
            alerter: alerter.clone(),
            limiter: Arc::new(NoopRateLimiter),
            proxies: Arc::new(DirectProxyManager),
            renderer: Some(Arc::new(MockRenderer::always_ok("<html></html>"))),
            searcher: self.searcher,
            sources,
            strategies: self.strategies,
            preferred_strategy: StrategyKind::HttpDom,
            thresholds: DedupThresholds::default(),
            realtime_dedup: true,
            environment: "test".to_string(),
            alerting_enabled: true,
        };

        TestBed {
            jobs: self.inner_jobs,
            companies,
            dedup,
            events,
            metrics,
            gauge,
            alerter,
            worker: ScrapeJobWorker::new(Arc::new(deps)),
        }
    }
}

async fn seed_job(bed: &TestBed, config: &JobConfig) -> Uuid {
    let job = ScrapingJob::pending(&config.source_name, &config.city, &config.industry);
    let id = job.id;
    bed.jobs.seed(job).await;
    id
}

fn lead(name: &str, city: &str) -> LeadRecord {
    let mut record = LeadRecord::new(name);
    if !city.is_empty() {
        record.city = Some(city.to_string());
    }
    record
}

fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn completed_job_reaches_full_progress() {
    let site = MockSiteScraper::with_records(vec![
        lead("Sanitär Schmidt GmbH", "Berlin"),
        lead("Bäder Krause", "Berlin"),
    ]);
    let bed = TestBedBuilder::new(site).build();

    let config = JobConfig::new("mock");
    let job_id = seed_job(&bed, &config).await;

    let outcome = bed.worker.run(job_id, &config).await.unwrap();
    let RunOutcome::Finished(job) = outcome else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.results_count, 2);
    assert_eq!(job.new_companies, 2);
    assert_eq!(job.updated_companies, 0);
    assert_eq!(job.errors_count, 0);
    assert!(job.error_message.is_none());
    assert!(job.duration_seconds.is_some());

    let persisted = bed.jobs.get(job_id).await.unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Completed);
    assert_eq!(persisted.progress, 100);

    assert_eq!(bed.companies.all().await.len(), 2);
    assert_eq!(bed.gauge.get("mock"), 0);
    assert_eq!(bed.metrics.recorded().len(), 1);
    assert!(bed.events.names().contains(&event::JOB_COMPLETED.to_string()));
}

#[tokio::test(start_paused = true)]
async fn unknown_source_fails_without_side_effects() {
    let bed = TestBedBuilder::new(MockSiteScraper::new(1, 1)).build();

    let config = JobConfig::new("does-not-exist");
    let job_id = seed_job(&bed, &config).await;

    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.results_count, 0);
    assert!(job
        .error_message
        .as_deref()
        .unwrap()
        .contains("Unknown scraper source"));

    assert!(bed.companies.all().await.is_empty());
    assert_eq!(bed.gauge.get("does-not-exist"), 0);

    // The fatal path alerts with an environment-scoped dedup key.
    let alerts = bed.alerter.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].0, "scraping_job_failed");
    assert_eq!(alerts[0].1, format!("test:job:{job_id}"));
}

#[tokio::test(start_paused = true)]
async fn missing_job_is_reported_without_side_effects() {
    let bed = TestBedBuilder::new(MockSiteScraper::new(1, 1)).build();

    let config = JobConfig::new("mock");
    let outcome = bed.worker.run(Uuid::new_v4(), &config).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Missing));
    assert!(bed.companies.all().await.is_empty());
    assert!(bed.metrics.recorded().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_results_without_fallback_fails_with_fixed_message() {
    let site = MockSiteScraper::with_records(vec![]);
    let bed = TestBedBuilder::new(site).build();

    let config = JobConfig::new("mock");
    let job_id = seed_job(&bed, &config).await;

    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 100);
    assert_eq!(
        job.error_message.as_deref(),
        Some("Scraping returned no results")
    );
    // Normal zero-result failure is not an uncaught error: no alert.
    assert!(bed.alerter.alerts().is_empty());
    // But metrics are still recorded.
    assert_eq!(bed.metrics.recorded().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rerunning_same_pair_updates_instead_of_inserting() {
    let site = MockSiteScraper::with_records(vec![lead("Elektro Weber", "Hamburg")]);
    let bed = TestBedBuilder::new(site).build();
    let config = JobConfig::new("mock");

    let first_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(first) = bed.worker.run(first_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };
    assert_eq!(first.new_companies, 1);
    assert_eq!(first.updated_companies, 0);

    let second_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(second) = bed.worker.run(second_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };
    assert_eq!(second.new_companies, 0);
    assert_eq!(second.updated_companies, 1);
    assert_eq!(second.results_count, 1);

    assert_eq!(bed.companies.all().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn high_similarity_match_is_auto_merged() {
    let existing = Company::from_fields(&fields(&[
        ("company_name", "Sanitaer Schmidt"),
        ("city", "Berlin"),
    ]));

    let site = MockSiteScraper::with_records(vec![lead("Sanitär Schmidt GmbH", "Berlin")]);
    let bed = TestBedBuilder::new(site)
        .dedup_matches(vec![(existing.clone(), 95.0)])
        .build();

    let config = JobConfig::new("mock");
    let job_id = seed_job(&bed, &config).await;

    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 1);
    // The merged row is not counted as new.
    assert_eq!(job.new_companies, 0);
    assert_eq!(job.stat_i64("auto_merged_duplicates"), 1);
    assert_eq!(job.stat_i64("duplicate_candidates_created"), 0);

    let merges = bed.dedup.merges();
    assert_eq!(merges.len(), 1);
    assert_eq!(merges[0].0, existing.id);
    assert!(bed.events.names().contains(&event::DUPLICATE_MERGED.to_string()));
}

#[tokio::test(start_paused = true)]
async fn mid_band_similarity_creates_exactly_one_candidate() {
    let near_match = Company::from_fields(&fields(&[
        ("company_name", "Schmidt Sanitärtechnik"),
        ("city", "Berlin"),
    ]));

    let site = MockSiteScraper::with_records(vec![lead("Sanitär Schmidt GmbH", "Berlin")]);
    let bed = TestBedBuilder::new(site)
        .dedup_matches(vec![(near_match, 75.0)])
        .build();

    let config = JobConfig::new("mock");
    let job_id = seed_job(&bed, &config).await;

    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    // Below auto-merge: the row stays and counts as new.
    assert_eq!(job.new_companies, 1);
    assert_eq!(job.stat_i64("auto_merged_duplicates"), 0);
    assert_eq!(job.stat_i64("duplicate_candidates_created"), 1);

    assert!(bed.dedup.merges().is_empty());
    assert_eq!(bed.dedup.candidates().len(), 1);
    assert!(bed.events.names().contains(&event::DUPLICATE_DETECTED.to_string()));
}

/// Job store whose persisted status reads as cancelled once the result
/// loop starts polling.
struct CancellingJobStore {
    inner: Arc<InMemoryJobStore>,
}

#[async_trait]
impl JobStore for CancellingJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<ScrapingJob>> {
        self.inner.get(id).await
    }

    async fn insert(&self, job: &ScrapingJob) -> Result<()> {
        self.inner.insert(job).await
    }

    async fn update(&self, job: &ScrapingJob) -> Result<()> {
        self.inner.update(job).await
    }

    async fn update_progress(&self, id: Uuid, progress: i32) -> Result<()> {
        self.inner.update_progress(id, progress).await
    }

    async fn is_cancelled(&self, _id: Uuid) -> Result<bool> {
        Ok(true)
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_halts_loop_and_keeps_prior_upserts() {
    let records: Vec<LeadRecord> = (0..10)
        .map(|i| lead(&format!("Company {i}"), "Berlin"))
        .collect();
    let site = MockSiteScraper::with_records(records);

    let inner = Arc::new(InMemoryJobStore::new());
    let bed = TestBedBuilder::new(site)
        .job_store(Arc::new(CancellingJobStore {
            inner: inner.clone(),
        }))
        .build();

    let mut config = JobConfig::new("mock");
    config.cancellation_check_interval = 2;

    let job = ScrapingJob::pending("mock", "Berlin", "");
    let job_id = job.id;
    inner.seed(job).await;

    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.progress <= 99);
    // The first interval's upserts stay committed.
    assert_eq!(bed.companies.all().await.len(), 2);
    assert_eq!(job.results_count, 2);

    let persisted = inner.get(job_id).await.unwrap().unwrap();
    assert_eq!(persisted.status, JobStatus::Cancelled);
    assert!(persisted.progress <= 99);

    // Cancelled runs record no completion metrics or events.
    assert!(bed.metrics.recorded().is_empty());
    assert!(!bed.events.names().contains(&event::JOB_COMPLETED.to_string()));
    assert_eq!(bed.gauge.get("mock"), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_two_results_one_invalid_one_new() {
    let site = MockSiteScraper::with_records(vec![
        lead("", "Berlin"),
        lead("Neue Firma GmbH", "Berlin"),
    ]);
    let bed = TestBedBuilder::new(site).source_key("11880").build();

    let mut config = JobConfig::new("11880");
    config.city = "Berlin".to_string();

    let job_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 1);
    assert_eq!(job.new_companies, 1);
    assert_eq!(job.errors_count, 1);
}

#[tokio::test(start_paused = true)]
async fn fallback_mode_discovers_and_enriches_stubs() {
    let site = MockSiteScraper::with_records(vec![]);
    let searcher = Arc::new(MockSearcher::with_urls(&[
        ("Acme GmbH - Impressum", "https://www.acme.example/"),
        ("Beta AG | Startseite", "https://beta.example/kontakt"),
    ]));
    let strategy = Arc::new(ScriptedStrategy::new(
        StrategyKind::HttpDom,
        ScriptedResponse::Fields(fields(&[("email", "info@found.example")])),
    ));

    let bed = TestBedBuilder::new(site)
        .searcher(searcher)
        .strategies(vec![strategy])
        .build();

    let mut config = JobConfig::new("mock");
    config.city = "Berlin".to_string();
    config.industry = "Maschinenbau".to_string();
    config.enable_smart_scraper = true;
    config.smart_scraper_mode = SmartScraperMode::Fallback;

    let job_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.results_count, 2);
    assert!(job.new_companies <= 2);

    let companies = bed.companies.all().await;
    assert_eq!(companies.len(), 2);
    let acme = companies
        .iter()
        .find(|c| c.company_name == "Acme GmbH")
        .expect("stub from cleaned title");
    assert_eq!(acme.email.as_deref(), Some("info@found.example"));
    assert_eq!(acme.website.as_deref(), Some("https://www.acme.example/"));
}

#[tokio::test(start_paused = true)]
async fn enrichment_mode_fills_missing_contact_fields() {
    let mut record = lead("Stahlbau Meier KG", "München");
    record.website = Some("https://meier.example".to_string());
    let site = MockSiteScraper::with_records(vec![record]);

    // Preferred strategy errors; the AI strategy earlier in the fixed
    // priority supplies the data.
    let preferred = Arc::new(ScriptedStrategy::new(
        StrategyKind::HttpDom,
        ScriptedResponse::Error,
    ));
    let crawl_ai = Arc::new(ScriptedStrategy::new(
        StrategyKind::CrawlAi,
        ScriptedResponse::Fields(fields(&[("email", "kontakt@meier.example")])),
    ));

    let bed = TestBedBuilder::new(site)
        .strategies(vec![preferred.clone(), crawl_ai.clone()])
        .build();

    let mut config = JobConfig::new("mock");
    config.enable_smart_scraper = true;
    config.smart_scraper_mode = SmartScraperMode::Enrichment;

    let job_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(preferred.calls(), 1);
    assert_eq!(crawl_ai.calls(), 1);

    let companies = bed.companies.all().await;
    assert_eq!(companies[0].email.as_deref(), Some("kontakt@meier.example"));
}

#[tokio::test(start_paused = true)]
async fn failing_discovery_degrades_to_plain_failure() {
    let site = MockSiteScraper::with_records(vec![]);
    let bed = TestBedBuilder::new(site)
        .searcher(Arc::new(FailingSearcher))
        .build();

    let mut config = JobConfig::new("mock");
    config.enable_smart_scraper = true;
    config.smart_scraper_mode = SmartScraperMode::Fallback;

    let job_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    // The smart-scraper failure is absorbed; the job then fails only
    // because nothing was scraped.
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("Scraping returned no results")
    );
    assert!(bed.alerter.alerts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enrichment_mode_without_smart_results_still_completes() {
    let site = MockSiteScraper::with_records(vec![lead("Ohne Website GmbH", "Köln")]);
    let strategy = Arc::new(ScriptedStrategy::new(
        StrategyKind::HttpDom,
        ScriptedResponse::Empty,
    ));
    let bed = TestBedBuilder::new(site).strategies(vec![strategy]).build();

    let mut config = JobConfig::new("mock");
    config.enable_smart_scraper = true;
    config.smart_scraper_mode = SmartScraperMode::Enrichment;

    let job_id = seed_job(&bed, &config).await;
    let RunOutcome::Finished(job) = bed.worker.run(job_id, &config).await.unwrap() else {
        panic!("expected finished outcome");
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.new_companies, 1);
}
