//! CLI for creating and running scraping jobs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use leadgen_core::{
    ActiveJobsGauge, AppConfig, DedupThresholds, JobConfig, JobStore, LogMetrics, NoopAlerter,
    NoopDuplicateEngine, NullDispatcher, PgCompanyStore, PgJobStore, RunOutcome, ScrapeJobWorker,
    ScrapingJob, SmartScraperMode, WebhookAlerter, WebhookDispatcher, WorkerDeps,
};
use ollama_client::OllamaClient;
use scraping::{
    BrowserClient, BrowserDomStrategy, CrawlAiStrategy, DirectProxyManager, ExtractionStrategy,
    GovernorRateLimiter, HttpDomStrategy, NoopSearcher, PageRenderer, ProxyConfig, ProxyManager,
    RotatingProxyManager, StrategyKind, TavilySearcher, TextAiStrategy, WebSearcher,
};

#[derive(Parser)]
#[command(name = "leadgen")]
#[command(about = "Lead scraping job runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered directory sources
    ListSources,

    /// Create a scraping job and run it to completion
    RunJob {
        /// Registered source name (e.g. 11880, gelbeseiten, wlw)
        #[arg(long)]
        source: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long, default_value = "")]
        industry: String,
        #[arg(long, default_value_t = 3)]
        max_pages: u32,
        /// Route fetches through the rotating proxy pool
        #[arg(long)]
        anonymizer: bool,
        /// disabled | fallback | enrichment
        #[arg(long, default_value = "disabled")]
        smart_mode: String,
        #[arg(long, default_value_t = 10)]
        smart_max_sites: usize,
        /// Skip the AI-assisted extraction strategies
        #[arg(long)]
        no_ai: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListSources => {
            for (name, site) in scraping::registry() {
                println!("{name}  ({})", site.domain());
            }
            Ok(())
        }
        Commands::RunJob {
            source,
            city,
            industry,
            max_pages,
            anonymizer,
            smart_mode,
            smart_max_sites,
            no_ai,
        } => {
            let mode = parse_mode(&smart_mode)?;

            let mut job_config = JobConfig::new(&source);
            job_config.city = city;
            job_config.industry = industry;
            job_config.max_pages = max_pages;
            job_config.use_anonymizer = anonymizer;
            job_config.enable_smart_scraper = mode != SmartScraperMode::Disabled;
            job_config.smart_scraper_mode = mode;
            job_config.smart_scraper_max_sites = smart_max_sites;
            job_config.use_ai = !no_ai;

            run_job(job_config).await
        }
    }
}

fn parse_mode(value: &str) -> Result<SmartScraperMode> {
    match value {
        "disabled" => Ok(SmartScraperMode::Disabled),
        "fallback" => Ok(SmartScraperMode::Fallback),
        "enrichment" => Ok(SmartScraperMode::Enrichment),
        other => bail!("Unknown smart scraper mode: {other}"),
    }
}

async fn run_job(job_config: JobConfig) -> Result<()> {
    let app = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&app.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let renderer: Option<Arc<dyn PageRenderer>> = app
        .browserless_url
        .as_deref()
        .map(|url| {
            Arc::new(BrowserClient::new(url, app.browserless_token.as_deref()))
                as Arc<dyn PageRenderer>
        });

    let searcher: Arc<dyn WebSearcher> = match &app.tavily_api_key {
        Some(key) => Arc::new(TavilySearcher::new(key.clone())),
        None => Arc::new(NoopSearcher),
    };

    let proxies: Arc<dyn ProxyManager> = match std::env::var("LEADGEN_PROXY_URLS") {
        Ok(urls) if !urls.trim().is_empty() => {
            let pool: Vec<ProxyConfig> = urls
                .split(',')
                .map(|url| ProxyConfig {
                    url: url.trim().to_string(),
                    username: std::env::var("LEADGEN_PROXY_USERNAME").ok(),
                    password: std::env::var("LEADGEN_PROXY_PASSWORD").ok(),
                })
                .collect();
            Arc::new(RotatingProxyManager::new(pool))
        }
        _ => Arc::new(DirectProxyManager),
    };

    let ai = OllamaClient::new(&app.ollama_base_url);
    let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
        Arc::new(CrawlAiStrategy::new(ai.clone(), &app.ollama_model)?),
        Arc::new(TextAiStrategy::new(ai, &app.ollama_model)?),
        Arc::new(HttpDomStrategy::new()?),
    ];
    if let Some(renderer) = &renderer {
        strategies.push(Arc::new(BrowserDomStrategy::new(renderer.clone())));
    }

    let sources = scraping::registry()
        .into_iter()
        .map(|(name, site)| (name.to_string(), site))
        .collect::<HashMap<_, _>>();

    let alerting_enabled = app.alert_webhook_url.is_some();
    let deps = WorkerDeps {
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        companies: Arc::new(PgCompanyStore::new(pool.clone())),
        dedup: Arc::new(NoopDuplicateEngine),
        events: match &app.webhook_url {
            Some(url) => Arc::new(WebhookDispatcher::new(url.clone())),
            None => Arc::new(NullDispatcher),
        },
        metrics: Arc::new(LogMetrics),
        gauge: Arc::new(ActiveJobsGauge::new()),
        alerter: match &app.alert_webhook_url {
            Some(url) => Arc::new(WebhookAlerter::new(url.clone())),
            None => Arc::new(NoopAlerter),
        },
        limiter: Arc::new(GovernorRateLimiter::per_minute(app.requests_per_minute)),
        proxies,
        renderer,
        searcher,
        sources,
        strategies,
        preferred_strategy: StrategyKind::CrawlAi,
        thresholds: DedupThresholds {
            auto_merge: app.auto_merge_threshold,
            candidate: app.candidate_threshold,
        },
        realtime_dedup: app.realtime_dedup,
        environment: app.environment.clone(),
        alerting_enabled,
    };

    let job = ScrapingJob::builder()
        .source(job_config.source_name.clone())
        .city(job_config.city.clone())
        .industry(job_config.industry.clone())
        .config(serde_json::to_value(&job_config)?)
        .build();
    let job_id = job.id;

    deps.jobs.insert(&job).await?;

    let worker = ScrapeJobWorker::new(Arc::new(deps));
    match worker.run(job_id, &job_config).await? {
        RunOutcome::Missing => bail!("Job {job_id} disappeared before it could run"),
        RunOutcome::Finished(job) => {
            println!("job {}: {:?}", job.id, job.status);
            println!(
                "  results: {}  new: {}  updated: {}  errors: {}",
                job.results_count, job.new_companies, job.updated_companies, job.errors_count
            );
            if let Some(error) = &job.error_message {
                println!("  error: {error}");
            }
            Ok(())
        }
    }
}
