//! Application and per-job configuration.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;

/// How the smart scraper participates in a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartScraperMode {
    /// Never run the smart scraper.
    #[default]
    Disabled,
    /// Run discovery + enrichment only when the primary scrape found nothing.
    Fallback,
    /// Enrich every scraped result that has a website.
    Enrichment,
}

/// Per-job configuration, stored as JSON on the job row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub source_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub use_anonymizer: bool,
    #[serde(default)]
    pub enable_smart_scraper: bool,
    #[serde(default)]
    pub smart_scraper_mode: SmartScraperMode,
    #[serde(default = "default_max_sites")]
    pub smart_scraper_max_sites: usize,
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
    #[serde(default = "default_check_interval")]
    pub cancellation_check_interval: usize,
}

fn default_max_pages() -> u32 {
    3
}

fn default_max_sites() -> usize {
    10
}

fn default_use_ai() -> bool {
    true
}

fn default_check_interval() -> usize {
    5
}

impl JobConfig {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            city: String::new(),
            industry: String::new(),
            max_pages: default_max_pages(),
            use_anonymizer: false,
            enable_smart_scraper: false,
            smart_scraper_mode: SmartScraperMode::default(),
            smart_scraper_max_sites: default_max_sites(),
            use_ai: default_use_ai(),
            cancellation_check_interval: default_check_interval(),
        }
    }

    /// Mode after applying the master switch: a disabled smart scraper
    /// wins over whatever the mode field says.
    pub fn effective_mode(&self) -> SmartScraperMode {
        if !self.enable_smart_scraper {
            return SmartScraperMode::Disabled;
        }
        self.smart_scraper_mode
    }

    /// Site cap, floored at one.
    pub fn max_sites(&self) -> usize {
        self.smart_scraper_max_sites.max(1)
    }

    /// Cancellation polling interval, floored at one.
    pub fn check_interval(&self) -> usize {
        self.cancellation_check_interval.max(1)
    }
}

/// Process-level configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Environment tag used in alert dedup keys.
    pub environment: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub tavily_api_key: Option<String>,
    pub webhook_url: Option<String>,
    pub alert_webhook_url: Option<String>,
    /// Sustained per-domain request budget.
    pub requests_per_minute: u32,
    pub auto_merge_threshold: f32,
    pub candidate_threshold: f32,
    pub realtime_dedup: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            environment: env::var("LEADGEN_ENV").unwrap_or_else(|_| "production".to_string()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| ollama_client::DEFAULT_MODEL.to_string()),
            browserless_url: env::var("BROWSERLESS_URL").ok(),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            tavily_api_key: env::var("TAVILY_API_KEY").ok(),
            webhook_url: env::var("LEADGEN_WEBHOOK_URL").ok(),
            alert_webhook_url: env::var("LEADGEN_ALERT_WEBHOOK_URL").ok(),
            requests_per_minute: env::var("LEADGEN_REQUESTS_PER_MINUTE")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("LEADGEN_REQUESTS_PER_MINUTE must be a number")?,
            auto_merge_threshold: env::var("LEADGEN_AUTO_MERGE_THRESHOLD")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("LEADGEN_AUTO_MERGE_THRESHOLD must be a number")?,
            candidate_threshold: env::var("LEADGEN_CANDIDATE_THRESHOLD")
                .unwrap_or_else(|_| "70".to_string())
                .parse()
                .context("LEADGEN_CANDIDATE_THRESHOLD must be a number")?,
            realtime_dedup: env::var("LEADGEN_REALTIME_DEDUP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
        })
    }
}
