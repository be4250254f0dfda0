//! Directory scraping toolkit.
//!
//! The mechanics of collecting business leads from public directories:
//! a retrying, rate-limited, identity-rotating runner that any site
//! adapter plugs into, plus a multi-strategy "smart" scraper for
//! gap-filling discovery and per-company website enrichment.
//!
//! # Modules
//!
//! - [`runner`] - drives a [`sources::SiteScraper`] through a full run
//! - [`sources`] - site adapters and their registry
//! - [`smart`] - ordered fallback extraction chain
//! - [`search`] - web search used for fallback discovery
//! - [`limiter`] / [`proxy`] / [`browser`] - shared collaborator seams
//! - [`extract`] - heuristic contact extraction
//! - [`testing`] - mock implementations for tests

pub mod browser;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod limiter;
pub mod proxy;
pub mod runner;
pub mod search;
pub mod smart;
pub mod sources;
pub mod testing;
pub mod types;

pub use browser::{BrowserClient, PageRenderer};
pub use error::{Result, ScrapeError};
pub use limiter::{DomainRateLimiter, GovernorRateLimiter, NoopRateLimiter};
pub use proxy::{DirectProxyManager, ProxyConfig, ProxyManager, RotatingProxyManager};
pub use runner::{RunnerConfig, ScraperRunner};
pub use search::{NoopSearcher, TavilySearcher, WebSearcher};
pub use smart::{
    BrowserDomStrategy, CrawlAiStrategy, ExtractionStrategy, HttpDomStrategy, SmartScraper,
    SmartStats, StrategyKind, TextAiStrategy,
};
pub use sources::{registry, SiteScraper};
pub use types::{LeadRecord, RunnerStats, SearchHit, SourceRef};
