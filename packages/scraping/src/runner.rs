//! Generic retrying, rate-limited, identity-rotating scrape runner.
//!
//! Any [`SiteScraper`] plugs into this loop; the runner owns transport,
//! throttling, retries, and politeness while the adapter owns URLs and
//! DOM extraction. Runners hold mutable per-run stats and must never be
//! shared between concurrent jobs.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::browser::PageRenderer;
use crate::error::Result;
use crate::fetch;
use crate::limiter::DomainRateLimiter;
use crate::proxy::ProxyManager;
use crate::sources::SiteScraper;
use crate::types::{LeadRecord, RunnerStats};

/// Per-run configuration for a [`ScraperRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Human-readable scraper name, for logging.
    pub name: String,
    /// Domain used for rate-limit bookkeeping.
    pub domain: String,
    /// Fetch attempts per URL before the URL is skipped.
    pub max_retries: u32,
    /// Politeness pause bounds after each successful fetch.
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Route fetches through the rotating proxy pool.
    pub use_anonymizer: bool,
    /// Fetch through the headless renderer instead of plain HTTP.
    pub use_browser: bool,
    /// Rotate the proxy identity every n-th request.
    pub rotate_every: u64,
}

impl RunnerConfig {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            max_retries: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            use_anonymizer: false,
            use_browser: false,
            rotate_every: 10,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    pub fn with_anonymizer(mut self, use_anonymizer: bool) -> Self {
        self.use_anonymizer = use_anonymizer;
        self
    }

    pub fn with_browser(mut self, use_browser: bool) -> Self {
        self.use_browser = use_browser;
        self
    }
}

/// Drives a site adapter through a full scrape run.
pub struct ScraperRunner {
    config: RunnerConfig,
    limiter: Arc<dyn DomainRateLimiter>,
    proxies: Arc<dyn ProxyManager>,
    renderer: Option<Arc<dyn PageRenderer>>,
    client: reqwest::Client,
    stats: RunnerStats,
}

impl ScraperRunner {
    pub fn new(
        config: RunnerConfig,
        limiter: Arc<dyn DomainRateLimiter>,
        proxies: Arc<dyn ProxyManager>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self> {
        let client = fetch::build_client(None)?;
        Ok(Self {
            config,
            limiter,
            proxies,
            renderer,
            client,
            stats: RunnerStats::default(),
        })
    }

    /// Counters accumulated so far in this run.
    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    /// Run a full scrape for one city/industry pair.
    ///
    /// `on_page(done, total)` fires after each search URL has been
    /// processed, whether or not it produced results. A URL that
    /// exhausts its retries is skipped, never fatal.
    pub async fn scrape<F, Fut>(
        &mut self,
        site: &dyn SiteScraper,
        city: &str,
        industry: &str,
        max_pages: u32,
        mut on_page: F,
    ) -> Result<Vec<LeadRecord>>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.config.use_anonymizer {
            self.refresh_client().await;
        }

        let urls = site.search_urls(city, industry, max_pages);
        let total = urls.len();

        info!(
            scraper = %self.config.name,
            city,
            industry,
            pages = total,
            "Starting scrape run"
        );

        let mut results = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            self.limiter.wait_if_needed(&self.config.domain).await;

            match self.fetch_with_retries(url).await {
                Some(html) => {
                    let parsed = site.parse_search_results(&html, url);
                    self.stats.results += parsed.len() as u64;
                    debug!(url = %url, results = parsed.len(), "Parsed search page");
                    results.extend(parsed);
                    self.politeness_pause().await;
                }
                None => {
                    warn!(
                        url = %url,
                        retries = self.config.max_retries,
                        "Giving up on page after retries"
                    );
                }
            }

            on_page(index + 1, total).await;
        }

        info!(
            scraper = %self.config.name,
            results = results.len(),
            requests = self.stats.requests,
            errors = self.stats.errors,
            "Scrape run finished"
        );

        Ok(results)
    }

    /// Fetch one URL with bounded retries and exponential backoff.
    async fn fetch_with_retries(&mut self, url: &str) -> Option<String> {
        for attempt in 0..self.config.max_retries {
            self.stats.requests += 1;

            if self.config.use_anonymizer && self.stats.requests % self.config.rotate_every == 0 {
                self.proxies.rotate_identity().await;
                self.refresh_client().await;
            }

            match self.fetch_page(url).await {
                Ok(html) => {
                    self.stats.successes += 1;
                    return Some(html);
                }
                Err(e) => {
                    self.stats.errors += 1;
                    warn!(url = %url, attempt, error = %e, "Fetch attempt failed");

                    if attempt + 1 < self.config.max_retries {
                        let backoff = Duration::from_secs(1u64 << attempt.min(16));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        None
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        if self.config.use_browser {
            if let Some(renderer) = &self.renderer {
                return renderer.content(url).await;
            }
            warn!(scraper = %self.config.name, "Browser transport requested but no renderer configured");
        }
        fetch::fetch_html(&self.client, url).await
    }

    async fn refresh_client(&mut self) {
        let proxy = self.proxies.proxy_config().await;
        match fetch::build_client(proxy.as_ref()) {
            Ok(client) => self.client = client,
            Err(e) => warn!(error = %e, "Failed to rebuild HTTP client after rotation"),
        }
    }

    async fn politeness_pause(&self) {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        let wait = if max > min { fastrand::u64(min..=max) } else { min };
        tokio::time::sleep(Duration::from_millis(wait)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::NoopRateLimiter;
    use crate::proxy::{DirectProxyManager, ProxyManager};
    use crate::testing::{MockRenderer, MockSiteScraper};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn runner(config: RunnerConfig, renderer: MockRenderer) -> ScraperRunner {
        ScraperRunner::new(
            config.with_browser(true),
            Arc::new(NoopRateLimiter),
            Arc::new(DirectProxyManager),
            Some(Arc::new(renderer)),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn concatenates_results_across_pages() {
        let site = MockSiteScraper::new(2, 1);
        let renderer = MockRenderer::always_ok("<html></html>");
        let mut runner = runner(RunnerConfig::new("mock", "mock.example"), renderer);

        let mut calls = Vec::new();
        let records = runner
            .scrape(&site, "Berlin", "Sanitär", 2, |done, total| {
                calls.push((done, total));
                async {}
            })
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        assert_eq!(runner.stats().requests, 2);
        assert_eq!(runner.stats().successes, 2);
        assert_eq!(runner.stats().results, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_skip_the_url() {
        let site = MockSiteScraper::new(1, 1);
        let renderer = MockRenderer::always_failing();
        let mut runner = runner(
            RunnerConfig::new("mock", "mock.example").with_max_retries(3),
            renderer,
        );

        let records = runner
            .scrape(&site, "Berlin", "Sanitär", 1, |_, _| async {})
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(runner.stats().requests, 3);
        assert_eq!(runner.stats().errors, 3);
        assert_eq!(runner.stats().successes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_second_attempt() {
        let site = MockSiteScraper::new(1, 1);
        let renderer = MockRenderer::failing_then_ok(1, "<html></html>");
        let mut runner = runner(RunnerConfig::new("mock", "mock.example"), renderer);

        let records = runner
            .scrape(&site, "Berlin", "Sanitär", 1, |_, _| async {})
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(runner.stats().requests, 2);
        assert_eq!(runner.stats().errors, 1);
        assert_eq!(runner.stats().successes, 1);
    }

    struct CountingProxyManager {
        rotations: AtomicU64,
    }

    #[async_trait]
    impl ProxyManager for CountingProxyManager {
        async fn proxy_config(&self) -> Option<crate::proxy::ProxyConfig> {
            None
        }

        async fn rotate_identity(&self) {
            self.rotations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_identity_every_nth_request() {
        let site = MockSiteScraper::new(4, 0);
        let renderer = MockRenderer::always_ok("<html></html>");
        let proxies = Arc::new(CountingProxyManager {
            rotations: AtomicU64::new(0),
        });

        let mut config = RunnerConfig::new("mock", "mock.example").with_anonymizer(true);
        config.rotate_every = 2;

        let mut runner = ScraperRunner::new(
            config.with_browser(true),
            Arc::new(NoopRateLimiter),
            proxies.clone(),
            Some(Arc::new(renderer)),
        )
        .unwrap();

        runner
            .scrape(&site, "Berlin", "Sanitär", 4, |_, _| async {})
            .await
            .unwrap();

        // Requests 2 and 4 trigger a rotation.
        assert_eq!(proxies.rotations.load(Ordering::SeqCst), 2);
    }
}
