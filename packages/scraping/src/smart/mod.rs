//! Multi-strategy "smart" scraper.
//!
//! Tries ordered extraction strategies against a company website until
//! one returns usable fields. Used by the job worker both for
//! gap-filling discovery and for per-company enrichment.

mod strategies;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::LeadRecord;

pub use strategies::{
    BrowserDomStrategy, CrawlAiStrategy, HttpDomStrategy, TextAiStrategy, EXTRACTION_SYSTEM_PROMPT,
};

/// The four extraction methods, in fixed fallback priority order
/// (AI-assisted before heuristic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Structured crawl (markdown) fed to the local language model.
    CrawlAi,
    /// Lightweight text extraction fed to the same model.
    TextAi,
    /// Headless-browser DOM read.
    BrowserDom,
    /// Plain-HTTP DOM read.
    HttpDom,
}

impl StrategyKind {
    /// Fixed fallback priority.
    pub const PRIORITY: [StrategyKind; 4] = [
        StrategyKind::CrawlAi,
        StrategyKind::TextAi,
        StrategyKind::BrowserDom,
        StrategyKind::HttpDom,
    ];

    pub fn is_ai(&self) -> bool {
        matches!(self, StrategyKind::CrawlAi | StrategyKind::TextAi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CrawlAi => "crawl_ai",
            StrategyKind::TextAi => "text_ai",
            StrategyKind::BrowserDom => "browser_dom",
            StrategyKind::HttpDom => "http_dom",
        }
    }
}

/// One extraction method with a uniform signature.
///
/// `Ok(None)` means "ran fine, found nothing"; errors are treated the
/// same way by the chain but logged louder.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn extract(&self, url: &str) -> Result<Option<HashMap<String, String>>>;
}

/// Per-instance chain statistics.
#[derive(Debug, Clone, Default)]
pub struct SmartStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub by_strategy: HashMap<&'static str, u64>,
}

/// Ordered fallback chain over the registered strategies.
///
/// Owns mutable stats; concurrent jobs must each build their own
/// instance (the strategies themselves are stateless and shared).
pub struct SmartScraper {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    preferred: StrategyKind,
    use_ai: bool,
    stats: SmartStats,
}

impl SmartScraper {
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>, preferred: StrategyKind) -> Self {
        Self {
            strategies,
            preferred,
            use_ai: true,
            stats: SmartStats::default(),
        }
    }

    /// Skip the AI-assisted strategies entirely.
    pub fn with_ai(mut self, use_ai: bool) -> Self {
        self.use_ai = use_ai;
        self
    }

    pub fn stats(&self) -> &SmartStats {
        &self.stats
    }

    /// Extract structured fields from a URL, trying fallbacks.
    pub async fn scrape(&mut self, url: &str) -> Option<HashMap<String, String>> {
        self.scrape_with_fallback(url, true).await
    }

    /// Extract structured fields; with `fallback = false` only the
    /// preferred strategy runs.
    pub async fn scrape_with_fallback(
        &mut self,
        url: &str,
        fallback: bool,
    ) -> Option<HashMap<String, String>> {
        self.stats.attempts += 1;

        for kind in self.attempt_order(fallback) {
            if kind.is_ai() && !self.use_ai {
                continue;
            }
            let Some(strategy) = self.strategies.iter().find(|s| s.kind() == kind) else {
                continue;
            };

            match strategy.extract(url).await {
                Ok(Some(fields)) if !fields.is_empty() => {
                    *self.stats.by_strategy.entry(kind.as_str()).or_insert(0) += 1;
                    self.stats.successes += 1;
                    debug!(url = %url, strategy = kind.as_str(), fields = fields.len(), "Smart scrape succeeded");
                    return Some(fields);
                }
                Ok(_) => {
                    debug!(url = %url, strategy = kind.as_str(), "Strategy found nothing, trying next");
                }
                Err(e) => {
                    warn!(url = %url, strategy = kind.as_str(), error = %e, "Strategy failed, trying next");
                }
            }
        }

        self.stats.failures += 1;
        None
    }

    /// Visit each record's website (up to `max_sites`) and fill in
    /// missing email/phone fields.
    ///
    /// `on_progress(visited, total)` fires after each visited site.
    pub async fn enrich_records<F, Fut>(
        &mut self,
        records: &mut [LeadRecord],
        max_sites: usize,
        mut on_progress: F,
    ) where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = ()>,
    {
        let targets: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.website.is_some())
            .map(|(i, _)| i)
            .take(max_sites)
            .collect();

        let total = targets.len();
        info!(sites = total, "Enriching records via smart scraper");

        for (visited, index) in targets.into_iter().enumerate() {
            let Some(website) = records[index].website.clone() else {
                continue;
            };

            if let Some(fields) = self.scrape(&website).await {
                let record = &mut records[index];
                let mut filled = Vec::new();

                if record.email.is_none() {
                    if let Some(email) = fields.get("email") {
                        record.email = Some(email.clone());
                        filled.push("email".to_string());
                    }
                }
                if record.phone.is_none() {
                    if let Some(phone) = fields.get("phone") {
                        record.phone = Some(phone.clone());
                        filled.push("phone".to_string());
                    }
                }

                record.add_source("smart_scraper", &website, filled);
            }

            on_progress(visited + 1, total).await;
        }
    }

    fn attempt_order(&self, fallback: bool) -> Vec<StrategyKind> {
        if !fallback {
            return vec![self.preferred];
        }

        let mut order = vec![self.preferred];
        order.extend(
            StrategyKind::PRIORITY
                .into_iter()
                .filter(|kind| *kind != self.preferred),
        );
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedResponse, ScriptedStrategy};

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn preferred_strategy_wins_and_skips_the_rest() {
        let preferred = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("email", "a@b.c")])),
        ));
        let other = Arc::new(ScriptedStrategy::new(
            StrategyKind::CrawlAi,
            ScriptedResponse::Fields(fields(&[("email", "x@y.z")])),
        ));

        let mut smart = SmartScraper::new(
            vec![preferred.clone(), other.clone()],
            StrategyKind::HttpDom,
        );

        let result = smart.scrape("https://acme.example").await.unwrap();
        assert_eq!(result.get("email").map(String::as_str), Some("a@b.c"));
        assert_eq!(preferred.calls(), 1);
        assert_eq!(other.calls(), 0);
        assert_eq!(smart.stats().by_strategy.get("http_dom"), Some(&1));
        assert!(smart.stats().by_strategy.get("crawl_ai").is_none());
    }

    #[tokio::test]
    async fn failing_preferred_falls_back_in_priority_order() {
        let preferred = Arc::new(ScriptedStrategy::new(
            StrategyKind::BrowserDom,
            ScriptedResponse::Error,
        ));
        let crawl_ai = Arc::new(ScriptedStrategy::new(
            StrategyKind::CrawlAi,
            ScriptedResponse::Fields(fields(&[("phone", "030 1")])),
        ));
        let http_dom = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("phone", "030 2")])),
        ));

        let mut smart = SmartScraper::new(
            vec![preferred.clone(), crawl_ai.clone(), http_dom.clone()],
            StrategyKind::BrowserDom,
        );

        let result = smart.scrape("https://acme.example").await.unwrap();

        // CrawlAi is earlier than HttpDom in the fixed priority.
        assert_eq!(result.get("phone").map(String::as_str), Some("030 1"));
        assert_eq!(preferred.calls(), 1);
        assert_eq!(crawl_ai.calls(), 1);
        assert_eq!(http_dom.calls(), 0);
        assert_eq!(smart.stats().by_strategy.get("crawl_ai"), Some(&1));
        assert!(smart.stats().by_strategy.get("browser_dom").is_none());
        assert_eq!(smart.stats().successes, 1);
    }

    #[tokio::test]
    async fn no_fallback_runs_only_preferred() {
        let preferred = Arc::new(ScriptedStrategy::new(
            StrategyKind::TextAi,
            ScriptedResponse::Empty,
        ));
        let other = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("email", "a@b.c")])),
        ));

        let mut smart = SmartScraper::new(vec![preferred.clone(), other.clone()], StrategyKind::TextAi);

        let result = smart
            .scrape_with_fallback("https://acme.example", false)
            .await;

        assert!(result.is_none());
        assert_eq!(preferred.calls(), 1);
        assert_eq!(other.calls(), 0);
        assert_eq!(smart.stats().failures, 1);
    }

    #[tokio::test]
    async fn disabling_ai_skips_ai_strategies() {
        let crawl_ai = Arc::new(ScriptedStrategy::new(
            StrategyKind::CrawlAi,
            ScriptedResponse::Fields(fields(&[("email", "ai@b.c")])),
        ));
        let http_dom = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("email", "dom@b.c")])),
        ));

        let mut smart = SmartScraper::new(vec![crawl_ai.clone(), http_dom.clone()], StrategyKind::CrawlAi)
            .with_ai(false);

        let result = smart.scrape("https://acme.example").await.unwrap();
        assert_eq!(result.get("email").map(String::as_str), Some("dom@b.c"));
        assert_eq!(crawl_ai.calls(), 0);
    }

    #[tokio::test]
    async fn all_strategies_failing_returns_none() {
        let a = Arc::new(ScriptedStrategy::new(StrategyKind::CrawlAi, ScriptedResponse::Error));
        let b = Arc::new(ScriptedStrategy::new(StrategyKind::HttpDom, ScriptedResponse::Empty));

        let mut smart = SmartScraper::new(vec![a, b], StrategyKind::CrawlAi);

        assert!(smart.scrape("https://acme.example").await.is_none());
        assert_eq!(smart.stats().attempts, 1);
        assert_eq!(smart.stats().failures, 1);
        assert_eq!(smart.stats().successes, 0);
    }

    #[tokio::test]
    async fn enrichment_fills_missing_fields_and_appends_source() {
        let strategy = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("email", "info@acme.example"), ("phone", "030 9")])),
        ));
        let mut smart = SmartScraper::new(vec![strategy], StrategyKind::HttpDom);

        let mut records = vec![
            LeadRecord::new("Acme").with_website("https://acme.example"),
            LeadRecord::new("No Website Co"),
        ];
        records[0].phone = Some("already there".to_string());

        let mut progress = Vec::new();
        smart
            .enrich_records(&mut records, 10, |done, total| {
                progress.push((done, total));
                async {}
            })
            .await;

        assert_eq!(records[0].email.as_deref(), Some("info@acme.example"));
        // Pre-existing phone is not overwritten.
        assert_eq!(records[0].phone.as_deref(), Some("already there"));
        assert_eq!(records[0].sources.last().unwrap().name, "smart_scraper");
        assert_eq!(records[0].sources.last().unwrap().fields, vec!["email"]);
        // The record without a website is never visited.
        assert!(records[1].sources.is_empty());
        assert_eq!(progress, vec![(1, 1)]);
    }

    #[tokio::test]
    async fn enrichment_respects_the_site_cap() {
        let strategy = Arc::new(ScriptedStrategy::new(
            StrategyKind::HttpDom,
            ScriptedResponse::Fields(fields(&[("email", "x@y.z")])),
        ));
        let mut smart = SmartScraper::new(vec![strategy.clone()], StrategyKind::HttpDom);

        let mut records: Vec<LeadRecord> = (0..5)
            .map(|i| LeadRecord::new(format!("Co {i}")).with_website(format!("https://co{i}.example")))
            .collect();

        smart.enrich_records(&mut records, 2, |_, _| async {}).await;

        assert_eq!(strategy.calls(), 2);
        assert!(records[2].email.is_none());
    }
}
