//! Mock implementations shared by unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::browser::PageRenderer;
use crate::error::{Result, ScrapeError};
use crate::search::WebSearcher;
use crate::smart::{ExtractionStrategy, StrategyKind};
use crate::sources::SiteScraper;
use crate::types::{LeadRecord, SearchHit};

/// Site adapter producing synthetic or canned records.
pub struct MockSiteScraper {
    pages: u32,
    records_per_page: usize,
    canned: Option<Vec<LeadRecord>>,
}

impl MockSiteScraper {
    /// Generate `records_per_page` synthetic records on each of `pages` pages.
    pub fn new(pages: u32, records_per_page: usize) -> Self {
        Self {
            pages,
            records_per_page,
            canned: None,
        }
    }

    /// Return exactly these records on the first page.
    pub fn with_records(records: Vec<LeadRecord>) -> Self {
        Self {
            pages: 1,
            records_per_page: 0,
            canned: Some(records),
        }
    }
}

impl SiteScraper for MockSiteScraper {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn domain(&self) -> &'static str {
        "mock.example"
    }

    // Keeps tests off the network: the runner goes through whatever
    // renderer the test supplies.
    fn needs_browser(&self) -> bool {
        true
    }

    fn search_urls(&self, _city: &str, _industry: &str, max_pages: u32) -> Vec<String> {
        (1..=self.pages.min(max_pages.max(1)))
            .map(|page| format!("https://mock.example/search?page={page}"))
            .collect()
    }

    fn parse_search_results(&self, _html: &str, url: &str) -> Vec<LeadRecord> {
        if let Some(canned) = &self.canned {
            return if url.ends_with("page=1") {
                canned.clone()
            } else {
                vec![]
            };
        }

        let page = url.rsplit('=').next().unwrap_or("0");
        (0..self.records_per_page)
            .map(|i| {
                let mut record = LeadRecord::new(format!("Company {page}-{i}"));
                record.add_source("mock", url, vec!["company_name".to_string()]);
                record
            })
            .collect()
    }
}

/// Renderer with a scripted failure prefix.
pub struct MockRenderer {
    html: String,
    fail_first: u64,
    always_fail: bool,
    calls: AtomicU64,
}

impl MockRenderer {
    pub fn always_ok(html: &str) -> Self {
        Self {
            html: html.to_string(),
            fail_first: 0,
            always_fail: false,
            calls: AtomicU64::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            html: String::new(),
            fail_first: 0,
            always_fail: true,
            calls: AtomicU64::new(0),
        }
    }

    /// Fail the first `n` calls, then answer with `html`.
    pub fn failing_then_ok(n: u64, html: &str) -> Self {
        Self {
            html: html.to_string(),
            fail_first: n,
            always_fail: false,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn content(&self, _url: &str) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail || call <= self.fail_first {
            return Err(ScrapeError::Render {
                status: 500,
                message: "scripted render failure".to_string(),
            });
        }
        Ok(self.html.clone())
    }
}

/// What a [`ScriptedStrategy`] should answer.
pub enum ScriptedResponse {
    Fields(HashMap<String, String>),
    Empty,
    Error,
}

/// Extraction strategy with a fixed reply and a call counter.
pub struct ScriptedStrategy {
    kind: StrategyKind,
    response: ScriptedResponse,
    calls: AtomicU64,
}

impl ScriptedStrategy {
    pub fn new(kind: StrategyKind, response: ScriptedResponse) -> Self {
        Self {
            kind,
            response,
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionStrategy for ScriptedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn extract(&self, _url: &str) -> Result<Option<HashMap<String, String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            ScriptedResponse::Fields(fields) => Ok(Some(fields.clone())),
            ScriptedResponse::Empty => Ok(None),
            ScriptedResponse::Error => Err(ScrapeError::Render {
                status: 500,
                message: "scripted strategy failure".to_string(),
            }),
        }
    }
}

/// Searcher with canned hits.
pub struct MockSearcher {
    hits: Vec<SearchHit>,
}

impl MockSearcher {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn with_urls(urls: &[(&str, &str)]) -> Self {
        Self {
            hits: urls
                .iter()
                .map(|(title, url)| SearchHit {
                    title: title.to_string(),
                    url: url.to_string(),
                    snippet: None,
                    score: None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Searcher whose every call fails.
pub struct FailingSearcher;

#[async_trait]
impl WebSearcher for FailingSearcher {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Err(ScrapeError::Search {
            status: 503,
            message: "scripted search failure".to_string(),
        })
    }
}
