//! Web search used for fallback lead discovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::types::SearchHit;

/// Search provider seam.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Tavily API client.
pub struct TavilySearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    search_depth: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<f32>,
}

impl TavilySearcher {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { api_key, client }
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: self.api_key.clone(),
            query: query.to_string(),
            search_depth: "basic".to_string(),
            max_results: limit,
        };

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Search {
                status: status.as_u16(),
                message,
            });
        }

        let body: TavilyResponse = response.json().await?;

        Ok(body
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                score: r.score,
            })
            .collect())
    }
}

/// Searcher used when no API key is configured.
pub struct NoopSearcher;

#[async_trait]
impl WebSearcher for NoopSearcher {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        tracing::warn!("NoopSearcher: search called but no search API key configured");
        Ok(vec![])
    }
}
