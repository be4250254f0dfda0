//! Headless-browser rendering via a browserless-style HTTP service.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, ScrapeError};

/// Seam for fetching fully rendered HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn content(&self, url: &str) -> Result<String>;
}

/// Client for the browserless `/content` endpoint.
pub struct BrowserClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }
}

#[async_trait]
impl PageRenderer for BrowserClient {
    /// Fetch fully-rendered HTML for a URL.
    async fn content(&self, url: &str) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let body = serde_json::json!({ "url": url });

        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::Render {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = BrowserClient::new("http://localhost:3000/", Some("secret"));
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
