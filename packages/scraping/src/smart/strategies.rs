//! Concrete extraction strategies for the smart scraper.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ollama_client::OllamaClient;
use serde::Deserialize;

use crate::browser::PageRenderer;
use crate::error::Result;
use crate::extract;
use crate::fetch;
use crate::smart::{ExtractionStrategy, StrategyKind};

/// System prompt for the model-backed strategies.
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You extract business contact data from website text. \
Reply with a single JSON object with the keys company_name, email, phone, address, description. \
Use null for anything the text does not contain. Never invent values.";

/// Markdown budget sent to the model by the crawl strategy.
const MARKDOWN_LIMIT: usize = 8_000;

/// Plain-text budget sent to the model by the text strategy.
const TEXT_LIMIT: usize = 4_000;

/// Model reply shape shared by both AI strategies.
#[derive(Debug, Default, Deserialize)]
struct ContactReply {
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ContactReply {
    fn into_fields(self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        let pairs = [
            ("company_name", self.company_name),
            ("email", self.email),
            ("phone", self.phone),
            ("address", self.address),
            ("description", self.description),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                let value = value.trim().to_string();
                if !value.is_empty() && value != "null" {
                    fields.insert(key.to_string(), value);
                }
            }
        }
        fields
    }
}

fn non_empty(fields: HashMap<String, String>) -> Option<HashMap<String, String>> {
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Structured crawl (boilerplate-stripped markdown) fed to the model.
pub struct CrawlAiStrategy {
    client: reqwest::Client,
    ai: OllamaClient,
    model: String,
}

impl CrawlAiStrategy {
    pub fn new(ai: OllamaClient, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: fetch::build_client(None)?,
            ai,
            model: model.into(),
        })
    }
}

#[async_trait]
impl ExtractionStrategy for CrawlAiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CrawlAi
    }

    async fn extract(&self, url: &str) -> Result<Option<HashMap<String, String>>> {
        let html = fetch::fetch_html(&self.client, url).await?;
        let markdown = extract::to_markdown(&html);
        if markdown.trim().is_empty() {
            return Ok(None);
        }

        let reply: ContactReply = self
            .ai
            .extract(
                &self.model,
                EXTRACTION_SYSTEM_PROMPT,
                truncate(&markdown, MARKDOWN_LIMIT),
            )
            .await?;

        Ok(non_empty(reply.into_fields()))
    }
}

/// Lightweight text extraction fed to the model.
pub struct TextAiStrategy {
    client: reqwest::Client,
    ai: OllamaClient,
    model: String,
}

impl TextAiStrategy {
    pub fn new(ai: OllamaClient, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: fetch::build_client(None)?,
            ai,
            model: model.into(),
        })
    }
}

#[async_trait]
impl ExtractionStrategy for TextAiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextAi
    }

    async fn extract(&self, url: &str) -> Result<Option<HashMap<String, String>>> {
        let html = fetch::fetch_html(&self.client, url).await?;
        let text = extract::page_text(&html);
        if text.trim().is_empty() {
            return Ok(None);
        }

        let reply: ContactReply = self
            .ai
            .extract(
                &self.model,
                EXTRACTION_SYSTEM_PROMPT,
                truncate(&text, TEXT_LIMIT),
            )
            .await?;

        Ok(non_empty(reply.into_fields()))
    }
}

/// Headless-browser render followed by a heuristic DOM read.
pub struct BrowserDomStrategy {
    renderer: Arc<dyn PageRenderer>,
}

impl BrowserDomStrategy {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ExtractionStrategy for BrowserDomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BrowserDom
    }

    async fn extract(&self, url: &str) -> Result<Option<HashMap<String, String>>> {
        let html = self.renderer.content(url).await?;
        Ok(non_empty(extract::extract_contact_fields(&html, url)))
    }
}

/// Plain-HTTP fetch followed by the same heuristic DOM read.
pub struct HttpDomStrategy {
    client: reqwest::Client,
}

impl HttpDomStrategy {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: fetch::build_client(None)?,
        })
    }
}

#[async_trait]
impl ExtractionStrategy for HttpDomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HttpDom
    }

    async fn extract(&self, url: &str) -> Result<Option<HashMap<String, String>>> {
        let html = fetch::fetch_html(&self.client, url).await?;
        Ok(non_empty(extract::extract_contact_fields(&html, url)))
    }
}
