//! Pure Ollama REST API client
//!
//! A clean, minimal client for a locally running Ollama server with no
//! domain-specific logic. Supports plain completions and JSON-forced
//! structured extraction.
//!
//! # Example
//!
//! ```rust,ignore
//! use ollama_client::{GenerateRequest, OllamaClient};
//!
//! let client = OllamaClient::from_env()?;
//!
//! // Plain completion
//! let reply = client
//!     .generate(GenerateRequest::new("llama3.1", "Say hello"))
//!     .await?;
//!
//! // Typed extraction (model is forced into JSON mode)
//! #[derive(serde::Deserialize)]
//! struct Contact { email: Option<String>, phone: Option<String> }
//!
//! let contact: Contact = client
//!     .extract("llama3.1", "Extract contact data as JSON.", &page_text)
//!     .await?;
//! ```

pub mod error;
pub mod types;

pub use error::{OllamaError, Result};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse};

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Default model used when `OLLAMA_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "llama3.1";

/// Pure Ollama API client.
#[derive(Clone)]
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a new client against the given base URL
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from the `OLLAMA_BASE_URL` environment variable, falling
    /// back to the standard local address.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        Self::new(base_url)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a single non-streaming completion.
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| OllamaError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Parse(format!("Invalid generate response: {}", e)))?;

        debug!(
            model = %reply.model,
            eval_count = ?reply.eval_count,
            "Ollama generate completed"
        );

        Ok(reply)
    }

    /// Typed structured extraction.
    ///
    /// Forces the model into JSON mode and deserializes the reply into `T`.
    /// The system prompt should describe the expected object shape.
    pub async fn extract<T: DeserializeOwned>(
        &self,
        model: &str,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let request = GenerateRequest::new(model, user_prompt)
            .json()
            .with_system(system_prompt)
            .with_options(GenerateOptions {
                temperature: Some(0.0),
                num_predict: None,
            });

        let reply = self.generate(request).await?;

        serde_json::from_str(&reply.response)
            .map_err(|e| OllamaError::Parse(format!("Failed to deserialize model reply: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_json_mode() {
        let request = GenerateRequest::new("llama3.1", "hi").json();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
