//! Typed errors for the scraping library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! match on failure classes.

use thiserror::Error;

/// Errors that can occur while scraping.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Headless-browser rendering service failed
    #[error("render failed ({status}): {message}")]
    Render { status: u16, message: String },

    /// Search API failure
    #[error("search API error ({status}): {message}")]
    Search { status: u16, message: String },

    /// AI-assisted extraction failed
    #[error("AI extraction failed: {0}")]
    Ai(#[from] ollama_client::OllamaError),

    /// Invalid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias for scraping operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
