//! Error types for the Ollama client.

use thiserror::Error;

/// Result type for Ollama client operations.
pub type Result<T> = std::result::Result<T, OllamaError>;

/// Ollama client errors.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Configuration error (bad base URL, missing model)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (server unreachable, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response from the Ollama server)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (model reply was not the expected JSON)
    #[error("Parse error: {0}")]
    Parse(String),
}
