//! Error types for mcp-ledger.

use thiserror::Error;

/// Result type alias for mcp-ledger.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger error types.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// SQLite error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON-RPC error returned by an MCP peer.
    #[error("MCP error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Language model error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Invalid input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Network(e.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(e: toml::de::Error) -> Self {
        LedgerError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(e: toml::ser::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
