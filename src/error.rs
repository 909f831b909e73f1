//! Error types for Kurs.

use thiserror::Error;

/// Library-level error type for Kurs operations.
#[derive(Error, Debug)]
pub enum KursError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse course document: {0}")]
    IngestionParse(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// The model asked for a tool that is not registered. Indicates a
    /// mismatch between the offered schemas and the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Kurs operations.
pub type Result<T> = std::result::Result<T, KursError>;
