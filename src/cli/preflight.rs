//! Pre-flight checks before operations that call the model provider.
//!
//! Validates configuration up front so commands fail with a clear message
//! instead of midway through a batch.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{KursError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds chunks.
    Ingest,
    /// Asking questions calls the chat model and embeds queries.
    Ask,
    /// Search embeds the query.
    Search,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    let embeds_remotely = settings.embedding.provider == EmbeddingProvider::OpenAI;

    match operation {
        Operation::Ingest | Operation::Search if embeds_remotely => check_api_key(),
        Operation::Ingest | Operation::Search => Ok(()),
        // Custom endpoints may not need a key for chat, but embeddings still do.
        Operation::Ask if settings.rag.api_base.is_some() && !embeds_remotely => Ok(()),
        Operation::Ask => check_api_key(),
    }
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(KursError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(KursError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
