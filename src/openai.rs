//! OpenAI client configuration with sensible defaults.

use crate::error::Result;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Client type shared by the chat model and embedder.
pub type OpenAIClient = Client<OpenAIConfig>;

/// Create an OpenAI client with a custom timeout and optional API base
/// (for OpenAI-compatible endpoints). The API key comes from `OPENAI_API_KEY`.
pub fn create_client_with_timeout(timeout: Duration, api_base: Option<&str>) -> Result<OpenAIClient> {
    let http_client = reqwest::Client::builder().timeout(timeout).build()?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::config::Config;

    #[test]
    fn test_custom_api_base_is_used() {
        let client = create_client_with_timeout(DEFAULT_TIMEOUT, Some("http://localhost:11434/v1")).unwrap();
        assert_eq!(client.config().api_base(), "http://localhost:11434/v1");
    }
}
