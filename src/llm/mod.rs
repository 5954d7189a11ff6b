//! Text generation backends
//!
//! Architecture:
//! - TextGenerationService trait: prompt in, completion out
//! - OllamaClient for a local Ollama server (/api/generate)
//! - OpenAiClient for OpenAI-compatible chat completion APIs (OpenAI, Groq, ...)
//!
//! The same service is used for query expansion and for answer synthesis.

mod ollama;
mod openai;

pub use ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
pub use openai::OpenAiClient;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation service unreachable: {0}")]
    Unreachable(String),

    #[error("Generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response from generation service: {0}")]
    MalformedResponse(String),

    #[error("Generation client misconfigured: {0}")]
    Configuration(String),
}

/// Black-box text completion
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Complete a prompt, returning the generated text
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Build the configured generation client
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn TextGenerationService>, GenerationError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    tracing::info!(
        "Initializing generation client: {} ({})",
        config.provider,
        config.model
    );

    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaClient::with_config(
            &config.base_url,
            &config.model,
            config.temperature,
            timeout,
        )?)),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                GenerationError::Configuration(format!(
                    "Environment variable {} is not set",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(OpenAiClient::with_config(
                &config.base_url,
                &config.model,
                api_key,
                config.temperature,
                timeout,
            )?))
        }
        other => Err(GenerationError::Configuration(format!(
            "Unsupported provider: {}. Supported: ollama, openai",
            other
        ))),
    }
}

/// Map a reqwest failure onto the generation taxonomy
fn map_request_error(error: reqwest::Error) -> GenerationError {
    if error.is_decode() {
        GenerationError::MalformedResponse(error.to_string())
    } else {
        GenerationError::Unreachable(error.to_string())
    }
}

/// Turn a non-success response into a status error
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GenerationError::Status { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ollama_client() {
        let config = LlmConfig::default();
        let client = build_client(&config).unwrap();
        assert_eq!(client.model_name(), config.model);
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            build_client(&config),
            Err(GenerationError::Configuration(_))
        ));
    }

    #[test]
    fn test_openai_requires_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: "DOCQA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            build_client(&config),
            Err(GenerationError::Configuration(_))
        ));
    }
}
