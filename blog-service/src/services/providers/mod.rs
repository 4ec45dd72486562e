//! Text generation backends.
//!
//! A deployment talks to exactly one backend, picked by the `provider`
//! field of `model.json`. Both backends share the [`TextProvider`] trait so
//! the drafting logic does not care which one is configured.

pub mod gemini;
pub mod mock;
pub mod openai;

use crate::config::{ModelConfig, ProviderKind};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider returned no text")]
    EmptyResponse,
}

/// Generated text plus token accounting, when the backend reports it.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a completion for `prompt` under the given system message.
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected in `model.json`.
pub fn build_provider(config: &ModelConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let provider: Arc<dyn TextProvider> = match config.provider {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiProvider::new(openai::OpenAiConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })?),
        ProviderKind::Gemini => Arc::new(gemini::GeminiProvider::new(gemini::GeminiConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })?),
    };

    tracing::info!(
        provider = provider.name(),
        model = %config.model,
        "Initialized text provider"
    );
    Ok(provider)
}

pub(crate) fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Failed to create HTTP client: {}", e)))
}
