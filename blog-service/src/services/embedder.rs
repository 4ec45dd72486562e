//! Text embedding client.
//!
//! The embedding service is a plain HTTP GET taking `text` and
//! `instruction` query parameters and answering with a JSON array of floats.

use crate::config::EmbedderConfig;
use async_trait::async_trait;
use reqwest::Client;
use service_core::error::AppError;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;
}

pub struct HttpEmbedder {
    config: EmbedderConfig,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(config: EmbedderConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        metrics::counter!("blog_embedding_requests_total").increment(1);

        let response = self
            .client
            .get(&self.config.embedding_endpoint)
            .query(&[
                ("text", text),
                ("instruction", self.config.instruction.as_str()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Embedding request failed: {}", e);
                AppError::BadGateway(format!("embedding service unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Embedding service returned an error");
            return Err(AppError::BadGateway(format!(
                "embedding service returned {}",
                status
            )));
        }

        let vector: Vec<f32> = response.json().await.map_err(|e| {
            AppError::BadGateway(format!("embedding response was not a vector: {}", e))
        })?;

        if vector.is_empty() {
            return Err(AppError::BadGateway(
                "embedding service returned an empty vector".to_string(),
            ));
        }

        tracing::debug!(dims = vector.len(), text_len = text.len(), "Embedded text");
        Ok(vector)
    }
}

/// Deterministic embedder for tests: known texts map to fixed vectors,
/// anything else gets `fallback`.
pub struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl StaticEmbedder {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl Embedder for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
