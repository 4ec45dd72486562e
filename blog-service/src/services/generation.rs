//! Drafting blog posts from facts.

use crate::config::PostDefaults;
use crate::services::providers::{GenerationParams, TextProvider};
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;

/// Stored as the post body when every generation attempt failed, so the
/// failure is visible in the edit form instead of silently losing the post.
pub const GENERATION_FAILED_PLACEHOLDER: &str =
    "**Post generation failed.** The generation service did not respond after several attempts; edit this post and save it with an empty body to try again.";

/// Appended to every machine-written body.
pub const HUMAN_INTERVENTION_FOOTER: &str = "\n * Human Intervention: None\n";

pub const GENERATION_TEMPERATURE: f32 = 0.7;

/// Fill the `{facts}`, `{subject}` and `{style}` placeholders.
pub fn render_prompt(template: &str, subject: &str, facts: &str, style: &str) -> String {
    template
        .replace("{facts}", facts)
        .replace("{subject}", subject)
        .replace("{style}", style)
}

#[derive(Clone)]
pub struct PostGenerator {
    provider: Arc<dyn TextProvider>,
    system: String,
    prompt_template: String,
    temperature: f32,
    retry: RetryConfig,
}

impl PostGenerator {
    pub fn new(provider: Arc<dyn TextProvider>, defaults: &PostDefaults) -> Self {
        Self {
            provider,
            system: defaults.system.clone(),
            prompt_template: defaults.prompt.clone(),
            temperature: GENERATION_TEMPERATURE,
            retry: RetryConfig::generation(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Ask the provider for a post. Never fails: after the last attempt the
    /// placeholder text is returned instead. The footer is always appended.
    pub async fn draft(&self, subject: &str, facts: &str, style: &str) -> String {
        let prompt = render_prompt(&self.prompt_template, subject, facts, style);
        let params = GenerationParams {
            temperature: Some(self.temperature),
            max_tokens: None,
        };

        let provider = self.provider.as_ref();
        let (system, prompt, params) = (self.system.as_str(), prompt.as_str(), &params);

        let result = retry_with_backoff(&self.retry, "draft_post", || async move {
            metrics::counter!("blog_generation_attempts_total", "provider" => provider.name())
                .increment(1);
            provider.generate(system, prompt, params).await
        })
        .await;

        let body = match result {
            Ok(response) => {
                tracing::info!(
                    provider = self.provider.name(),
                    subject = %subject,
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    "Drafted post"
                );
                response.text
            }
            Err(e) => {
                metrics::counter!("blog_generation_fallbacks_total", "provider" => self.provider.name())
                    .increment(1);
                tracing::error!(
                    provider = self.provider.name(),
                    subject = %subject,
                    error = %e,
                    "Post generation failed, storing placeholder"
                );
                GENERATION_FAILED_PLACEHOLDER.to_string()
            }
        };

        body + HUMAN_INTERVENTION_FOOTER
    }
}
