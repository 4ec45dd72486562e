//! Scripted provider for tests.

use super::{GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Fails the first `failures` calls, then answers with `response`.
pub struct MockTextProvider {
    response: String,
    failures: u32,
    calls: AtomicU32,
    last_request: Mutex<Option<(String, String, Option<f32>)>>,
}

impl MockTextProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            failures: 0,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A provider that never succeeds.
    pub fn failing() -> Self {
        Self::new("").failing_times(u32::MAX)
    }

    pub fn failing_times(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// System message, prompt and temperature of the most recent call.
    pub fn last_request(&self) -> Option<(String, String, Option<f32>)> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((system.to_string(), prompt.to_string(), params.temperature));
        }

        if call < self.failures {
            return Err(ProviderError::NetworkError(format!(
                "scripted failure {}",
                call + 1
            )));
        }

        Ok(ProviderResponse {
            text: self.response.clone(),
            input_tokens: prompt.len() as i32 / 4,
            output_tokens: self.response.len() as i32 / 4,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
