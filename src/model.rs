use anyhow::Result;
use async_trait::async_trait;

use crate::gemini::{GeminiClient, GeminiStream};

/// Capability interface for one generative model. A fallback chain is
/// an ordered sequence of these.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Complete generation in one call.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Incremental generation. The stream yields plain text chunks.
    async fn open_stream(&self, prompt: &str) -> Result<Box<dyn TextStream>>;
}

/// Pull-based text stream so callers can react to the first chunk
/// before committing to a backend.
#[async_trait]
pub trait TextStream: Send {
    async fn next_chunk(&mut self) -> Option<Result<String>>;
}

/// Gemini model bound to a concrete API key.
pub struct GeminiBackend {
    client: GeminiClient,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiBackend {
    pub fn new(
        client: GeminiClient,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.client
            .invoke(&self.model, &self.api_key, prompt, self.temperature)
            .await
    }

    async fn open_stream(&self, prompt: &str) -> Result<Box<dyn TextStream>> {
        let stream = self
            .client
            .open_stream(&self.model, &self.api_key, prompt, self.temperature)
            .await?;
        Ok(Box::new(GeminiTextStream { inner: stream }))
    }
}

struct GeminiTextStream {
    inner: GeminiStream,
}

#[async_trait]
impl TextStream for GeminiTextStream {
    async fn next_chunk(&mut self) -> Option<Result<String>> {
        self.inner.next_chunk().await
    }
}

pub fn is_rate_limit_error(err: &anyhow::Error) -> bool {
    let msg = format!("{err:#}");
    msg.contains("429") || msg.contains("RESOURCE_EXHAUSTED") || {
        let lower = msg.to_ascii_lowercase();
        lower.contains("quota")
    }
}

pub fn is_timeout_error(err: &anyhow::Error) -> bool {
    let lower = format!("{err:#}").to_ascii_lowercase();
    lower.contains("timeout") || lower.contains("deadline")
}

/// Rate limits and timeouts move the executor to the next backend;
/// anything else propagates.
pub fn is_fallback_trigger(err: &anyhow::Error) -> bool {
    is_rate_limit_error(err) || is_timeout_error(err)
}
