use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedder::normalize_err_body;

/// REST client for the Gemini generative API. One instance is shared
/// across every model in a fallback chain; the model name and API key
/// are supplied per call.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
        }
    }

    /// Single-shot generation, used for quiz batches.
    pub async fn invoke(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        );

        let response = self
            .client
            .post(url)
            .json(&GenerateRequest::from_prompt(prompt, temperature))
            .send()
            .await
            .context("failed to call gemini generate endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "gemini generateContent returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let decoded = response
            .json::<GenerateResponse>()
            .await
            .context("failed to decode gemini generate response")?;

        response_text(decoded)
    }

    /// Server-sent-event stream, used for study-mode answers.
    pub async fn open_stream(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<GeminiStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, api_key
        );

        let response = self
            .client
            .post(url)
            .json(&GenerateRequest::from_prompt(prompt, temperature))
            .send()
            .await
            .context("failed to call gemini streaming endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "gemini streamGenerateContent returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        Ok(GeminiStream {
            bytes: response.bytes_stream().boxed(),
            buffer: String::new(),
            done: false,
        })
    }
}

/// Incremental SSE reader over a streaming generate call. Each event
/// carries a partial `GenerateResponse`; its text parts are the chunk.
pub struct GeminiStream {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: String,
    done: bool,
}

impl GeminiStream {
    /// Next text chunk, or `None` once the stream is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(line) = self.take_line() {
                match parse_sse_line(&line) {
                    SseEvent::Text(text) if !text.is_empty() => return Some(Ok(text)),
                    SseEvent::Error(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                    _ => continue,
                }
            }

            if self.done {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(bytes)) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(
                        anyhow::Error::new(err).context("gemini stream transport error")
                    ));
                }
                None => {
                    self.done = true;
                    // Flush whatever is left without a trailing newline.
                    if !self.buffer.is_empty() {
                        let rest = std::mem::take(&mut self.buffer);
                        if let SseEvent::Text(text) = parse_sse_line(&rest) {
                            if !text.is_empty() {
                                return Some(Ok(text));
                            }
                        }
                    }
                }
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.find('\n')?;
        let line = self.buffer[..pos].trim_end_matches('\r').to_string();
        self.buffer.drain(..=pos);
        Some(line)
    }
}

enum SseEvent {
    Text(String),
    Skip,
    Error(anyhow::Error),
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return SseEvent::Skip;
    }

    match serde_json::from_str::<GenerateResponse>(data) {
        // Trailing events may carry only usage metadata, no candidates.
        Ok(decoded) if decoded.candidates.is_empty() => SseEvent::Skip,
        Ok(decoded) => match response_text(decoded) {
            Ok(text) => SseEvent::Text(text),
            Err(err) => SseEvent::Error(err),
        },
        Err(err) => SseEvent::Error(
            anyhow::Error::new(err).context("failed to decode gemini stream event"),
        ),
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn from_prompt(prompt: &'a str, temperature: f32) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Normalizes the provider response shape into plain text: all text
/// parts of the first candidate, concatenated.
fn response_text(response: GenerateResponse) -> Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("gemini response contained no candidates"))?;

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text)
}
