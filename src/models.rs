use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel chapter selection meaning "no explicit chapter focus".
pub const ALL_CHAPTERS: &str = "All Chapters";

/// A fragment of ingested textbook text. Produced by the external
/// OCR/chaptering pipeline, immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub page: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub correct_explanation: String,
    #[serde(default)]
    pub incorrect_explanations: HashMap<String, String>,
    #[serde(default)]
    pub source_page: String,
    #[serde(default)]
    pub source_snippet: String,
    #[serde(default)]
    pub chapter: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLevel {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStyle {
    Standard,
    #[default]
    Simple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub question: String,
    /// Explicit chapter focus; `None` or "All Chapters" means unfocused.
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub summary_level: SummaryLevel,
    #[serde(default)]
    pub response_style: ResponseStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    /// Page labels cited in the answer footer.
    pub sources: Vec<String>,
    /// Chapters the answer was scoped to (explicit or inferred).
    pub chapters: Vec<String>,
    pub off_topic: bool,
    pub latency_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRequest {
    /// Empty means every chapter of the active book.
    #[serde(default)]
    pub chapters: Vec<String>,
    pub question_count: usize,
    #[serde(default = "default_option_count")]
    pub option_count: usize,
}

fn default_option_count() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizJobResponse {
    pub job_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStatus {
    pub job_id: String,
    pub status: String,
    pub phase: String,
    pub progress: f32,
    pub question_count: usize,
    pub message: Option<String>,
    pub questions: Option<Vec<QuizQuestion>>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: Option<String>,
    pub reset: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}
