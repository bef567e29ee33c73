use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub embedding_model: String,
    /// Ordered fallback chain for study-mode answers.
    pub chat_models: Vec<String>,
    /// Ordered fallback chain for quiz generation.
    pub quiz_models: Vec<String>,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct QuizConfig {
    pub batch_size: usize,
    pub cooldown_secs: u64,
    /// Bound on full key-rotation cycles per batch before the job fails.
    pub max_rotation_cycles: usize,
    pub past_question_limit: usize,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub ollama_base_url: String,
    pub gemini_base_url: String,
    pub qdrant_base_url: String,
    pub qdrant_collection: String,
    /// Source identifier of the single active book.
    pub active_book: Option<String>,
    pub api_keys: Vec<String>,
    pub models: ModelConfig,
    pub quiz: QuizConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = env::var("STUDYBOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        Self {
            bind_addr: env::var("STUDYBOT_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            data_dir,
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            qdrant_base_url: env::var("QDRANT_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:6333".to_string()),
            qdrant_collection: env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| "textbook_chunks".to_string()),
            active_book: env::var("ACTIVE_BOOK").ok().filter(|v| !v.is_empty()),
            api_keys: api_keys_from_env(),
            models: ModelConfig {
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "mxbai-embed-large".to_string()),
                chat_models: model_list("CHAT_MODELS", DEFAULT_CHAT_MODELS),
                quiz_models: model_list("QUIZ_MODELS", DEFAULT_QUIZ_MODELS),
                temperature: env::var("MODEL_TEMPERATURE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.3),
            },
            quiz: QuizConfig {
                batch_size: env::var("QUIZ_BATCH_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                cooldown_secs: env::var("QUIZ_COOLDOWN_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                max_rotation_cycles: env::var("QUIZ_MAX_ROTATION_CYCLES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(25),
                past_question_limit: env::var("QUIZ_PAST_QUESTION_LIMIT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            },
        }
    }

    pub fn sqlite_dsn(&self) -> String {
        format!(
            "sqlite://{}",
            self.data_dir.join("studybot.sqlite3").display()
        )
    }
}

const DEFAULT_CHAT_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-2.5-flash",
];

const DEFAULT_QUIZ_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.0-flash",
];

fn model_list(var: &str, defaults: &[&str]) -> Vec<String> {
    match env::var(var) {
        Ok(raw) => {
            let models: Vec<String> = raw
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if models.is_empty() {
                defaults.iter().map(|m| m.to_string()).collect()
            } else {
                models
            }
        }
        Err(_) => defaults.iter().map(|m| m.to_string()).collect(),
    }
}

/// Collects `GOOGLE_API_KEY` plus every `GOOGLE_API_KEY_*` variable,
/// suffixed keys in lexicographic suffix order, duplicates removed.
fn api_keys_from_env() -> Vec<String> {
    let mut suffixed = BTreeMap::new();
    for (name, value) in env::vars() {
        if let Some(suffix) = name.strip_prefix("GOOGLE_API_KEY_") {
            if !value.is_empty() {
                suffixed.insert(suffix.to_string(), value);
            }
        }
    }

    let mut keys = Vec::new();
    if let Ok(primary) = env::var("GOOGLE_API_KEY") {
        if !primary.is_empty() {
            keys.push(primary);
        }
    }
    for value in suffixed.into_values() {
        if !keys.contains(&value) {
            keys.push(value);
        }
    }
    keys
}
