use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use studybot::catalog::ChapterCatalog;
use studybot::chat::ChatService;
use studybot::chunk_store::ChunkStore;
use studybot::embedder::EmbeddingClient;
use studybot::gemini::GeminiClient;
use studybot::history::HistoryStore;
use studybot::model::{GeminiBackend, ModelBackend};
use studybot::quiz::{GeminiChainBuilder, QuizGenerator};
use studybot::retrieval::Retriever;
use studybot::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let history = HistoryStore::new(&config).await?;
    let store = ChunkStore::new(
        config.qdrant_base_url.clone(),
        config.qdrant_collection.clone(),
    );
    let embedder = EmbeddingClient::new(config.ollama_base_url.clone());
    let gemini = GeminiClient::new(config.gemini_base_url.clone());
    let catalog = ChapterCatalog::new(store.clone());

    let retriever = Retriever::new(
        store.clone(),
        embedder,
        config.models.embedding_model.clone(),
    );

    // Study-mode answers run on the first configured key; quiz jobs
    // rotate through all of them.
    let chat_key = config.api_keys.first().cloned().unwrap_or_default();
    let chat_chain: Vec<Box<dyn ModelBackend>> = config
        .models
        .chat_models
        .iter()
        .map(|model| {
            Box::new(GeminiBackend::new(
                gemini.clone(),
                model.clone(),
                chat_key.clone(),
                config.models.temperature,
            )) as Box<dyn ModelBackend>
        })
        .collect();

    let chat = ChatService::new(
        history.clone(),
        retriever,
        catalog.clone(),
        Arc::new(chat_chain),
        config.active_book.clone(),
    );

    let chains = Arc::new(GeminiChainBuilder::new(
        gemini,
        config.models.quiz_models.clone(),
        config.models.temperature,
    ));
    let quiz = QuizGenerator::new(history.clone(), chains, config.quiz.clone());

    run_server(config, history, chat, catalog, store, quiz).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
