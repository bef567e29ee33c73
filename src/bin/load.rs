use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studybot::chunk_store::{ChunkPayload, ChunkPoint, ChunkStore};
use studybot::config::AppConfig;
use studybot::embedder::EmbeddingClient;
use studybot::history::HistoryStore;
use studybot::models::Chunk;

const UPSERT_BATCH_SIZE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "load")]
#[command(about = "Load pre-chunked textbook JSONL into the vector store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed and upsert every chunk from a JSONL file.
    Load {
        /// One JSON object per line: content, source, chapter, page.
        #[arg(long)]
        file: String,
        /// Drop and recreate the collection first.
        #[arg(long, default_value_t = false)]
        recreate: bool,
    },
    /// Remove a book: its chunks and its quiz question history.
    Remove {
        #[arg(long)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let store = ChunkStore::new(
        config.qdrant_base_url.clone(),
        config.qdrant_collection.clone(),
    );

    match cli.command {
        Command::Load { file, recreate } => {
            let embedder = EmbeddingClient::new(config.ollama_base_url.clone());
            load_file(&config, &store, &embedder, &file, recreate).await
        }
        Command::Remove { source } => {
            store.delete_by_source(&source).await?;
            let history = HistoryStore::new(&config).await?;
            history.delete_past_questions_by_source(&source).await?;
            println!("Removed all chunks and quiz history for {source}");
            Ok(())
        }
    }
}

async fn load_file(
    config: &AppConfig,
    store: &ChunkStore,
    embedder: &EmbeddingClient,
    path: &str,
    recreate: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {path}"))?;

    let mut chunks = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: Chunk = serde_json::from_str(line)
            .with_context(|| format!("invalid chunk on line {}", idx + 1))?;
        chunks.push(chunk);
    }
    if chunks.is_empty() {
        anyhow::bail!("{path} contained no chunks");
    }
    println!("Embedding {} chunks from {path}", chunks.len());

    let mut batch: Vec<ChunkPoint> = Vec::with_capacity(UPSERT_BATCH_SIZE);
    let mut recreated = !recreate;
    let mut upserted = 0usize;

    for chunk in chunks {
        let vector = embedder
            .embed(&config.models.embedding_model, &chunk.content)
            .await?;

        if !recreated {
            store.recreate_collection(vector.len()).await?;
            recreated = true;
        }

        batch.push(ChunkPoint {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            payload: ChunkPayload {
                content: chunk.content,
                source: chunk.source,
                chapter: chunk.chapter,
                page: chunk.page,
            },
        });

        if batch.len() >= UPSERT_BATCH_SIZE {
            store.upsert_points(&batch).await?;
            upserted += batch.len();
            println!("Upserted {upserted} chunks...");
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store.upsert_points(&batch).await?;
        upserted += batch.len();
    }

    println!("Load complete. chunks={upserted}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
