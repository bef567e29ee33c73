use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::catalog::ChapterCatalog;
use crate::chat::ChatService;
use crate::chunk_store::ChunkStore;
use crate::config::AppConfig;
use crate::executor::BufferSink;
use crate::history::HistoryStore;
use crate::models::{
    ChatMessage, ChatRequest, QuizJobResponse, QuizRequest, QuizStatus, SessionRequest,
    SessionResponse, SessionSummary,
};
use crate::quiz::{collect_chapter_docs, KeyRotation, QuizGenerator, QuizProgress};
use crate::quota;

#[derive(Clone)]
struct AppState {
    history: HistoryStore,
    chat: Arc<ChatService>,
    catalog: ChapterCatalog,
    store: ChunkStore,
    quiz: Arc<QuizGenerator>,
    api_keys: Vec<String>,
    active_book: Option<String>,
    jobs: Arc<Mutex<HashMap<String, QuizStatus>>>,
}

pub async fn run_server(
    config: AppConfig,
    history: HistoryStore,
    chat: ChatService,
    catalog: ChapterCatalog,
    store: ChunkStore,
    quiz: QuizGenerator,
) -> Result<()> {
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let state = AppState {
        history,
        chat: Arc::new(chat),
        catalog,
        store,
        quiz: Arc::new(quiz),
        api_keys: config.api_keys.clone(),
        active_book: config.active_book.clone(),
        jobs: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chapters", get(list_chapters))
        .route("/api/quiz", post(start_quiz))
        .route("/api/quiz/:job_id", get(get_quiz_status))
        .route("/api/session", post(create_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:session_id/messages", get(list_messages))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<crate::models::ChatAnswer>, ApiError> {
    let mut sink = BufferSink::default();
    let answer = state.chat.answer(request, &mut sink).await?;
    Ok(Json(answer))
}

async fn list_chapters(State(state): State<AppState>) -> Json<Vec<String>> {
    let chapters = match state.active_book.as_deref() {
        Some(book) => state.catalog.chapters(book).await,
        None => vec![],
    };
    Json(chapters)
}

async fn start_quiz(
    State(state): State<AppState>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuizJobResponse>, ApiError> {
    if request.question_count == 0 {
        return Err(ApiError::bad_request(
            "question_count must be at least 1".to_string(),
        ));
    }

    let job_id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let initial = QuizStatus {
        job_id: job_id.clone(),
        status: "started".to_string(),
        phase: "queued".to_string(),
        progress: 0.0,
        question_count: 0,
        message: None,
        questions: None,
        started_at: now,
        updated_at: now,
    };

    {
        let mut jobs = state
            .jobs
            .lock()
            .map_err(|_| ApiError::from(anyhow::anyhow!("lock poisoned")))?;
        jobs.insert(job_id.clone(), initial);
    }

    let state_for_task = state.clone();
    let job_id_for_task = job_id.clone();
    tokio::spawn(async move {
        if let Err(err) = run_quiz_job(&state_for_task, &job_id_for_task, request).await {
            tracing::error!("quiz job {} failed: {}", job_id_for_task, err);
            update_job(&state_for_task, &job_id_for_task, |status| {
                status.status = "failed".to_string();
                status.phase = "error".to_string();
                status.message = Some(format!("{err:#}"));
            });
        }
    });

    Ok(Json(QuizJobResponse {
        job_id,
        status: "started".to_string(),
    }))
}

async fn run_quiz_job(state: &AppState, job_id: &str, request: QuizRequest) -> Result<()> {
    update_job(state, job_id, |status| {
        status.status = "running".to_string();
        status.phase = "Collecting textbook content...".to_string();
    });

    let source = state.active_book.as_deref();
    let chapter_docs = collect_chapter_docs(&state.store, source, &request.chapters).await?;
    if chapter_docs.is_empty() {
        anyhow::bail!("no textbook content found for the requested chapters");
    }

    let counts: HashMap<String, usize> = chapter_docs
        .iter()
        .map(|(chapter, docs)| (chapter.clone(), docs.len()))
        .collect();
    let quotas = quota::allocate(&counts, request.question_count);

    let mut keys = KeyRotation::new(state.api_keys.clone())?;
    let book = state.active_book.clone().unwrap_or_default();

    let progress_state = state.clone();
    let progress_job = job_id.to_string();
    let questions = state
        .quiz
        .generate(
            &book,
            &chapter_docs,
            &quotas,
            request.option_count,
            &mut keys,
            move |p: QuizProgress| {
                update_job(&progress_state, &progress_job, |status| {
                    status.progress = p.fraction;
                    status.phase = p.phase.clone();
                });
            },
        )
        .await?;

    update_job(state, job_id, |status| {
        status.status = "completed".to_string();
        status.phase = "Quiz ready".to_string();
        status.progress = 1.0;
        status.question_count = questions.len();
        status.questions = Some(questions.clone());
    });
    Ok(())
}

fn update_job(state: &AppState, job_id: &str, apply: impl FnOnce(&mut QuizStatus)) {
    if let Ok(mut jobs) = state.jobs.lock() {
        if let Some(status) = jobs.get_mut(job_id) {
            apply(status);
            status.updated_at = Utc::now();
        }
    }
}

async fn get_quiz_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<QuizStatus>, ApiError> {
    let status = state
        .jobs
        .lock()
        .map_err(|_| ApiError::from(anyhow::anyhow!("lock poisoned")))?
        .get(&job_id)
        .cloned();

    match status {
        Some(status) => Ok(Json(status)),
        None => Err(ApiError::not_found(format!("quiz job not found: {job_id}"))),
    }
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.reset.unwrap_or(false) {
        if let Some(session_id) = request.session_id {
            state.history.delete_session_messages(&session_id).await?;
            return Ok(Json(SessionResponse { session_id }));
        }
    }

    let session_id = Uuid::new_v4().to_string();
    state.history.save_session(&session_id, None).await?;
    Ok(Json(SessionResponse { session_id }))
}

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let sessions = state.history.recent_sessions(10).await?;
    Ok(Json(sessions))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = state.history.messages(&session_id).await?;
    Ok(Json(messages))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: value.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
