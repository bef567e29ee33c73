use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::catalog::ChapterCatalog;
use crate::executor::{page_citations, stream_with_fallback, StreamSink};
use crate::guard::is_off_topic;
use crate::history::{generate_chat_title, HistoryStore};
use crate::model::{is_rate_limit_error, ModelBackend};
use crate::models::{ChatAnswer, ChatRequest, Chunk, ResponseStyle, SummaryLevel, ALL_CHAPTERS};
use crate::retrieval::Retriever;

const OFF_TOPIC_MESSAGE: &str = "**I'm specialised in Anatomy & Physiology** — your question \
seems to be outside my area of expertise.\n\n\
Here's what I **can** help you with:\n\
- Ask anything about your textbook's chapters\n\
- Get breakdowns of anatomical structures and physiological processes\n\
- Switch between *Simple* and *Standard* language styles\n\
- Choose *Low* or *High* depth for your answers\n\
- Try Test Mode to quiz yourself";

const NO_CONTEXT_MESSAGE: &str =
    "I couldn't find any relevant information in the book for that question.";

const QUOTA_MESSAGE: &str = "**API Quota Exceeded:** You are using the free tier of the \
generative API. Please wait ~45 seconds and try again.";

pub struct ChatService {
    history: HistoryStore,
    retriever: Retriever,
    catalog: ChapterCatalog,
    chain: Arc<Vec<Box<dyn ModelBackend>>>,
    active_book: Option<String>,
}

impl ChatService {
    pub fn new(
        history: HistoryStore,
        retriever: Retriever,
        catalog: ChapterCatalog,
        chain: Arc<Vec<Box<dyn ModelBackend>>>,
        active_book: Option<String>,
    ) -> Self {
        Self {
            history,
            retriever,
            catalog,
            chain,
            active_book,
        }
    }

    /// One study-mode turn. The sink receives the answer incrementally;
    /// the returned value carries the final text plus citations.
    pub async fn answer(
        &self,
        request: ChatRequest,
        sink: &mut dyn StreamSink,
    ) -> Result<ChatAnswer> {
        let started = Instant::now();

        // The first message of a session names it.
        let first_message = self
            .history
            .session_message_count(&request.session_id)
            .await?
            == 0;
        if first_message {
            let title = generate_chat_title(&request.question);
            self.history
                .save_session(&request.session_id, Some(&title))
                .await?;
        }
        self.history
            .save_message(&request.session_id, "user", &request.question)
            .await?;

        if is_off_topic(&request.question) {
            sink.push(OFF_TOPIC_MESSAGE);
            self.history
                .save_message(&request.session_id, "assistant", OFF_TOPIC_MESSAGE)
                .await?;
            return Ok(ChatAnswer {
                answer: OFF_TOPIC_MESSAGE.to_string(),
                sources: vec![],
                chapters: vec![],
                off_topic: true,
                latency_ms: started.elapsed().as_millis(),
            });
        }

        let source = self.active_book.as_deref();
        let known_chapters = match source {
            Some(book) => self.catalog.chapters(book).await,
            None => vec![],
        };

        let retrieval = self
            .retriever
            .retrieve(
                &request.question,
                request.chapter.as_deref(),
                &known_chapters,
                source,
            )
            .await;

        if retrieval.chunks.is_empty() {
            sink.push(NO_CONTEXT_MESSAGE);
            self.history
                .save_message(&request.session_id, "assistant", NO_CONTEXT_MESSAGE)
                .await?;
            return Ok(ChatAnswer {
                answer: NO_CONTEXT_MESSAGE.to_string(),
                sources: vec![],
                chapters: retrieval.inferred_chapters,
                off_topic: false,
                latency_ms: started.elapsed().as_millis(),
            });
        }

        let scope = scope_chapters(request.chapter.as_deref(), &retrieval.inferred_chapters);
        let prompt = build_tutor_prompt(
            &request.question,
            &retrieval.chunks,
            request.summary_level,
            request.response_style,
            &scope,
        );

        let answer =
            match stream_with_fallback(&self.chain, &prompt, &retrieval.chunks, sink).await {
                Ok(answer) => answer,
                Err(err) => {
                    tracing::error!(error = ?err, "answer generation failed across the chain");
                    let message = if is_rate_limit_error(&err) {
                        QUOTA_MESSAGE.to_string()
                    } else {
                        format!("**An error occurred:** {err}")
                    };
                    sink.push(&message);
                    message
                }
            };

        self.history
            .save_message(&request.session_id, "assistant", &answer)
            .await?;

        Ok(ChatAnswer {
            answer,
            sources: page_citations(&retrieval.chunks),
            chapters: scope,
            off_topic: false,
            latency_ms: started.elapsed().as_millis(),
        })
    }
}

/// The chapters the answer must stay confined to: an explicit selection
/// wins, otherwise whatever was inferred from the query.
fn scope_chapters(selected: Option<&str>, inferred: &[String]) -> Vec<String> {
    match selected {
        Some(chapter) if !chapter.is_empty() && chapter != ALL_CHAPTERS => {
            vec![chapter.to_string()]
        }
        _ => inferred.to_vec(),
    }
}

fn detail_instruction(level: SummaryLevel) -> String {
    let base = match level {
        SummaryLevel::Low => {
            "Provide a **highly concise**, high-level summary. \
             Limit your response to **exactly 3-5 bullet points** focusing only on the most critical information. \
             Be extremely brief and avoid any unnecessary elaboration."
        }
        SummaryLevel::High => {
            "Provide a **comprehensive, multi-sectioned mastery breakdown**. \
             Structure your response with clear headings (e.g., 'Core Concepts', 'Detailed Mechanism', 'Clinical Relevance'). \
             For every concept, explain the 'How' and 'Why' in great detail. \
             Include practical examples or clinical significance where relevant to deepen understanding. \
             Aim for a deep, academic exploration of the topic."
        }
    };
    format!("{base} This level of detail applies to BOTH the textbook summary and the General Knowledge section.")
}

fn tone_instruction(style: ResponseStyle) -> String {
    let base = match style {
        ResponseStyle::Standard => {
            "Ensure the tone and language complexity is academic, professional, and sophisticated."
        }
        ResponseStyle::Simple => {
            "Rewrite all information using simple, everyday language as if explaining to a 10-year-old. \
             Avoid medical jargon—replace it with common terms or clear analogies. \
             Keep it friendly and very easy to digest without losing factual core."
        }
    };
    format!("{base} This complexity of language applies to BOTH the textbook summary and the General Knowledge section.")
}

fn scope_instruction(scope: &[String]) -> String {
    if scope.is_empty() {
        return String::new();
    }
    let target = scope.join(" and ");
    format!(
        "\nCRITICAL SCOPE: You are currently focused strictly on **{target}**. \
         Your textbook summary MUST NOT include information from other chapters, even if you \
         suspect what they contain from your internal knowledge. Stay confined to the provided \
         {target} excerpt for the first part of your response."
    )
}

fn build_tutor_prompt(
    question: &str,
    docs: &[Chunk],
    summary_level: SummaryLevel,
    response_style: ResponseStyle,
    scope: &[String],
) -> String {
    let context = docs
        .iter()
        .map(|doc| {
            let chapter = if doc.chapter.is_empty() {
                "Unknown"
            } else {
                &doc.chapter
            };
            format!(
                "--- Chapter: {chapter} | Page: {} ---\n{}",
                doc.page, doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an expert Anatomy and Physiology professor and a highly skilled editor.\n\
         Your task is to answer the user's question based on the Dutch textbook excerpt provided.\n\
         {scope}\n\n\
         CRITICAL INSTRUCTION:\n\
         First, you MUST always summarize whatever information IS present in the provided text excerpt that relates to the user's query, even if it does not fully answer their question.\n\
         Write this section clearly based strictly on the excerpt. DO NOT hallucinate or \"complete\" the textbook's info using your own knowledge in this part.\n\n\
         Then, if the excerpt did NOT fully answer the user's question or lacked the core information, you MUST create a new paragraph starting with \"**General Knowledge:**\". In this section, provide the full correct answer to the user's query using your own broad medical knowledge.\n\n\
         Please provide all answers in English.\n\n\
         LEVEL OF DETAIL INSTRUCTION: {detail}\n\n\
         COMPLEXITY OF LANGUAGE INSTRUCTION: {tone}\n\n\
         TEXT EXCERPT:\n{context}\n\n\
         QUESTION: {question}",
        scope = scope_instruction(scope),
        detail = detail_instruction(summary_level),
        tone = tone_instruction(response_style),
    )
}
