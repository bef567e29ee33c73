use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;

use crate::catalog::chapter_sort_key;
use crate::chunk_store::{ChunkStore, Filter};
use crate::config::QuizConfig;
use crate::gemini::GeminiClient;
use crate::history::HistoryStore;
use crate::model::{GeminiBackend, ModelBackend};
use crate::models::{Chunk, QuizQuestion};

/// Round-robin cursor over the configured API keys. Advancing past the
/// last key wraps to the first and reports the wrap so the caller can
/// apply a cooldown.
#[derive(Debug, Clone)]
pub struct KeyRotation {
    keys: Vec<String>,
    cursor: usize,
}

impl KeyRotation {
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            anyhow::bail!("no API keys configured; set GOOGLE_API_KEY");
        }
        Ok(Self { keys, cursor: 0 })
    }

    pub fn current(&self) -> &str {
        &self.keys[self.cursor]
    }

    /// One-based position for progress messages.
    pub fn position(&self) -> usize {
        self.cursor + 1
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Moves to the next key; returns true when the rotation wrapped
    /// around, meaning every key has now been tried.
    pub fn advance(&mut self) -> bool {
        self.cursor = (self.cursor + 1) % self.keys.len();
        self.cursor == 0
    }
}

/// Builds a fresh ordered model chain for one API key.
pub trait ChainBuilder: Send + Sync {
    fn chain(&self, api_key: &str) -> Vec<Box<dyn ModelBackend>>;
}

pub struct GeminiChainBuilder {
    client: GeminiClient,
    models: Vec<String>,
    temperature: f32,
}

impl GeminiChainBuilder {
    pub fn new(client: GeminiClient, models: Vec<String>, temperature: f32) -> Self {
        Self {
            client,
            models,
            temperature,
        }
    }
}

impl ChainBuilder for GeminiChainBuilder {
    fn chain(&self, api_key: &str) -> Vec<Box<dyn ModelBackend>> {
        self.models
            .iter()
            .map(|model| {
                Box::new(GeminiBackend::new(
                    self.client.clone(),
                    model.clone(),
                    api_key,
                    self.temperature,
                )) as Box<dyn ModelBackend>
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct QuizProgress {
    pub fraction: f32,
    pub phase: String,
}

pub struct QuizGenerator {
    history: HistoryStore,
    chains: Arc<dyn ChainBuilder>,
    config: QuizConfig,
}

impl QuizGenerator {
    pub fn new(history: HistoryStore, chains: Arc<dyn ChainBuilder>, config: QuizConfig) -> Self {
        Self {
            history,
            chains,
            config,
        }
    }

    /// Generates the full quiz: chapters in display order, quota split
    /// into batches, credentials rotated on exhaustion. Fails with a
    /// terminal error once the configured rotation-cycle bound is hit.
    pub async fn generate(
        &self,
        book: &str,
        chapter_docs: &HashMap<String, Vec<Chunk>>,
        quotas: &HashMap<String, usize>,
        option_count: usize,
        keys: &mut KeyRotation,
        mut progress: impl FnMut(QuizProgress),
    ) -> Result<Vec<QuizQuestion>> {
        let total_questions: usize = quotas.values().sum();
        if total_questions == 0 {
            return Ok(vec![]);
        }

        let mut ordered: Vec<(&String, &usize)> = quotas.iter().collect();
        ordered.sort_by(|a, b| {
            chapter_sort_key(a.0)
                .cmp(&chapter_sort_key(b.0))
                .then_with(|| a.0.cmp(b.0))
        });

        let mut all_questions = Vec::with_capacity(total_questions);
        let mut generated_so_far = 0usize;

        progress(QuizProgress {
            fraction: 0.0,
            phase: "Preparing the question batches...".to_string(),
        });

        for (chapter, &quota) in ordered {
            if quota == 0 {
                continue;
            }
            let docs = match chapter_docs.get(chapter) {
                Some(docs) if !docs.is_empty() => docs,
                _ => continue,
            };

            let past = self
                .history
                .past_questions(book, chapter, self.config.past_question_limit as i64)
                .await?;
            let exclusion = exclusion_block(&past);

            let batch_size = self.config.batch_size.max(1);
            let num_batches = quota.div_ceil(batch_size);
            let mut chapter_generated = 0usize;

            for batch_idx in 0..num_batches {
                let batch_questions = batch_size.min(quota - chapter_generated);

                let sample_size = docs.len().min(25 + batch_questions * 2);
                let batch_docs: Vec<&Chunk> = {
                    let mut rng = rand::thread_rng();
                    docs.choose_multiple(&mut rng, sample_size).collect()
                };
                let context_text = batch_docs
                    .iter()
                    .map(|doc| format!("--- Page: {} ---\n{}", doc.page, doc.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let prompt = build_quiz_prompt(batch_questions, option_count, &exclusion, &context_text);

                let mut cooldown_cycles = 0usize;
                let batch = loop {
                    progress(QuizProgress {
                        fraction: generated_so_far as f32 / total_questions as f32,
                        phase: format!(
                            "{} batch {}/{} (key {} of {})",
                            chapter,
                            batch_idx + 1,
                            num_batches,
                            keys.position(),
                            keys.len()
                        ),
                    });

                    match self
                        .attempt_batch(keys.current(), &prompt, batch_questions, chapter)
                        .await
                    {
                        Some(batch) => break batch,
                        None => {
                            // Every model in the chain failed on this key.
                            let wrapped = keys.advance();
                            if wrapped {
                                cooldown_cycles += 1;
                                if cooldown_cycles >= self.config.max_rotation_cycles {
                                    anyhow::bail!(
                                        "quiz generation failed: every API key stayed rate limited \
                                         through {cooldown_cycles} rotation cycles ({chapter}, batch {})",
                                        batch_idx + 1
                                    );
                                }
                                progress(QuizProgress {
                                    fraction: generated_so_far as f32 / total_questions as f32,
                                    phase: format!(
                                        "Cooldown: waiting {}s...",
                                        self.config.cooldown_secs
                                    ),
                                });
                                tokio::time::sleep(Duration::from_secs(self.config.cooldown_secs))
                                    .await;
                            } else {
                                progress(QuizProgress {
                                    fraction: generated_so_far as f32 / total_questions as f32,
                                    phase: format!("Rotating to key {}...", keys.position()),
                                });
                            }
                        }
                    }
                };

                chapter_generated += batch.len();
                generated_so_far += batch.len();

                self.history
                    .save_past_questions(book, chapter, &batch)
                    .await?;
                all_questions.extend(batch);

                if chapter_generated >= quota {
                    break;
                }
            }
        }

        progress(QuizProgress {
            fraction: 1.0,
            phase: "Quiz ready".to_string(),
        });
        Ok(all_questions)
    }

    /// Runs one batch prompt through the whole model chain for a key.
    /// `None` means every model failed and the key should rotate.
    async fn attempt_batch(
        &self,
        api_key: &str,
        prompt: &str,
        batch_questions: usize,
        chapter: &str,
    ) -> Option<Vec<QuizQuestion>> {
        for backend in self.chains.chain(api_key) {
            match backend.invoke(prompt).await {
                Ok(text) => match parse_question_batch(&text, batch_questions, chapter) {
                    Ok(batch) => return Some(batch),
                    Err(err) => {
                        tracing::warn!(
                            model = backend.name(),
                            error = %err,
                            "model returned an unparseable batch, trying next model"
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        model = backend.name(),
                        error = %err,
                        "quiz batch failed, trying next model"
                    );
                }
            }
        }
        None
    }
}

fn exclusion_block(past_questions: &[String]) -> String {
    if past_questions.is_empty() {
        return String::new();
    }
    let mut block = String::from(
        "CRITICAL INSTRUCTION TO PREVENT DUPLICATES:\nDO NOT generate questions similar to these past questions:\n",
    );
    for question in past_questions {
        block.push_str("- ");
        block.push_str(question);
        block.push('\n');
    }
    block
}

fn build_quiz_prompt(
    batch_questions: usize,
    num_options: usize,
    exclusion: &str,
    context: &str,
) -> String {
    format!(
        r#"You are an expert medical professor creating a rigorous multiple-choice exam for your anatomy class.

Based STRICTLY on the provided Dutch textbook excerpts, generate exactly {batch_questions} multiple-choice questions.
Each question must have exactly {num_options} options.

CRITICAL: The questions, options, correct_answer, correct_explanation, and incorrect_explanations MUST all be translated and written in ENGLISH.
Do NOT write the test in Dutch, even though the source text is Dutch.

{exclusion}

For the correct answer, you must provide a brief paragraph (`correct_explanation`) explaining WHY it is the correct answer. You do not need to limit this explanation to the provided text; you may draw upon your general medical knowledge to provide a clear, comprehensive "why".
For the incorrect answers, you must provide a dictionary (`incorrect_explanations`) where the keys are the incorrect options and the values are brief explanations of WHY they are wrong.

For each question, you MUST provide the page number and a short snippet directly from the provided text that proves the `correct_answer`.
These fields MUST be named `source_page` and `source_snippet`. If you can't find the exact page, write "Unknown Page". The `source_snippet` should be in the original Dutch to match the book.

You MUST output valid JSON only. Do not include markdown blocks like ```json ... ```. Just the raw array exactly in this format:

[
  {{
    "question": "What is the primary function of the heart according to the text?",
    "options": ["To pump blood", "To digest food", "To breathe air"],
    "correct_answer": "To pump blood",
    "correct_explanation": "The heart acts as a central pump that circulates oxygenated blood and nutrients throughout the body and removes metabolic waste.",
    "incorrect_explanations": {{
         "To digest food": "Digestion is primarily the function of the stomach and intestines.",
         "To breathe air": "Gas exchange and breathing are the primary functions of the lungs."
    }},
    "source_page": "Page 5",
    "source_snippet": "The heart is a central pump."
  }}
]

Dutch Textbook Excerpts:
{context}"#
    )
}

/// Parses one model reply into questions: code fences stripped, array
/// truncated to the requested amount, chapter stamped on every entry.
pub fn parse_question_batch(
    raw: &str,
    batch_questions: usize,
    chapter: &str,
) -> Result<Vec<QuizQuestion>> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    let mut questions: Vec<QuizQuestion> =
        serde_json::from_str(text).context("model reply was not a valid question array")?;
    questions.truncate(batch_questions);
    for question in &mut questions {
        question.chapter = chapter.to_string();
    }
    Ok(questions)
}

/// Collects the chunks to quiz from, keyed by chapter. An explicit
/// chapter selection fetches just those; otherwise the whole book is
/// fetched and grouped, unlabeled chunks landing in "Unknown Chapter".
pub async fn collect_chapter_docs(
    store: &ChunkStore,
    source: Option<&str>,
    selected_chapters: &[String],
) -> Result<HashMap<String, Vec<Chunk>>> {
    let mut chapter_docs: HashMap<String, Vec<Chunk>> = HashMap::new();

    if selected_chapters.is_empty() {
        let mut filter = Filter::new();
        if let Some(source) = source {
            filter = filter.eq("source", source);
        }
        for chunk in store.fetch(&filter).await? {
            let chapter = if chunk.chapter.is_empty() {
                "Unknown Chapter".to_string()
            } else {
                chunk.chapter.clone()
            };
            chapter_docs.entry(chapter).or_default().push(chunk);
        }
    } else {
        for chapter in selected_chapters {
            let mut filter = Filter::new().eq("chapter", chapter.clone());
            if let Some(source) = source {
                filter = filter.eq("source", source);
            }
            let docs = store.fetch(&filter).await?;
            if !docs.is_empty() {
                chapter_docs.insert(chapter.clone(), docs);
            }
        }
    }

    Ok(chapter_docs)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::TextStream;

    fn sample_batch_json(count: usize) -> String {
        let questions: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "question": format!("Question {i}?"),
                    "options": ["A", "B", "C"],
                    "correct_answer": "A",
                    "correct_explanation": "Because.",
                    "incorrect_explanations": {"B": "No.", "C": "No."},
                    "source_page": "Page 1",
                    "source_snippet": "Tekst."
                })
            })
            .collect();
        serde_json::to_string(&questions).unwrap()
    }

    fn docs(chapter: &str, count: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| Chunk {
                content: format!("tekst {i}"),
                source: "book.pdf".into(),
                chapter: chapter.into(),
                page: i as i64 + 1,
            })
            .collect()
    }

    struct FixedBackend {
        reply: Result<String, String>,
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ModelBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn invoke(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            // Produce exactly what the prompt asked for.
            let requested = prompt
                .lines()
                .find_map(|line| {
                    line.strip_prefix("Based STRICTLY on the provided Dutch textbook excerpts, generate exactly ")
                        .and_then(|rest| rest.split(' ').next())
                        .and_then(|n| n.parse::<usize>().ok())
                })
                .unwrap_or(1);
            match &self.reply {
                Ok(_) => Ok(sample_batch_json(requested)),
                Err(msg) => anyhow::bail!("{msg}"),
            }
        }

        async fn open_stream(&self, _prompt: &str) -> Result<Box<dyn TextStream>> {
            anyhow::bail!("not used")
        }
    }

    /// Scripted per-key behavior: keys listed in `failing_keys` always
    /// rate limit; everything else succeeds. Prompts are recorded.
    struct ScriptedChains {
        failing_keys: Vec<String>,
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ChainBuilder for ScriptedChains {
        fn chain(&self, api_key: &str) -> Vec<Box<dyn ModelBackend>> {
            let reply = if self.failing_keys.iter().any(|k| k == api_key) {
                Err("gemini generateContent returned 429: RESOURCE_EXHAUSTED".to_string())
            } else {
                Ok(String::new())
            };
            vec![Box::new(FixedBackend {
                reply,
                calls: self.calls.clone(),
                prompts: self.prompts.clone(),
            })]
        }
    }

    fn quiz_config(max_cycles: usize) -> QuizConfig {
        QuizConfig {
            batch_size: 5,
            cooldown_secs: 0,
            max_rotation_cycles: max_cycles,
            past_question_limit: 20,
        }
    }

    #[test]
    fn key_rotation_wraps_and_reports_it() {
        let mut keys = KeyRotation::new(vec!["k1".into(), "k2".into(), "k3".into()]).unwrap();
        assert_eq!(keys.current(), "k1");
        assert!(!keys.advance());
        assert_eq!(keys.current(), "k2");
        assert!(!keys.advance());
        assert!(keys.advance());
        assert_eq!(keys.current(), "k1");
    }

    #[test]
    fn key_rotation_requires_at_least_one_key() {
        assert!(KeyRotation::new(vec![]).is_err());
    }

    #[test]
    fn fenced_batches_are_parsed_and_stamped() {
        let fenced = format!("```json\n{}\n```", sample_batch_json(3));
        let batch = parse_question_batch(&fenced, 2, "Hoofdstuk 4").unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|q| q.chapter == "Hoofdstuk 4"));
    }

    #[test]
    fn unfenced_batches_parse_too() {
        let batch = parse_question_batch(&sample_batch_json(1), 5, "Inleiding").unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].question, "Question 0?");
    }

    #[test]
    fn prose_replies_are_rejected() {
        assert!(parse_question_batch("I cannot answer that.", 5, "Hoofdstuk 1").is_err());
    }

    #[test]
    fn exclusion_block_lists_past_questions() {
        assert_eq!(exclusion_block(&[]), "");
        let block = exclusion_block(&["What is a cell?".to_string()]);
        assert!(block.contains("- What is a cell?"));
        assert!(block.contains("PREVENT DUPLICATES"));
    }

    #[tokio::test]
    async fn generates_quota_across_chapters_in_order() {
        let history = HistoryStore::in_memory().await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = QuizGenerator::new(
            history.clone(),
            Arc::new(ScriptedChains {
                failing_keys: vec![],
                calls: calls.clone(),
                prompts: Arc::default(),
            }),
            quiz_config(3),
        );

        let mut chapter_docs = HashMap::new();
        chapter_docs.insert("Hoofdstuk 2".to_string(), docs("Hoofdstuk 2", 30));
        chapter_docs.insert("Hoofdstuk 1".to_string(), docs("Hoofdstuk 1", 30));
        let mut quotas = HashMap::new();
        quotas.insert("Hoofdstuk 2".to_string(), 7);
        quotas.insert("Hoofdstuk 1".to_string(), 3);

        let mut keys = KeyRotation::new(vec!["k1".into()]).unwrap();
        let phases = Mutex::new(Vec::new());
        let questions = generator
            .generate(
                "book.pdf",
                &chapter_docs,
                &quotas,
                4,
                &mut keys,
                |p| phases.lock().unwrap().push(p),
            )
            .await
            .unwrap();

        assert_eq!(questions.len(), 10);
        // Hoofdstuk 1 first, then Hoofdstuk 2.
        assert!(questions[..3].iter().all(|q| q.chapter == "Hoofdstuk 1"));
        assert!(questions[3..].iter().all(|q| q.chapter == "Hoofdstuk 2"));

        // 3 + (5 + 2) questions over batches of <= 5 means three calls.
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Generated questions were persisted for future dedup.
        let saved = history.past_questions("book.pdf", "Hoofdstuk 2", 20).await.unwrap();
        assert_eq!(saved.len(), 7);

        let phases = phases.lock().unwrap();
        assert!((phases.last().unwrap().fraction - 1.0).abs() < f32::EPSILON);
        let mut last = 0.0f32;
        for p in phases.iter() {
            assert!(p.fraction >= last);
            last = p.fraction;
        }
    }

    #[tokio::test]
    async fn exclusion_list_is_fixed_before_the_first_batch() {
        let history = HistoryStore::in_memory().await.unwrap();
        // A question left over from an earlier quiz on this chapter.
        let earlier = QuizQuestion {
            question: "Which vessel carries oxygenated blood?".to_string(),
            options: vec!["A".into(), "B".into()],
            correct_answer: "A".into(),
            correct_explanation: String::new(),
            incorrect_explanations: Default::default(),
            source_page: String::new(),
            source_snippet: String::new(),
            chapter: "Hoofdstuk 1".into(),
        };
        history
            .save_past_questions("book.pdf", "Hoofdstuk 1", &[earlier])
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let prompts: Arc<Mutex<Vec<String>>> = Arc::default();
        let generator = QuizGenerator::new(
            history.clone(),
            Arc::new(ScriptedChains {
                failing_keys: vec![],
                calls: calls.clone(),
                prompts: prompts.clone(),
            }),
            quiz_config(3),
        );

        let mut chapter_docs = HashMap::new();
        chapter_docs.insert("Hoofdstuk 1".to_string(), docs("Hoofdstuk 1", 30));
        let mut quotas = HashMap::new();
        quotas.insert("Hoofdstuk 1".to_string(), 7);

        let mut keys = KeyRotation::new(vec!["k1".into()]).unwrap();
        let questions = generator
            .generate("book.pdf", &chapter_docs, &quotas, 4, &mut keys, |_| {})
            .await
            .unwrap();
        assert_eq!(questions.len(), 7);

        // Batch one's output landed in history mid-run.
        let saved = history
            .past_questions("book.pdf", "Hoofdstuk 1", 20)
            .await
            .unwrap();
        assert!(saved.iter().any(|q| q == "Question 0?"));

        // Both batch prompts carry the pre-run exclusion list, and the
        // second batch does not pick up what batch one just generated.
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts
            .iter()
            .all(|p| p.contains("- Which vessel carries oxygenated blood?")));
        assert!(!prompts[1].contains("Question 0?"));
    }

    #[tokio::test]
    async fn rate_limited_key_rotates_to_the_next() {
        let history = HistoryStore::in_memory().await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = QuizGenerator::new(
            history,
            Arc::new(ScriptedChains {
                failing_keys: vec!["bad".to_string()],
                calls: calls.clone(),
                prompts: Arc::default(),
            }),
            quiz_config(3),
        );

        let mut chapter_docs = HashMap::new();
        chapter_docs.insert("Hoofdstuk 1".to_string(), docs("Hoofdstuk 1", 10));
        let mut quotas = HashMap::new();
        quotas.insert("Hoofdstuk 1".to_string(), 2);

        let mut keys = KeyRotation::new(vec!["bad".into(), "good".into()]).unwrap();
        let questions = generator
            .generate("book.pdf", &chapter_docs, &quotas, 4, &mut keys, |_| {})
            .await
            .unwrap();

        assert_eq!(questions.len(), 2);
        assert_eq!(keys.current(), "good");
    }

    #[tokio::test]
    async fn exhausted_rotation_cycles_fail_terminally() {
        let history = HistoryStore::in_memory().await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = QuizGenerator::new(
            history,
            Arc::new(ScriptedChains {
                failing_keys: vec!["k1".to_string(), "k2".to_string()],
                calls: calls.clone(),
                prompts: Arc::default(),
            }),
            quiz_config(2),
        );

        let mut chapter_docs = HashMap::new();
        chapter_docs.insert("Hoofdstuk 1".to_string(), docs("Hoofdstuk 1", 10));
        let mut quotas = HashMap::new();
        quotas.insert("Hoofdstuk 1".to_string(), 2);

        let mut keys = KeyRotation::new(vec!["k1".into(), "k2".into()]).unwrap();
        let err = generator
            .generate("book.pdf", &chapter_docs, &quotas, 4, &mut keys, |_| {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rotation cycles"));
        // Two keys tried per cycle, two cycles allowed.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn chapters_without_docs_or_quota_are_skipped() {
        let history = HistoryStore::in_memory().await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = QuizGenerator::new(
            history,
            Arc::new(ScriptedChains {
                failing_keys: vec![],
                calls: calls.clone(),
                prompts: Arc::default(),
            }),
            quiz_config(3),
        );

        let mut chapter_docs = HashMap::new();
        chapter_docs.insert("Hoofdstuk 1".to_string(), docs("Hoofdstuk 1", 10));
        chapter_docs.insert("Hoofdstuk 2".to_string(), vec![]);
        let mut quotas = HashMap::new();
        quotas.insert("Hoofdstuk 1".to_string(), 0);
        quotas.insert("Hoofdstuk 2".to_string(), 3);
        quotas.insert("Hoofdstuk 3".to_string(), 3);

        let mut keys = KeyRotation::new(vec!["k1".into()]).unwrap();
        let questions = generator
            .generate("book.pdf", &chapter_docs, &quotas, 4, &mut keys, |_| {})
            .await
            .unwrap();

        assert!(questions.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
