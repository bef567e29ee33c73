use std::time::Duration;

use anyhow::Result;

use crate::model::{is_fallback_trigger, ModelBackend};
use crate::models::Chunk;

/// Chunks longer than this are re-emitted word by word so the UI types
/// instead of jumping.
const SMOOTH_SPLIT_THRESHOLD: usize = 50;
const SMOOTH_DELAY_MS: u64 = 15;

/// Receives answer text incrementally as it streams in.
pub trait StreamSink: Send {
    fn push(&mut self, text: &str);

    /// Discards everything pushed so far. Called when a backend dies
    /// mid-answer and its partial output must not survive the fallback.
    fn reset(&mut self) {}
}

/// Sink that just accumulates the full answer.
#[derive(Default)]
pub struct BufferSink {
    pub text: String,
}

impl StreamSink for BufferSink {
    fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn reset(&mut self) {
        self.text.clear();
    }
}

/// Streams an answer through an ordered backend chain. Rate limits,
/// quota exhaustion, and timeouts advance to the next backend and any
/// partial output is discarded; other errors propagate immediately.
/// The winning response gets a page-citation footer from `docs`.
pub async fn stream_with_fallback(
    chain: &[Box<dyn ModelBackend>],
    prompt: &str,
    docs: &[Chunk],
    sink: &mut dyn StreamSink,
) -> Result<String> {
    let mut last_err = anyhow::anyhow!("no model backends configured");

    'chain: for backend in chain {
        let mut stream = match backend.open_stream(prompt).await {
            Ok(stream) => stream,
            Err(err) => {
                if is_fallback_trigger(&err) {
                    tracing::warn!(model = backend.name(), error = %err, "backend unavailable, falling back");
                    last_err = err;
                    continue 'chain;
                }
                return Err(err);
            }
        };

        // Pull the first chunk eagerly so quota errors surface before
        // we commit to this backend.
        let first = match stream.next_chunk().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => {
                if is_fallback_trigger(&err) {
                    tracing::warn!(model = backend.name(), error = %err, "first chunk failed, falling back");
                    last_err = err;
                    continue 'chain;
                }
                return Err(err);
            }
            None => {
                last_err = anyhow::anyhow!("empty response from model {}", backend.name());
                continue 'chain;
            }
        };

        let mut response = String::new();
        emit_smoothed(&first, &mut response, sink).await;

        loop {
            match stream.next_chunk().await {
                Some(Ok(chunk)) => {
                    emit_smoothed(&chunk, &mut response, sink).await;
                }
                Some(Err(err)) => {
                    if is_fallback_trigger(&err) {
                        tracing::warn!(model = backend.name(), error = %err, "stream broke mid-answer, falling back");
                        sink.reset();
                        last_err = err;
                        continue 'chain;
                    }
                    return Err(err);
                }
                None => {
                    let footer = citation_footer(docs);
                    if !footer.is_empty() {
                        response.push_str(&footer);
                        sink.push(&footer);
                    }
                    return Ok(response);
                }
            }
        }
    }

    Err(last_err)
}

async fn emit_smoothed(chunk: &str, response: &mut String, sink: &mut dyn StreamSink) {
    if chunk.len() > SMOOTH_SPLIT_THRESHOLD {
        for word in chunk.split(' ') {
            let piece = format!("{word} ");
            response.push_str(&piece);
            sink.push(&piece);
            tokio::time::sleep(Duration::from_millis(SMOOTH_DELAY_MS)).await;
        }
    } else {
        response.push_str(chunk);
        sink.push(chunk);
    }
}

/// Distinct page labels of the retrieved chunks, sorted by page number.
pub fn page_citations(docs: &[Chunk]) -> Vec<String> {
    let mut pages: Vec<i64> = docs.iter().map(|doc| doc.page).collect();
    pages.sort_unstable();
    pages.dedup();
    pages.into_iter().map(|p| format!("Page {p}")).collect()
}

fn citation_footer(docs: &[Chunk]) -> String {
    let citations = page_citations(docs);
    if citations.is_empty() {
        return String::new();
    }
    format!("\n\n**(Sources: {})**", citations.join(", "))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::model::TextStream;

    enum Step {
        Chunk(&'static str),
        Fail(&'static str),
    }

    struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl TextStream for ScriptedStream {
        async fn next_chunk(&mut self) -> Option<Result<String>> {
            match self.steps.pop_front()? {
                Step::Chunk(text) => Some(Ok(text.to_string())),
                Step::Fail(msg) => Some(Err(anyhow::anyhow!("{msg}"))),
            }
        }
    }

    struct ScriptedBackend {
        name: &'static str,
        script: std::sync::Mutex<Option<Vec<Step>>>,
        open_error: Option<&'static str>,
        opens: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(name: &'static str, steps: Vec<Step>) -> Self {
            Self {
                name,
                script: std::sync::Mutex::new(Some(steps)),
                open_error: None,
                opens: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_open(name: &'static str, error: &'static str) -> Self {
            Self {
                name,
                script: std::sync::Mutex::new(None),
                open_error: Some(error),
                opens: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn invoke(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("not used in these tests")
        }

        async fn open_stream(&self, _prompt: &str) -> Result<Box<dyn TextStream>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(error) = self.open_error {
                anyhow::bail!("{error}");
            }
            let steps = self
                .script
                .lock()
                .unwrap()
                .take()
                .expect("stream opened twice");
            Ok(Box::new(ScriptedStream {
                steps: steps.into(),
            }))
        }
    }

    fn doc(page: i64) -> Chunk {
        Chunk {
            content: "tekst".into(),
            source: "book.pdf".into(),
            chapter: "Hoofdstuk 1".into(),
            page,
        }
    }

    #[tokio::test]
    async fn first_backend_success_streams_and_cites() {
        let chain: Vec<Box<dyn ModelBackend>> = vec![Box::new(ScriptedBackend::new(
            "a",
            vec![Step::Chunk("The heart "), Step::Chunk("pumps blood.")],
        ))];
        let docs = vec![doc(7), doc(3), doc(7)];

        let mut sink = BufferSink::default();
        let answer = stream_with_fallback(&chain, "q", &docs, &mut sink)
            .await
            .unwrap();

        assert!(answer.starts_with("The heart pumps blood."));
        assert!(answer.ends_with("**(Sources: Page 3, Page 7)**"));
        assert_eq!(sink.text, answer);
    }

    #[tokio::test]
    async fn rate_limit_mid_stream_discards_partial_and_falls_back() {
        let chain: Vec<Box<dyn ModelBackend>> = vec![
            Box::new(ScriptedBackend::new(
                "a",
                vec![Step::Chunk("partial "), Step::Fail("status 429")],
            )),
            Box::new(ScriptedBackend::new("b", vec![Step::Chunk("clean answer")])),
        ];

        let mut sink = BufferSink::default();
        let answer = stream_with_fallback(&chain, "q", &[], &mut sink)
            .await
            .unwrap();

        assert_eq!(answer, "clean answer");
        // The partial from the dead backend was retracted from the sink.
        assert_eq!(sink.text, "clean answer");
    }

    #[tokio::test]
    async fn fully_rate_limited_chain_surfaces_a_quota_error() {
        let chain: Vec<Box<dyn ModelBackend>> = vec![
            Box::new(ScriptedBackend::failing_open("a", "status 429")),
            Box::new(ScriptedBackend::failing_open("b", "RESOURCE_EXHAUSTED")),
        ];

        let mut sink = BufferSink::default();
        let err = stream_with_fallback(&chain, "q", &[], &mut sink)
            .await
            .unwrap_err();

        // Classifiable as a quota problem so the chat layer can show
        // the wait-and-retry message instead of a generic failure.
        assert!(crate::model::is_rate_limit_error(&err));
        assert!(sink.text.is_empty());
    }

    #[tokio::test]
    async fn open_failure_with_quota_error_tries_next_backend() {
        let first = ScriptedBackend::failing_open("a", "RESOURCE_EXHAUSTED: quota");
        let opens = first.opens.clone();
        let chain: Vec<Box<dyn ModelBackend>> = vec![
            Box::new(first),
            Box::new(ScriptedBackend::new("b", vec![Step::Chunk("ok")])),
        ];

        let mut sink = BufferSink::default();
        let answer = stream_with_fallback(&chain, "q", &[], &mut sink)
            .await
            .unwrap();

        assert_eq!(answer, "ok");
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_trigger_error_propagates_immediately() {
        let chain: Vec<Box<dyn ModelBackend>> = vec![
            Box::new(ScriptedBackend::new("a", vec![Step::Fail("invalid request")])),
            Box::new(ScriptedBackend::new("b", vec![Step::Chunk("never reached")])),
        ];

        let mut sink = BufferSink::default();
        let result = stream_with_fallback(&chain, "q", &[], &mut sink).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid request"));
    }

    #[tokio::test]
    async fn empty_streams_exhaust_to_last_error() {
        let chain: Vec<Box<dyn ModelBackend>> = vec![
            Box::new(ScriptedBackend::new("a", vec![])),
            Box::new(ScriptedBackend::new("b", vec![])),
        ];

        let mut sink = BufferSink::default();
        let err = stream_with_fallback(&chain, "q", &[], &mut sink)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn long_chunks_are_split_into_words() {
        let long = "one two three four five six seven eight nine ten eleven twelve";
        assert!(long.len() > 50);
        let chain: Vec<Box<dyn ModelBackend>> =
            vec![Box::new(ScriptedBackend::new("a", vec![Step::Chunk(long)]))];

        struct CountingSink {
            pushes: usize,
            text: String,
        }
        impl StreamSink for CountingSink {
            fn push(&mut self, text: &str) {
                self.pushes += 1;
                self.text.push_str(text);
            }
        }

        let mut sink = CountingSink {
            pushes: 0,
            text: String::new(),
        };
        let answer = stream_with_fallback(&chain, "q", &[], &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.pushes, 12);
        assert_eq!(answer.trim_end(), long);
    }

    #[test]
    fn citations_sort_numerically_and_dedupe() {
        let docs = vec![doc(10), doc(2), doc(2), doc(1)];
        assert_eq!(page_citations(&docs), vec!["Page 1", "Page 2", "Page 10"]);
    }
}
