use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::chunk_store::{ChunkStore, Filter};
use crate::embedder::EmbeddingClient;
use crate::models::{Chunk, ALL_CHAPTERS};

const SEMANTIC_TOP_K: usize = 5;
const MAX_CHAPTER_SPAN: i64 = 50;

/// Outcome of one retrieval: the chunks plus the chapter labels that
/// were inferred from the query text (empty when the selection was
/// explicit or the search was purely semantic).
#[derive(Debug, Default)]
pub struct Retrieval {
    pub chunks: Vec<Chunk>,
    pub inferred_chapters: Vec<String>,
}

#[derive(Clone)]
pub struct Retriever {
    store: ChunkStore,
    embedder: EmbeddingClient,
    embedding_model: String,
}

impl Retriever {
    pub fn new(
        store: ChunkStore,
        embedder: EmbeddingClient,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model: embedding_model.into(),
        }
    }

    /// Resolves a query plus optional explicit chapter selection into
    /// chunks. Store and embedding errors degrade to an empty result;
    /// a chat turn must not die because the index hiccupped.
    pub async fn retrieve(
        &self,
        query: &str,
        selected_chapter: Option<&str>,
        known_chapters: &[String],
        source: Option<&str>,
    ) -> Retrieval {
        match self
            .try_retrieve(query, selected_chapter, known_chapters, source)
            .await
        {
            Ok(retrieval) => retrieval,
            Err(err) => {
                tracing::warn!(error = %err, "retrieval failed, returning empty context");
                Retrieval::default()
            }
        }
    }

    async fn try_retrieve(
        &self,
        query: &str,
        selected_chapter: Option<&str>,
        known_chapters: &[String],
        source: Option<&str>,
    ) -> Result<Retrieval> {
        let mut filter = Filter::new();
        if let Some(source) = source {
            filter = filter.eq("source", source);
        }

        let explicit = selected_chapter.filter(|ch| !ch.is_empty() && *ch != ALL_CHAPTERS);

        let (target_chapters, inferred) = match explicit {
            Some(chapter) => (vec![chapter.to_string()], vec![]),
            None => {
                let inferred = infer_chapters(query, known_chapters);
                (inferred.clone(), inferred)
            }
        };

        if !target_chapters.is_empty() {
            let filter = if target_chapters.len() == 1 {
                filter.eq("chapter", target_chapters[0].clone())
            } else {
                filter.any_of("chapter", target_chapters.clone())
            };
            let mut chunks = self.store.fetch(&filter).await?;
            chunks.sort_by_key(|chunk| chunk.page);
            return Ok(Retrieval {
                chunks,
                inferred_chapters: inferred,
            });
        }

        let embedding = self.embedder.embed(&self.embedding_model, query).await?;
        let chunks = self.store.search(&embedding, &filter, SEMANTIC_TOP_K).await?;
        Ok(Retrieval {
            chunks,
            inferred_chapters: vec![],
        })
    }
}

fn chapter_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:chapter|hoofdstuk)(?:s|ken)?\s+((?:\d+(?:\s*(?:,|and|en|&|-|t/m|to|tot)\s*\d+)*))",
        )
        .expect("chapter reference pattern is valid")
    })
}

fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+)\s*(?:-|t/m|to|tot)\s*(\d+)").expect("chapter range pattern is valid")
    })
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("number pattern is valid"))
}

/// Parses chapter references out of a query ("chapter 3", "hoofdstuk
/// 2-4", "hoofdstukken 4 en 5") and maps each number to a canonical
/// label by probing the known chapter set. Ranges expand inclusively,
/// but only sane ones; a reversed or enormous span falls back to the
/// raw endpoints.
pub fn infer_chapters(query: &str, known_chapters: &[String]) -> Vec<String> {
    let Some(captures) = chapter_ref_regex().captures(query) else {
        return vec![];
    };
    let num_str = &captures[1];

    let mut numbers: Vec<i64> = Vec::new();
    if let Some(range) = range_regex().captures(num_str) {
        let start: i64 = range[1].parse().unwrap_or(0);
        let end: i64 = range[2].parse().unwrap_or(0);
        if start < end && end - start < MAX_CHAPTER_SPAN {
            numbers.extend(start..=end);
        } else {
            for m in number_regex().find_iter(num_str) {
                if let Ok(n) = m.as_str().parse() {
                    numbers.push(n);
                }
            }
        }
    } else {
        for m in number_regex().find_iter(num_str) {
            if let Ok(n) = m.as_str().parse() {
                numbers.push(n);
            }
        }
    }

    let mut chapters = Vec::new();
    for number in numbers {
        if let Some(label) = canonical_chapter(number, known_chapters) {
            if !chapters.contains(&label) {
                chapters.push(label);
            }
        }
    }
    chapters
}

/// Probes label conventions against the known set: Dutch first since
/// that is what the chaptering pipeline emits, English as a fallback.
fn canonical_chapter(number: i64, known_chapters: &[String]) -> Option<String> {
    for candidate in [format!("Hoofdstuk {number}"), format!("Chapter {number}")] {
        if known_chapters.iter().any(|ch| ch == &candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        (1..=12).map(|n| format!("Hoofdstuk {n}")).collect()
    }

    #[test]
    fn single_chapter_reference_is_inferred() {
        assert_eq!(
            infer_chapters("what does chapter 3 say about the heart", &known()),
            vec!["Hoofdstuk 3"]
        );
        assert_eq!(
            infer_chapters("vat hoofdstuk 7 samen", &known()),
            vec!["Hoofdstuk 7"]
        );
    }

    #[test]
    fn enumerations_and_conjunctions_are_inferred() {
        assert_eq!(
            infer_chapters("summarize hoofdstukken 4 en 5", &known()),
            vec!["Hoofdstuk 4", "Hoofdstuk 5"]
        );
        assert_eq!(
            infer_chapters("explain chapters 2, 3 and 6", &known()),
            vec!["Hoofdstuk 2", "Hoofdstuk 3", "Hoofdstuk 6"]
        );
    }

    #[test]
    fn ranges_expand_inclusively() {
        assert_eq!(
            infer_chapters("samenvatting hoofdstuk 2-4", &known()),
            vec!["Hoofdstuk 2", "Hoofdstuk 3", "Hoofdstuk 4"]
        );
        assert_eq!(
            infer_chapters("overview of hoofdstuk 9 t/m 11", &known()),
            vec!["Hoofdstuk 9", "Hoofdstuk 10", "Hoofdstuk 11"]
        );
    }

    #[test]
    fn reversed_ranges_fall_back_to_raw_numbers() {
        assert_eq!(
            infer_chapters("chapter 5-2 please", &known()),
            vec!["Hoofdstuk 5", "Hoofdstuk 2"]
        );
    }

    #[test]
    fn enormous_ranges_fall_back_to_raw_numbers() {
        let mut many: Vec<String> = (1..=200).map(|n| format!("Hoofdstuk {n}")).collect();
        many.push("Inleiding".to_string());
        assert_eq!(
            infer_chapters("chapter 1 to 100", &many),
            vec!["Hoofdstuk 1", "Hoofdstuk 100"]
        );
    }

    #[test]
    fn unknown_chapter_numbers_are_dropped() {
        assert_eq!(
            infer_chapters("what about hoofdstuk 99", &known()),
            Vec::<String>::new()
        );
    }

    #[test]
    fn queries_without_references_infer_nothing() {
        assert_eq!(
            infer_chapters("how does blood circulate", &known()),
            Vec::<String>::new()
        );
        assert_eq!(
            infer_chapters("the book has many chapters overall", &known()),
            Vec::<String>::new()
        );
    }

    #[test]
    fn duplicate_references_are_deduped() {
        assert_eq!(
            infer_chapters("hoofdstuk 3 and 3 again", &known()),
            vec!["Hoofdstuk 3"]
        );
    }
}
