use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;

use crate::chunk_store::{ChunkStore, Filter};

/// Derives the chapter list for a book from stored chunk metadata.
#[derive(Clone)]
pub struct ChapterCatalog {
    store: ChunkStore,
}

impl ChapterCatalog {
    pub fn new(store: ChunkStore) -> Self {
        Self { store }
    }

    /// Distinct chapter labels for `source`, in display order. Store
    /// errors degrade to an empty list so the UI still renders.
    pub async fn chapters(&self, source: &str) -> Vec<String> {
        match self.try_chapters(source).await {
            Ok(chapters) => chapters,
            Err(err) => {
                tracing::warn!(error = %err, "chapter listing failed");
                vec![]
            }
        }
    }

    async fn try_chapters(&self, source: &str) -> Result<Vec<String>> {
        let filter = Filter::new().eq("source", source);
        let chunks = self.store.fetch(&filter).await?;

        let mut labels: Vec<String> = chunks
            .into_iter()
            .map(|c| c.chapter)
            .filter(|c| !c.is_empty())
            .collect();
        labels.sort();
        labels.dedup();
        sort_chapters(&mut labels);
        Ok(labels)
    }
}

/// Orders chapter labels for display: preface/intro material first,
/// numbered chapters by their embedded number, everything else last.
pub fn sort_chapters(labels: &mut [String]) {
    labels.sort_by_key(|label| (chapter_sort_key(label), label.to_lowercase()));
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("number pattern is valid"))
}

pub fn chapter_sort_key(label: &str) -> i64 {
    let lower = label.trim().to_lowercase();
    if lower.is_empty() {
        return 999;
    }
    if lower == "preface / intro" {
        return -2;
    }
    if lower == "inleiding" {
        return -1;
    }
    number_regex()
        .find(&lower)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .unwrap_or(999)
}
