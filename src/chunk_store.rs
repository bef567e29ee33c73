use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::models::Chunk;

const SCROLL_PAGE_SIZE: usize = 256;

/// Conjunction of independent payload-field conditions.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
enum Condition {
    Eq { field: String, value: String },
    AnyOf { field: String, values: Vec<String> },
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn any_of(mut self, field: &str, values: Vec<String>) -> Self {
        self.conditions.push(Condition::AnyOf {
            field: field.to_string(),
            values,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn to_qdrant(&self) -> Value {
        let must: Vec<Value> = self
            .conditions
            .iter()
            .map(|cond| match cond {
                Condition::Eq { field, value } => json!({
                    "key": field,
                    "match": { "value": value }
                }),
                Condition::AnyOf { field, values } => json!({
                    "key": field,
                    "match": { "any": values }
                }),
            })
            .collect();
        json!({ "must": must })
    }
}

#[derive(Clone)]
pub struct ChunkStore {
    client: Client,
    base_url: String,
    collection: String,
    known_vector_size: Arc<RwLock<Option<usize>>>,
}

impl ChunkStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            collection: collection.into(),
            known_vector_size: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn recreate_collection(&self, vector_size: usize) -> Result<()> {
        let delete_url = format!("{}/collections/{}", self.base_url, self.collection);
        let _ = self.client.delete(&delete_url).send().await;

        self.ensure_collection(vector_size).await?;
        Ok(())
    }

    pub async fn ensure_collection(&self, vector_size: usize) -> Result<()> {
        {
            let known = self.known_vector_size.read().await;
            if let Some(existing) = *known {
                if existing == vector_size {
                    return Ok(());
                }
            }
        }

        let create_url = format!("{}/collections/{}", self.base_url, self.collection);
        let payload = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        self.client
            .put(create_url)
            .json(&payload)
            .send()
            .await
            .context("failed to contact qdrant while creating collection")?
            .error_for_status()
            .context("qdrant failed to create collection")?;

        *self.known_vector_size.write().await = Some(vector_size);
        Ok(())
    }

    pub async fn upsert_points(&self, points: &[ChunkPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let vector_size = points[0].vector.len();
        self.ensure_collection(vector_size).await?;

        let upsert_url = format!(
            "{}/collections/{}/points?wait=true",
            self.base_url, self.collection
        );
        let body = json!({ "points": points });

        self.client
            .put(upsert_url)
            .json(&body)
            .send()
            .await
            .context("failed to contact qdrant during upsert")?
            .error_for_status()
            .context("qdrant upsert returned non-success status")?;

        Ok(())
    }

    /// Fetches every chunk matching `filter` by scrolling the whole
    /// collection. No ranking; callers order the result themselves.
    pub async fn fetch(&self, filter: &Filter) -> Result<Vec<Chunk>> {
        let url = format!(
            "{}/collections/{}/points/scroll",
            self.base_url, self.collection
        );

        let mut chunks = Vec::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE_SIZE,
                "with_payload": true,
            });
            if !filter.is_empty() {
                body["filter"] = filter.to_qdrant();
            }
            if let Some(next) = &offset {
                body["offset"] = next.clone();
            }

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .context("failed to contact qdrant during scroll")?;

            // A missing collection just means nothing has been loaded yet.
            if response.status() == StatusCode::NOT_FOUND {
                return Ok(vec![]);
            }

            let page = response
                .error_for_status()
                .context("qdrant scroll returned non-success status")?
                .json::<ScrollResponse>()
                .await
                .context("failed to decode qdrant scroll response")?;

            for point in page.result.points {
                if let Some(payload) = point.payload {
                    chunks.push(payload.into_chunk());
                }
            }

            match page.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        Ok(chunks)
    }

    pub async fn search(&self, vector: &[f32], filter: &Filter, limit: usize) -> Result<Vec<Chunk>> {
        if vector.is_empty() {
            return Ok(vec![]);
        }

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if !filter.is_empty() {
            body["filter"] = filter.to_qdrant();
        }

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("failed to contact qdrant during search")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }

        let decoded = response
            .error_for_status()
            .context("qdrant search returned non-success status")?
            .json::<SearchResponse>()
            .await
            .context("failed to decode qdrant search response")?;

        Ok(decoded
            .result
            .into_iter()
            .filter_map(|point| point.payload.map(ChunkPayload::into_chunk))
            .collect())
    }

    pub async fn delete_by_source(&self, source: &str) -> Result<()> {
        let url = format!(
            "{}/collections/{}/points/delete?wait=true",
            self.base_url, self.collection
        );
        let body = json!({
            "filter": Filter::new().eq("source", source).to_qdrant()
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("failed to contact qdrant during delete")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        response
            .error_for_status()
            .context("qdrant delete returned non-success status")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub chapter: String,
    #[serde(default)]
    pub page: i64,
}

impl ChunkPayload {
    fn into_chunk(self) -> Chunk {
        Chunk {
            content: self.content,
            source: self.source,
            chapter: self.chapter,
            page: self.page,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrollPoint {
    payload: Option<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchPoint>,
}

#[derive(Debug, Deserialize)]
struct SearchPoint {
    payload: Option<ChunkPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serializes_equality_and_membership() {
        let filter = Filter::new()
            .eq("source", "book.pdf")
            .any_of("chapter", vec!["Hoofdstuk 1".into(), "Hoofdstuk 2".into()]);
        let value = filter.to_qdrant();

        let must = value["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["key"], "source");
        assert_eq!(must[0]["match"]["value"], "book.pdf");
        assert_eq!(must[1]["key"], "chapter");
        assert_eq!(must[1]["match"]["any"][1], "Hoofdstuk 2");
    }

    #[test]
    fn empty_filter_reports_empty() {
        assert!(Filter::new().is_empty());
        assert!(!Filter::new().eq("source", "x").is_empty());
    }
}
