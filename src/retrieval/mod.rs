// Retrieval and citation assembly

#[cfg(test)]
mod tests;

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::config::RetrievalConfig;
use crate::database::vector::{Payload, PayloadFilter, ScoredPoint, VectorIndex};
use crate::embeddings::{Embedder, validate_embeddings};

const ELLIPSIS: char = '…';

/// A chunk returned by similarity search, in index rank order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub kb_id: String,
    pub score: f32,
    pub text: String,
    pub payload: Payload,
}

impl RetrievedChunk {
    fn from_point(kb_id: &str, point: ScoredPoint) -> Self {
        let field = |key: &str| {
            point
                .payload
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            chunk_id: field("chunk_id").unwrap_or_else(|| point.id.clone()),
            doc_id: field("doc_id").unwrap_or_default(),
            kb_id: field("kb_id").unwrap_or_else(|| kb_id.to_string()),
            text: field("text").unwrap_or_default(),
            score: point.score,
            payload: point.payload,
        }
    }

    /// Human-readable label for citing this chunk
    #[inline]
    pub fn source_label(&self) -> &str {
        ["source_name", "filename"]
            .iter()
            .find_map(|key| self.payload.get(*key).and_then(Value::as_str))
            .unwrap_or(&self.chunk_id)
    }
}

/// Display form of a retrieved chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub chunk_id: String,
    pub doc_id: String,
    pub score: f32,
    pub snippet: String,
    pub metadata: Payload,
}

/// Embeds questions and searches one knowledge base's collection
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config: config.clone(),
        }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ranked chunks for `question`; `top_k` falls back to the configured default
    #[inline]
    pub async fn retrieve(
        &self,
        kb_id: &str,
        question: &str,
        top_k: Option<usize>,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let top_k = top_k.unwrap_or(self.config.top_k);
        let vectors = self.embedder.embed(&[question.to_string()]).await?;
        validate_embeddings(1, &vectors)?;
        let Some(query) = vectors.first() else {
            return Ok(Vec::new());
        };

        let hits = self.index.search(kb_id, query, top_k, filter).await?;
        debug!(
            "Retrieved {} of top {} chunks from knowledge base {}",
            hits.len(),
            top_k,
            kb_id
        );

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk::from_point(kb_id, hit))
            .collect())
    }

    /// `retrieve` followed by the configured context budget
    #[inline]
    pub async fn retrieve_within_budget(
        &self,
        kb_id: &str,
        question: &str,
        top_k: Option<usize>,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<RetrievedChunk>> {
        let chunks = self.retrieve(kb_id, question, top_k, filter).await?;
        Ok(match self.config.max_context_chars {
            Some(budget) => apply_context_budget(chunks, budget),
            None => chunks,
        })
    }

    #[inline]
    pub fn to_citations(&self, chunks: &[RetrievedChunk]) -> Vec<Citation> {
        build_citations(chunks, self.config.snippet_chars)
    }
}

/// Keep results in rank order until the next one would push the total
/// character count past `max_chars`. Nothing is partially truncated.
#[inline]
pub fn apply_context_budget(chunks: Vec<RetrievedChunk>, max_chars: usize) -> Vec<RetrievedChunk> {
    let mut used = 0_usize;
    let mut kept = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let length = chunk.text.chars().count();
        if used + length > max_chars {
            debug!(
                "Context budget of {} chars reached after {} chunks",
                max_chars,
                kept.len()
            );
            break;
        }
        used += length;
        kept.push(chunk);
    }

    kept
}

/// Prefix of `text` up to `cap` characters, with an ellipsis when cut
#[inline]
pub fn make_snippet(text: &str, cap: usize) -> String {
    let mut chars = text.chars();
    let mut snippet: String = chars.by_ref().take(cap).collect();
    if chars.next().is_some() {
        snippet.push(ELLIPSIS);
    }
    snippet
}

#[inline]
pub fn build_citations(chunks: &[RetrievedChunk], snippet_chars: usize) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            chunk_id: chunk.chunk_id.clone(),
            doc_id: chunk.doc_id.clone(),
            score: chunk.score,
            snippet: make_snippet(&chunk.text, snippet_chars),
            metadata: chunk.payload.clone(),
        })
        .collect()
}
