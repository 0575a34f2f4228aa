// Embeddings module
// Chunking plus the providers that turn chunk text into vectors


pub mod chunking;
pub mod hashing;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Config, EmbeddingProvider};
use crate::{LoreError, Result};

pub use chunking::{ChunkingConfig, TextChunk, chunk_text};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

/// Text to dense vector boundary.
///
/// Implementations must return one vector per input, in input order, all of
/// the same length, and must be deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifies the model generation, recorded for diagnostics
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Check a provider response and return its shared dimensionality
#[inline]
pub fn validate_embeddings(expected: usize, vectors: &[Vec<f32>]) -> Result<usize> {
    if vectors.len() != expected {
        return Err(LoreError::Embedding(format!(
            "Expected {} embeddings but received {}",
            expected,
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let dimension = first.len();
    if dimension == 0 {
        return Err(LoreError::Embedding(
            "Provider returned an empty vector".to_string(),
        ));
    }

    if let Some(position) = vectors.iter().position(|v| v.len() != dimension) {
        return Err(LoreError::Embedding(format!(
            "Embedding {} has {} dimensions, expected {}",
            position,
            vectors.get(position).map_or(0, Vec::len),
            dimension
        )));
    }

    Ok(dimension)
}

/// Build the embedder selected in the configuration
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.provider {
        EmbeddingProvider::Ollama => {
            debug!("Using Ollama embedder with model {}", config.ollama.model);
            Ok(Arc::new(OllamaClient::new(&config.ollama)?))
        }
        EmbeddingProvider::Hashing => {
            debug!(
                "Using hashing embedder with {} dimensions",
                config.embedding.hashing_dimension
            );
            Ok(Arc::new(HashingEmbedder::new(
                config.embedding.hashing_dimension,
            )?))
        }
    }
}
