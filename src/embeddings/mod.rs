// Embeddings module
// Text chunking and the embedder seam used for both indexing and queries

pub mod chunking;
pub mod hashing;

pub use chunking::{Chunk, ChunkingConfig, expected_chunk_count, split_documents, split_text};
pub use hashing::{DEFAULT_HASHING_DIMENSION, HashingEmbedder};

use std::sync::Arc;

use crate::config::{Config, EmbeddingProvider};
use crate::providers::OllamaClient;

/// Maps text to a fixed-length vector
///
/// The same embedder must be used to build an index and to query it.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> crate::Result<Vec<f32>>;

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Build the embedder selected by the `[embedding]` section
#[inline]
pub fn embedder_from_config(config: &Config) -> crate::Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.embedding.provider {
        EmbeddingProvider::Ollama => Arc::new(OllamaClient::new(config)?),
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.embedding.dimension)),
    };
    Ok(embedder)
}
