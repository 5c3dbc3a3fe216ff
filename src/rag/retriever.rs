use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::embeddings::Embedder;
use crate::index::{IndexHandle, SearchHit};

/// Embeds a query and searches the current index snapshot
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexHandle>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<IndexHandle>) -> Self {
        Self { embedder, index }
    }

    #[inline]
    pub fn index(&self) -> &Arc<IndexHandle> {
        &self.index
    }

    /// The `k` chunks closest to `query`, closest first
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let snapshot = self.index.snapshot();
        if k == 0 || snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query)?;
        let hits = snapshot.search(&vector, k)?;
        debug!(
            "Retrieved {} chunk(s) from index generation {}",
            hits.len(),
            self.index.generation()
        );
        Ok(hits)
    }
}
