// Vector index
// Exact nearest-neighbour search over embedded chunks, persisted with LanceDB

#[cfg(test)]
mod tests;

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::embeddings::{Chunk, ChunkingConfig, Embedder};
use crate::{AssistError, Result};

/// How distances between vectors are measured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// One minus cosine similarity
    Cosine,
}

impl DistanceMetric {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "l2" => Some(Self::L2),
            "cosine" => Some(Self::Cosine),
            _ => None,
        }
    }

    /// Distance between two vectors of equal length; smaller is closer
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Self::Cosine => {
                let mut dot = 0.0_f32;
                let mut norm_a = 0.0_f32;
                let mut norm_b = 0.0_f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                let denom = norm_a.sqrt() * norm_b.sqrt();
                if denom == 0.0 {
                    1.0
                } else {
                    1.0 - dot / denom
                }
            }
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One embedded chunk
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

/// A search result, closest first
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Immutable set of embedded chunks with the parameters they were built with
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    metric: DistanceMetric,
    chunking: Option<ChunkingConfig>,
    built_at: DateTime<Utc>,
}

impl VectorIndex {
    #[inline]
    pub fn empty(metric: DistanceMetric) -> Self {
        Self {
            entries: Vec::new(),
            dimension: 0,
            metric,
            chunking: None,
            built_at: Utc::now(),
        }
    }

    /// Embed every chunk in one batch and index them in order
    #[inline]
    pub fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if chunks.is_empty() {
            debug!("Building empty index");
            return Ok(Self::empty(metric));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        info!("Embedding {} chunks", texts.len());
        let vectors = embedder.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(AssistError::Provider(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let entries = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, chunk)| IndexEntry { vector, chunk })
            .collect();

        let index = Self::from_entries(entries, metric)?;
        info!(
            "Built index with {} entries of dimension {}",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    /// Assemble an index from already embedded entries
    #[inline]
    pub fn from_entries(entries: Vec<IndexEntry>, metric: DistanceMetric) -> Result<Self> {
        let dimension = entries.first().map_or(0, |e| e.vector.len());

        if let Some(position) = entries.iter().position(|e| e.vector.len() != dimension) {
            return Err(AssistError::Index(format!(
                "Entry {} has dimension {}, expected {}",
                position,
                entries[position].vector.len(),
                dimension
            )));
        }
        if !entries.is_empty() && dimension == 0 {
            return Err(AssistError::Index(
                "Embeddings must have at least one dimension".to_string(),
            ));
        }

        Ok(Self {
            entries,
            dimension,
            metric,
            chunking: None,
            built_at: Utc::now(),
        })
    }

    /// Record the chunking parameters the entries were cut with
    #[inline]
    #[must_use]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = Some(chunking);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    /// Return the `k` entries closest to `query`
    ///
    /// Equal distances keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AssistError::Index(format!(
                "Query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, self.metric.distance(query, &entry.vector)))
            .collect();

        // Stable sort keeps ties in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, distance)| SearchHit {
                chunk: self.entries[i].chunk.clone(),
                distance,
            })
            .collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[inline]
    pub fn chunking(&self) -> Option<&ChunkingConfig> {
        self.chunking.as_ref()
    }

    #[inline]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Persist to `dir`, replacing any index already there
    #[inline]
    pub async fn save(&self, dir: &Path) -> Result<()> {
        store::IndexStore::open(dir).await?.save(self).await
    }

    /// Load the index persisted in `dir`
    #[inline]
    pub async fn load(dir: &Path) -> Result<Self> {
        store::IndexStore::open_existing(dir).await?.load().await
    }
}

/// Shared, swappable reference to the current index
///
/// Readers take an `Arc` snapshot and keep using it even if a rebuild
/// installs a new index meanwhile.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<VectorIndex>>,
    generation: AtomicU64,
}

impl IndexHandle {
    #[inline]
    pub fn new(index: VectorIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
            generation: AtomicU64::new(1),
        }
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Install a fully built index and return the new generation
    #[inline]
    pub fn swap(&self, index: VectorIndex) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(index);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Installed index generation {}", generation);
        generation
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
