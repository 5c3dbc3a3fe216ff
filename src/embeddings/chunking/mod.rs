#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::documents::Document;
use crate::{AssistError, Result};

/// A retrieval unit cut from a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text
    pub content: String,
    /// Path of the document the chunk came from
    pub source: PathBuf,
    /// Zero-based page of the source document, if paged
    pub page: Option<u32>,
    /// Position of this chunk within its document
    pub chunk_index: u32,
}

/// Sliding window parameters, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of the same document
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 120,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AssistError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AssistError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// Split documents into overlapping chunks, keeping source metadata
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        let windows = split_text(&document.content, config);
        for (index, content) in windows.into_iter().enumerate() {
            let chunk_index = u32::try_from(index)
                .map_err(|_| AssistError::Document("too many chunks in one document".into()))?;
            chunks.push(Chunk {
                content,
                source: document.source.clone(),
                page: document.page,
                chunk_index,
            });
        }
    }

    debug!(
        "Split {} document(s) into {} chunk(s) (size {}, overlap {})",
        documents.len(),
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    Ok(chunks)
}

/// Cut text into windows of at most `chunk_size` characters
///
/// Window `i` starts at character `i * (chunk_size - chunk_overlap)`.
/// Splitting stops at the first window that reaches the end of the text.
/// Blank text yields no windows. The config must already be valid.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let step = config.step();

    let mut windows = Vec::with_capacity(expected_chunk_count(len, config));
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(len);
        windows.push(chars[start..end].iter().collect());
        if end == len {
            break;
        }
        start += step;
    }

    windows
}

/// Number of windows `split_text` produces for a text of `len` characters
#[inline]
pub fn expected_chunk_count(len: usize, config: &ChunkingConfig) -> usize {
    if len == 0 {
        0
    } else if len <= config.chunk_size {
        1
    } else {
        (len - config.chunk_overlap).div_ceil(config.step())
    }
}
