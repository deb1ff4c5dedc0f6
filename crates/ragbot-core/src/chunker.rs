//! Sliding-window chunking.
//!
//! A window of `max_size` units moves across the text in steps of
//! `max_size - overlap` and stops at the first window that reaches the end of
//! the document, so a document of `L >= 1` units yields
//! `max(1, ceil((L - overlap) / (max_size - overlap)))` chunks.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{keys, Chunk, Document};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    /// Unicode scalar values.
    #[default]
    Chars,
    /// Whitespace-separated words, re-joined with single spaces.
    Words,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_size: usize,
    pub overlap: usize,
    pub unit: ChunkUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self { Self { max_size: 1000, overlap: 200, unit: ChunkUnit::Chars } }
}

impl ChunkingConfig {
    pub fn new(max_size: usize, overlap: usize) -> Self { Self { max_size, overlap, unit: ChunkUnit::Chars } }

    pub fn with_unit(mut self, unit: ChunkUnit) -> Self { self.unit = unit; self }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::config("chunk max_size must be greater than zero"));
        }
        if self.overlap >= self.max_size {
            return Err(Error::config(format!(
                "chunk overlap ({}) must be smaller than max_size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }

    pub fn step(&self) -> usize { self.max_size - self.overlap }

    /// Number of chunks a document of `len` units produces.
    pub fn expected_chunks(&self, len: usize) -> usize {
        if len == 0 { return 0; }
        if len <= self.max_size { return 1; }
        (len - self.overlap).div_ceil(self.step())
    }
}

/// `[start, end)` unit ranges of every window over `len` units.
fn windows(len: usize, max_size: usize, step: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + max_size).min(len);
        out.push((start, end));
        if end >= len { break; }
        start += step;
    }
    out
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Fails with a configuration error before any chunk can be produced.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let pieces = match self.config.unit {
            ChunkUnit::Chars => self.split_chars(&doc.raw_text),
            ChunkUnit::Words => self.split_words(&doc.raw_text),
        };
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, (offset, text))| {
                let mut metadata = doc.metadata.clone();
                metadata.insert(keys::SOURCE.to_string(), doc.path.clone());
                metadata.insert(keys::CHUNK_INDEX.to_string(), index.to_string());
                metadata.insert(keys::TOTAL_CHUNKS.to_string(), total.to_string());
                metadata.insert(keys::OFFSET.to_string(), offset.to_string());
                Chunk {
                    id: Chunk::make_id(&doc.path, index, &text),
                    text,
                    source_document_path: doc.path.clone(),
                    offset,
                    index,
                    total,
                    metadata,
                }
            })
            .collect()
    }

    fn split_chars(&self, text: &str) -> Vec<(usize, String)> {
        // byte position of every char boundary, including the end
        let bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let len = bounds.len() - 1;
        windows(len, self.config.max_size, self.config.step())
            .into_iter()
            .map(|(s, e)| (s, text[bounds[s]..bounds[e]].to_string()))
            .collect()
    }

    fn split_words(&self, text: &str) -> Vec<(usize, String)> {
        let words: Vec<&str> = text.split_whitespace().collect();
        windows(words.len(), self.config.max_size, self.config.step())
            .into_iter()
            .map(|(s, e)| (s, words[s..e].join(" ")))
            .collect()
    }
}
