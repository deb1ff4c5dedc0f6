//! Domain types shared by the loader, chunker, stores and the answerer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
/// String metadata attached to documents, chunks and stored vectors.
///
/// Ordered so that serialized payloads and printed metadata are stable.
pub type Meta = BTreeMap<String, String>;
pub type EmbeddingVector = Vec<f32>;

/// Metadata keys written by the chunker and read back by the retriever.
pub mod keys {
    pub const SOURCE: &str = "source";
    pub const CHUNK_INDEX: &str = "chunk_index";
    pub const TOTAL_CHUNKS: &str = "total_chunks";
    pub const OFFSET: &str = "offset";
    pub const FILE_TYPE: &str = "file_type";
    pub const FILE_NAME: &str = "file_name";
    pub const SIZE_BYTES: &str = "size_bytes";
    pub const TOTAL_PAGES: &str = "total_pages";
    pub const TOTAL_PARAGRAPHS: &str = "total_paragraphs";
    pub const CONTENT: &str = "content";
}

/// A source file read by the loader. Discarded once chunked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub raw_text: String,
    pub metadata: Meta,
}

/// A window of a document's text that is embedded and stored independently.
///
/// - `id`: `"{source}_{index}_{hash8}"`, stable for identical text at the same position
/// - `offset`: start of the window, in the configured chunking unit
/// - `index`/`total`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_document_path: String,
    pub offset: usize,
    pub index: usize,
    pub total: usize,
    pub metadata: Meta,
}

impl Chunk {
    pub fn make_id(source: &str, index: usize, text: &str) -> ChunkId {
        let hash = blake3::hash(text.as_bytes()).to_hex();
        format!("{}_{}_{}", source, index, &hash.as_str()[..8])
    }
}

/// The tuple written to a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: ChunkId,
    pub vector: EmbeddingVector,
    pub text: String,
    pub metadata: Meta,
}

impl VectorRecord {
    pub fn from_chunk(chunk: &Chunk, vector: EmbeddingVector) -> Self {
        Self { id: chunk.id.clone(), vector, text: chunk.text.clone(), metadata: chunk.metadata.clone() }
    }
}

/// Raw nearest-neighbour answer of a store. Higher `score` is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMatch {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
    pub metadata: Meta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedResult {
    pub chunk: Chunk,
    pub similarity_score: f32,
}

impl RetrievedResult {
    /// Rebuild the chunk a match was stored from, using the metadata the
    /// chunker wrote. Missing positional keys fall back to zero.
    pub fn from_match(m: StoredMatch) -> Self {
        let parse = |key: &str| m.metadata.get(key).and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);
        let offset = parse(keys::OFFSET);
        let index = parse(keys::CHUNK_INDEX);
        let total = parse(keys::TOTAL_CHUNKS);
        let source = m.metadata.get(keys::SOURCE).cloned().unwrap_or_else(|| "unknown".to_string());
        let mut metadata = m.metadata;
        metadata.remove(keys::CONTENT);
        Self {
            chunk: Chunk { id: m.id, text: m.text, source_document_path: source, offset, index, total, metadata },
            similarity_score: m.score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_vectors: usize,
    pub dimension: Option<usize>,
    pub namespaces: BTreeMap<String, usize>,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: "system".to_string(), content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: "user".to_string(), content: content.into() } }
}
