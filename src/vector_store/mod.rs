//! Vector index integration: record preparation, the store trait, and its backends.

pub mod memory;
pub mod payload;
pub mod qdrant;
pub mod types;

use crate::config::{Config, VectorStoreKind};
use async_trait::async_trait;

pub use memory::{InMemoryStore, cosine_similarity};
pub use payload::{DEFAULT_METADATA_MAX_BYTES, chunk_id, compute_chunk_hash, truncate_to_bytes};
pub use qdrant::QdrantStore;
pub use types::{ChunkRecord, ScoredChunk, VectorStoreError};

/// Storage backend holding chunk embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Make sure the index exists with the given vector dimension. Called once at start.
    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError>;

    /// Write records, replacing any stored under the same ordinal. Returns the count written.
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize, VectorStoreError>;

    /// Return up to `top_k` stored chunks, most similar first.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;
}

/// Pair chunks with their embeddings, assign ordinal ids, and truncate text to `max_bytes`.
pub fn prepare_records(
    chunks: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    max_bytes: usize,
) -> Result<Vec<ChunkRecord>, VectorStoreError> {
    if chunks.len() != embeddings.len() {
        return Err(VectorStoreError::CountMismatch {
            chunks: chunks.len(),
            vectors: embeddings.len(),
        });
    }

    Ok(chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(ordinal, (text, vector))| ChunkRecord {
            ordinal,
            id: chunk_id(ordinal),
            text: truncate_to_bytes(&text, max_bytes).to_string(),
            vector,
        })
        .collect())
}

/// Build the configured vector store.
pub fn build_vector_store(
    config: &Config,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    match config.vector_store {
        VectorStoreKind::Qdrant => Ok(Box::new(QdrantStore::new(config)?)),
        VectorStoreKind::Memory => Ok(Box::new(InMemoryStore::new())),
    }
}
