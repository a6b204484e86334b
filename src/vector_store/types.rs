//! Shared types used by the vector store backends.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while talking to a vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The index responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the index.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The index answered successfully but the body could not be decoded.
    #[error("Malformed vector store response: {0}")]
    InvalidResponse(String),
    /// A vector did not match the dimension the index was created with.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Chunk and embedding counts differ.
    #[error("Received {vectors} embeddings for {chunks} chunks")]
    CountMismatch {
        /// Number of chunk texts.
        chunks: usize,
        /// Number of embedding vectors.
        vectors: usize,
    },
}

impl VectorStoreError {
    /// Whether the index rejected our credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// One chunk ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Position of the chunk within its document.
    pub ordinal: usize,
    /// Ordinal identifier (`chunk-{ordinal}`).
    pub id: String,
    /// Chunk text, already truncated to the metadata budget.
    pub text: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
}

/// Stored chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Identifier the chunk was stored under.
    pub id: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
    /// Stored chunk text.
    pub text: String,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
