//! Core data types and error definitions for the processing pipeline.

use crate::{
    embedding::EmbeddingClientError, llm::LlmError, processing::extract::ExtractionError,
    vector_store::VectorStoreError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while splitting text into windows.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Windows must hold at least one character.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// The stride `chunk_size - overlap` must be positive.
    #[error("overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Requested overlap.
        overlap: usize,
        /// Requested window length.
        chunk_size: usize,
    },
}

/// Errors emitted by the question-answering pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller supplied something the pipeline cannot use.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// PDF text extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension configured on the server.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
    /// The vector index rejected a write or query.
    #[error("Vector store request failed: {0}")]
    VectorStore(#[from] VectorStoreError),
    /// The completion provider failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Coarse classification of a [`PipelineError`] for programmatic branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad document or question.
    InvalidInput,
    /// A collaborator could not be reached.
    Transport,
    /// A collaborator rejected our credentials.
    Authentication,
    /// A collaborator answered with an error or an unusable payload.
    Upstream,
}

impl PipelineError {
    /// Classify the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Extraction(_) | Self::Chunking(_) => {
                ErrorKind::InvalidInput
            }
            Self::Embedding(EmbeddingClientError::Transport(_))
            | Self::VectorStore(VectorStoreError::Http(_))
            | Self::Llm(LlmError::Transport(_)) => ErrorKind::Transport,
            Self::Embedding(EmbeddingClientError::Authentication(_))
            | Self::Llm(LlmError::Authentication(_)) => ErrorKind::Authentication,
            Self::VectorStore(error) if error.is_authentication() => ErrorKind::Authentication,
            Self::Embedding(_) | Self::DimensionMismatch { .. } | Self::VectorStore(_) | Self::Llm(_) => {
                ErrorKind::Upstream
            }
        }
    }
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Number of windows produced for the document.
    pub chunk_count: usize,
    /// Number of records written to the index.
    pub upserted: usize,
}

/// Answer to one question, with the chunks it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Raw model output.
    pub answer: String,
    /// Retrieved chunk texts, most similar first.
    pub relevant_chunks: Vec<String>,
}
