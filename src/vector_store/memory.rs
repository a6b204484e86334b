//! Process-local vector index.

use crate::vector_store::{
    VectorStore,
    types::{ChunkRecord, ScoredChunk, VectorStoreError},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Brute-force cosine index owned by the server instance.
///
/// Entries are keyed by chunk ordinal exactly like the hosted index, so a second document
/// overwrites the first at colliding ordinals.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<InMemoryIndex>,
}

#[derive(Default)]
struct InMemoryIndex {
    dimension: Option<usize>,
    entries: BTreeMap<usize, ChunkRecord>,
}

impl InMemoryStore {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the index holds no chunks.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError> {
        let mut guard = self.inner.write().await;
        if guard.dimension.is_none() {
            guard.dimension = Some(dimension);
            tracing::debug!(dimension, "In-memory index ready");
        }
        Ok(())
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize, VectorStoreError> {
        let mut guard = self.inner.write().await;
        if let Some(expected) = guard.dimension
            && let Some(record) = records.iter().find(|record| record.vector.len() != expected)
        {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: record.vector.len(),
            });
        }

        let count = records.len();
        for record in records {
            guard.entries.insert(record.ordinal, record);
        }
        tracing::debug!(points = count, total = guard.entries.len(), "Points upserted");
        Ok(count)
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let guard = self.inner.read().await;
        if let Some(expected) = guard.dimension
            && vector.len() != expected
        {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = guard
            .entries
            .values()
            .map(|record| ScoredChunk {
                id: record.id.clone(),
                score: cosine_similarity(&vector, &record.vector),
                text: record.text.clone(),
            })
            .collect();
        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Cosine similarity of two vectors; zero when either is empty, zero-length, or mismatched.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm_left = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let norm_right = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }

    dot / (norm_left * norm_right)
}
