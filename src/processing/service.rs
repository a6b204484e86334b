//! Processing service coordinating extraction, chunking, embedding, retrieval, and completion.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, get_embedding_client},
    llm::{LlmClient, get_llm_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, split_text},
        extract::extract_pdf_text,
        prompt::{DEFAULT_MAX_CHUNKS, format_prompt},
        types::{Answer, IngestOutcome, PipelineError},
    },
    vector_store::{
        DEFAULT_METADATA_MAX_BYTES, VectorStore, build_vector_store, prepare_records,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Tunables applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Window length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub chunk_overlap: usize,
    /// Neighbours requested per question.
    pub top_k: usize,
    /// Retrieved chunks placed into the prompt.
    pub prompt_max_chunks: usize,
    /// Byte budget for stored chunk text.
    pub metadata_max_bytes: usize,
    /// Expected embedding dimension.
    pub embedding_dimension: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: 5,
            prompt_max_chunks: DEFAULT_MAX_CHUNKS,
            metadata_max_bytes: DEFAULT_METADATA_MAX_BYTES,
            embedding_dimension: 384,
        }
    }
}

impl PipelineSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.search_top_k,
            prompt_max_chunks: config.prompt_max_chunks,
            metadata_max_bytes: config.metadata_max_bytes,
            embedding_dimension: config.embedding_dimension,
        }
    }
}

/// Coordinates the full pipeline: PDF text → chunks → embeddings → index, and
/// question → embedding → top-k → prompt → answer.
///
/// The service owns long-lived handles to the embedding client, the vector store, the
/// completion client, and the metrics registry. Construct it once near process start and share
/// it through an `Arc`.
pub struct RagService {
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    vector_store: Box<dyn VectorStore>,
    llm_client: Box<dyn LlmClient>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Extract a PDF and index its text.
    async fn ingest_pdf(&self, bytes: Vec<u8>) -> Result<IngestOutcome, PipelineError>;

    /// Chunk, embed, and index raw text.
    async fn ingest_text(&self, text: &str) -> Result<IngestOutcome, PipelineError>;

    /// Answer a question from the indexed chunks.
    async fn answer(&self, question: &str) -> Result<Answer, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagService {
    /// Assemble a service from already-built collaborators.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        vector_store: Box<dyn VectorStore>,
        llm_client: Box<dyn LlmClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedding_client,
            vector_store,
            llm_client,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build every collaborator from configuration and make sure the index exists.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let embedding_client = get_embedding_client(config)?;
        let vector_store = build_vector_store(config)?;
        let llm_client = get_llm_client(config)?;
        let service = Self::new(
            embedding_client,
            vector_store,
            llm_client,
            PipelineSettings::from_config(config),
        );
        service.ensure_index().await?;
        Ok(service)
    }

    /// Create the index if it is missing.
    pub async fn ensure_index(&self) -> Result<(), PipelineError> {
        let dimension = self.settings.embedding_dimension;
        tracing::debug!(dimension, "Ensuring vector index");
        self.vector_store.ensure_index(dimension).await?;
        tracing::info!(dimension, "Vector index ready");
        Ok(())
    }

    /// Settings this service runs with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Extract a PDF and index its text.
    pub async fn ingest_pdf(&self, bytes: Vec<u8>) -> Result<IngestOutcome, PipelineError> {
        let result: Result<IngestOutcome, PipelineError> = async {
            let text = extract_pdf_text(bytes).await?;
            self.index_text(&text).await
        }
        .await;
        self.track(result)
    }

    /// Chunk, embed, and index raw text.
    pub async fn ingest_text(&self, text: &str) -> Result<IngestOutcome, PipelineError> {
        let result = self.index_text(text).await;
        self.track(result)
    }

    /// Return the texts of the `top_k` chunks most similar to `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>, PipelineError> {
        let vector = self.embed_query(question).await?;
        let hits = self.vector_store.query(vector, self.settings.top_k).await?;
        tracing::debug!(
            top_k = self.settings.top_k,
            hits = hits.len(),
            best_score = hits.first().map(|hit| hit.score),
            "Retrieved chunks"
        );
        Ok(hits.into_iter().map(|hit| hit.text).collect())
    }

    /// Answer a question from the indexed chunks.
    pub async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        let result: Result<Answer, PipelineError> = async {
            if question.trim().is_empty() {
                return Err(PipelineError::InvalidInput("question is empty".into()));
            }
            let relevant_chunks = self.retrieve(question).await?;
            let prompt = format_prompt(question, &relevant_chunks, self.settings.prompt_max_chunks);
            let answer = self.llm_client.complete(&prompt).await?;
            self.metrics.record_answer();
            tracing::info!(chunks = relevant_chunks.len(), "Question answered");
            Ok(Answer {
                answer,
                relevant_chunks,
            })
        }
        .await;
        self.track(result)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn index_text(&self, text: &str) -> Result<IngestOutcome, PipelineError> {
        let chunks = split_text(text, self.settings.chunk_size, self.settings.chunk_overlap)?;
        let chunk_count = chunks.len();
        if chunks.is_empty() {
            tracing::warn!("Document produced no text; nothing to index");
            return Ok(IngestOutcome {
                chunk_count: 0,
                upserted: 0,
            });
        }

        let embeddings = self
            .embedding_client
            .generate_embeddings(chunks.clone())
            .await?;
        for vector in &embeddings {
            self.check_dimension(vector)?;
        }

        let records = prepare_records(chunks, embeddings, self.settings.metadata_max_bytes)?;
        let upserted = self.vector_store.upsert(records).await?;

        self.metrics.record_document(upserted as u64);
        tracing::info!(
            chunks = chunk_count,
            upserted,
            chunk_size = self.settings.chunk_size,
            overlap = self.settings.chunk_overlap,
            "Document indexed"
        );

        Ok(IngestOutcome {
            chunk_count,
            upserted,
        })
    }

    async fn embed_query(&self, question: &str) -> Result<Vec<f32>, PipelineError> {
        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or_else(|| {
            PipelineError::InvalidInput("embedding provider returned no vector".into())
        })?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), PipelineError> {
        let expected = self.settings.embedding_dimension;
        let actual = vector.len();
        if actual == expected {
            Ok(())
        } else {
            Err(PipelineError::DimensionMismatch { expected, actual })
        }
    }

    fn track<T>(&self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(error) = &result {
            self.metrics.record_failure();
            tracing::warn!(error = %error, kind = ?error.kind(), "Pipeline step failed");
        }
        result
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_pdf(&self, bytes: Vec<u8>) -> Result<IngestOutcome, PipelineError> {
        RagService::ingest_pdf(self, bytes).await
    }

    async fn ingest_text(&self, text: &str) -> Result<IngestOutcome, PipelineError> {
        RagService::ingest_text(self, text).await
    }

    async fn answer(&self, question: &str) -> Result<Answer, PipelineError> {
        RagService::answer(self, question).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::{EmbeddingClientError, HashEmbeddingClient},
        llm::LlmError,
        processing::{extract::COVERAGE_PDF, types::ErrorKind},
        vector_store::InMemoryStore,
    };
    use tokio::sync::Mutex;

    const VOCABULARY: [&str; 6] = ["coverage", "dental", "$500", "vision", "excluded", "waiting"];

    /// Counts vocabulary words, so related texts land close together.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingClient for KeywordEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let lowered = text.to_lowercase();
                    VOCABULARY
                        .iter()
                        .map(|word| lowered.matches(word).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
        failure: Option<fn() -> LlmError>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().await.push(prompt.to_string());
            match self.failure {
                Some(make_error) => Err(make_error()),
                None => Ok("{\"decision\": \"Approved\", \"amount\": \"$500\"}".into()),
            }
        }
    }

    fn settings(dimension: usize) -> PipelineSettings {
        PipelineSettings {
            embedding_dimension: dimension,
            ..PipelineSettings::default()
        }
    }

    fn pad(sentence: &str, width: usize) -> String {
        format!("{sentence:<width$}")
    }

    #[tokio::test]
    async fn answer_retrieves_matching_chunk_and_builds_prompt() {
        let llm = Arc::new(RecordingLlm::default());
        let service = RagService::new(
            Box::new(KeywordEmbedder),
            Box::new(InMemoryStore::new()),
            Box::new(SharedLlm(llm.clone())),
            PipelineSettings {
                chunk_size: 40,
                chunk_overlap: 0,
                ..settings(VOCABULARY.len())
            },
        );
        service.ensure_index().await.expect("index");

        let document = [
            pad("Vision exams are excluded.", 40),
            pad("Coverage is $500 for dental.", 40),
            pad("A waiting period applies.", 40),
        ]
        .concat();
        let outcome = service.ingest_text(&document).await.expect("ingest");
        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(outcome.upserted, 3);

        let answer = service
            .answer("What is the dental coverage?")
            .await
            .expect("answer");

        assert!(answer.relevant_chunks[0].starts_with("Coverage is $500 for dental."));
        assert!(answer.answer.contains("Approved"));

        let prompts = llm.prompts.lock().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Coverage is $500 for dental."));
        assert!(prompts[0].contains("What is the dental coverage?"));

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_indexed, 1);
        assert_eq!(snapshot.chunks_indexed, 3);
        assert_eq!(snapshot.questions_answered, 1);
    }

    #[tokio::test]
    async fn single_chunk_document_round_trips_through_hash_embeddings() {
        let llm = Arc::new(RecordingLlm::default());
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(64)),
            Box::new(InMemoryStore::new()),
            Box::new(SharedLlm(llm.clone())),
            settings(64),
        );

        service
            .ingest_text("Coverage is $500 for dental.\n")
            .await
            .expect("ingest");
        let chunks = service
            .retrieve("What is the dental coverage?")
            .await
            .expect("retrieve");

        assert_eq!(chunks, vec!["Coverage is $500 for dental.\n".to_string()]);
    }

    #[tokio::test]
    async fn from_config_builds_offline_pipeline() {
        let service = RagService::from_config(&crate::config::test_config())
            .await
            .expect("service");
        assert_eq!(service.settings().embedding_dimension, 64);
        assert_eq!(service.settings().top_k, 5);

        let outcome = service
            .ingest_text("Coverage is $500 for dental.")
            .await
            .expect("ingest");
        assert_eq!(outcome.upserted, 1);
    }

    #[tokio::test]
    async fn llm_failures_propagate_as_typed_errors() {
        let llm = Arc::new(RecordingLlm {
            failure: Some(|| LlmError::Authentication("401 Unauthorized".into())),
            ..RecordingLlm::default()
        });
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(16)),
            Box::new(InMemoryStore::new()),
            Box::new(SharedLlm(llm)),
            settings(16),
        );
        service.ingest_text("Some policy text").await.expect("ingest");

        let error = service.answer("Is it covered?").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Authentication);
        assert_eq!(service.metrics_snapshot().failures, 1);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected_before_upsert() {
        let store = Arc::new(InMemoryStore::new());
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(8)),
            Box::new(SharedStore(store.clone())),
            Box::new(RecordingLlm::default()),
            settings(16),
        );

        let error = service.ingest_text("text").await.unwrap_err();
        assert!(matches!(
            error,
            PipelineError::DimensionMismatch {
                expected: 16,
                actual: 8
            }
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn empty_document_indexes_nothing() {
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(16)),
            Box::new(InMemoryStore::new()),
            Box::new(RecordingLlm::default()),
            settings(16),
        );
        let outcome = service.ingest_text("").await.expect("ingest");
        assert_eq!(outcome.chunk_count, 0);
        assert_eq!(service.metrics_snapshot().documents_indexed, 0);
    }

    #[tokio::test]
    async fn blank_question_is_invalid_input() {
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(16)),
            Box::new(InMemoryStore::new()),
            Box::new(RecordingLlm::default()),
            settings(16),
        );
        let error = service.answer("   ").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn invalid_pdf_is_reported_as_extraction_failure() {
        let service = RagService::new(
            Box::new(HashEmbeddingClient::new(16)),
            Box::new(InMemoryStore::new()),
            Box::new(RecordingLlm::default()),
            settings(16),
        );
        let error = service
            .ingest_pdf(b"not a pdf".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::Extraction(_)));
    }

    #[tokio::test]
    async fn ingested_pdf_answers_question_about_its_text() {
        let llm = Arc::new(RecordingLlm::default());
        let service = RagService::new(
            Box::new(KeywordEmbedder),
            Box::new(InMemoryStore::new()),
            Box::new(SharedLlm(llm.clone())),
            settings(VOCABULARY.len()),
        );
        service.ensure_index().await.expect("index");

        let outcome = service
            .ingest_pdf(COVERAGE_PDF.to_vec())
            .await
            .expect("ingest pdf");
        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(outcome.upserted, 1);

        let answer = service
            .answer("What is the dental coverage?")
            .await
            .expect("answer");
        assert_eq!(answer.relevant_chunks.len(), 1);
        assert!(answer.relevant_chunks[0].contains("Coverage is $500 for dental."));

        let prompts = llm.prompts.lock().await;
        assert!(prompts[0].contains("Coverage is $500 for dental."));
    }

    struct SharedLlm(Arc<RecordingLlm>);

    #[async_trait]
    impl LlmClient for SharedLlm {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.0.complete(prompt).await
        }
    }

    struct SharedStore(Arc<InMemoryStore>);

    #[async_trait]
    impl VectorStore for SharedStore {
        async fn ensure_index(
            &self,
            dimension: usize,
        ) -> Result<(), crate::vector_store::VectorStoreError> {
            self.0.ensure_index(dimension).await
        }

        async fn upsert(
            &self,
            records: Vec<crate::vector_store::ChunkRecord>,
        ) -> Result<usize, crate::vector_store::VectorStoreError> {
            self.0.upsert(records).await
        }

        async fn query(
            &self,
            vector: Vec<f32>,
            top_k: usize,
        ) -> Result<Vec<crate::vector_store::ScoredChunk>, crate::vector_store::VectorStoreError>
        {
            self.0.query(vector, top_k).await
        }
    }
}
