//! HTTP client wrapper for a Qdrant collection.

use crate::{config::Config, timestamp::current_timestamp_rfc3339};
use crate::vector_store::{
    VectorStore,
    payload::build_payload,
    types::{
        ChunkRecord, QueryResponse, QueryResponseResult, ScoredChunk, VectorStoreError,
    },
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const QDRANT_TIMEOUT: Duration = Duration::from_secs(30);

/// Vector store backed by a single Qdrant collection.
///
/// Points are keyed by the chunk ordinal, so upserting a new document overwrites whatever was
/// stored at the same ordinals before.
pub struct QdrantStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
}

impl QdrantStore {
    /// Construct a new client using the supplied configuration.
    pub fn new(config: &Config) -> Result<Self, VectorStoreError> {
        let client = Client::builder()
            .user_agent("docqa/0.1")
            .timeout(QDRANT_TIMEOUT)
            .build()?;

        let base_url =
            normalize_base_url(&config.qdrant_url).map_err(VectorStoreError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.qdrant_collection_name,
            has_api_key = config
                .qdrant_api_key
                .as_deref()
                .is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
        })
    }

    /// Create or update the collection with the specified vector size and cosine distance.
    pub async fn create_collection(&self, vector_size: usize) -> Result<(), VectorStoreError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(collection = %self.collection, vector_size, "Collection created");
        })
        .await
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorStoreError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorStoreError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_index(&self, dimension: usize) -> Result<(), VectorStoreError> {
        if self.collection_exists().await? {
            tracing::debug!(collection = %self.collection, "Collection already present");
            return Ok(());
        }
        tracing::debug!(collection = %self.collection, dimension, "Creating collection");
        self.create_collection(dimension).await
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<usize, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let indexed_at = current_timestamp_rfc3339();
        let points: Vec<Value> = records
            .into_iter()
            .map(|record| {
                json!({
                    "id": record.ordinal,
                    "vector": record.vector,
                    "payload": build_payload(&record.id, &record.text, &indexed_at),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let body = json!({
            "query": vector,
            "limit": top_k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorStoreError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|error| VectorStoreError::InvalidResponse(error.to_string()))?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let hits = points
            .into_iter()
            .filter_map(|point| {
                let mut payload = point.payload?;
                let text = match payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => return None,
                };
                let id = match payload.remove("chunk_id") {
                    Some(Value::String(id)) => id,
                    _ => stringify_point_id(point.id),
                };
                Some(ScoredChunk {
                    id,
                    score: point.score,
                    text,
                })
            })
            .collect();

        Ok(hits)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => format!("chunk-{number}"),
        other => other.to_string(),
    }
}
