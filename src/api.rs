//! HTTP surface for docqa.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /` – Liveness message and endpoint catalog.
//! - `POST /process/` – Multipart upload (`query`, `file`): index the PDF and answer the query.
//!   Failures are reported as `200 {"error": ...}`.
//! - `POST /api/v1/hackrx/run` – Bearer-protected batch: download a PDF by URL, index it, and
//!   answer every question in order.
//! - `POST /webhook/configure`, `GET /webhook/status`, `DELETE /webhook/disable`,
//!   `POST /webhook/trigger` – Manage and exercise outbound webhooks.
//! - `GET /metrics` – Pipeline counters.
//!
//! Pipeline events (`document_processed`, `query_answered`, `error`) are delivered through the
//! shared [`WebhookNotifier`] before the response is returned.

use crate::{
    metrics::MetricsSnapshot,
    processing::{PipelineError, RagApi},
    webhook::{WebhookNotifier, WebhookStatus},
};
use axum::{
    Json, Router,
    extract::{Multipart, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState<S> {
    rag: Arc<S>,
    webhooks: WebhookNotifier,
    downloader: Client,
    api_token: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            rag: Arc::clone(&self.rag),
            webhooks: self.webhooks.clone(),
            downloader: self.downloader.clone(),
            api_token: Arc::clone(&self.api_token),
        }
    }
}

impl<S> AppState<S> {
    /// Bundle the pipeline, the webhook notifier, and the bearer token for the router.
    pub fn new(
        rag: Arc<S>,
        webhooks: WebhookNotifier,
        api_token: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let downloader = Client::builder()
            .user_agent(concat!("docqa/", env!("CARGO_PKG_VERSION")))
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            rag,
            webhooks,
            downloader,
            api_token: Arc::from(api_token.into()),
        })
    }
}

/// Build the HTTP router exposing the question-answering API surface.
pub fn create_router<S>(state: AppState<S>) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/process/", post(process_upload::<S>))
        .route("/api/v1/hackrx/run", post(run_batch::<S>))
        .route("/webhook/configure", post(configure_webhook::<S>))
        .route("/webhook/status", get(webhook_status::<S>))
        .route("/webhook/disable", delete(disable_webhook::<S>))
        .route("/webhook/trigger", post(trigger_webhook::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(axum::extract::DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "PDF question-answering service is running",
        "endpoints": {
            "POST /process/": "Upload a PDF with a query and receive an answer",
            "POST /api/v1/hackrx/run": "Answer questions about a PDF fetched by URL (bearer token required)",
            "POST /webhook/configure": "Configure the webhook target and events",
            "GET /webhook/status": "Show the webhook configuration",
            "DELETE /webhook/disable": "Disable webhook notifications",
            "POST /webhook/trigger": "Send a webhook event manually",
            "GET /metrics": "Pipeline counters",
        }
    }))
}

/// Success body for `POST /process/`.
#[derive(Serialize)]
struct ProcessResponse {
    query: String,
    answer: String,
    relevant_clauses: Vec<String>,
    file_name: Option<String>,
    file_size: usize,
}

struct Upload {
    query: Option<String>,
    file_name: Option<String>,
    bytes: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, String> {
    let mut upload = Upload {
        query: None,
        file_name: None,
        bytes: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| error.to_string())?
    {
        match field.name() {
            Some("query") => {
                upload.query = Some(field.text().await.map_err(|error| error.to_string())?);
            }
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|error| error.to_string())?;
                upload.bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    Ok(upload)
}

/// Index an uploaded PDF and answer one query about it.
async fn process_upload<S>(State(state): State<AppState<S>>, multipart: Multipart) -> Response
where
    S: RagApi,
{
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(error) => return report_upload_error(&state, error, None).await,
    };
    let file_name = upload.file_name.clone();
    let (Some(query), Some(bytes)) = (upload.query, upload.bytes) else {
        let error = "multipart form requires `query` and `file` fields".to_string();
        return report_upload_error(&state, error, file_name).await;
    };

    let file_size = bytes.len();
    let result: Result<_, PipelineError> = async {
        state.rag.ingest_pdf(bytes).await?;
        state.rag.answer(&query).await
    }
    .await;

    match result {
        Ok(answer) => {
            state
                .webhooks
                .notify(
                    "document_processed",
                    json!({
                        "file_name": file_name,
                        "file_size": file_size,
                        "query": query,
                        "answer": answer.answer,
                    }),
                    None,
                )
                .await;
            tracing::info!(file_name = ?file_name, file_size, "Upload processed");
            Json(ProcessResponse {
                query,
                answer: answer.answer,
                relevant_clauses: answer.relevant_chunks,
                file_name,
                file_size,
            })
            .into_response()
        }
        Err(error) => report_upload_error(&state, error.to_string(), file_name).await,
    }
}

async fn report_upload_error<S>(
    state: &AppState<S>,
    error: String,
    file_name: Option<String>,
) -> Response
where
    S: RagApi,
{
    tracing::warn!(error = %error, file_name = ?file_name, "Upload processing failed");
    state
        .webhooks
        .notify(
            "error",
            json!({
                "error": error,
                "file_name": file_name.unwrap_or_else(|| "unknown".into()),
            }),
            None,
        )
        .await;
    Json(json!({ "error": error })).into_response()
}

/// Request body for `POST /api/v1/hackrx/run`.
#[derive(Deserialize)]
struct BatchRequest {
    /// URL of the PDF to answer questions about.
    documents: String,
    /// Questions answered in order.
    questions: Vec<String>,
    /// Optional per-request webhook target.
    #[serde(default)]
    webhook_url: Option<String>,
}

/// Success body for `POST /api/v1/hackrx/run`.
#[derive(Serialize)]
struct BatchResponse {
    answers: Vec<String>,
}

/// Download a PDF, index it, and answer each question.
///
/// The bearer token is checked before the body is inspected, so unauthorized callers never
/// reach the pipeline.
async fn run_batch<S>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError>
where
    S: RagApi,
{
    authorize(&headers, &state.api_token)?;
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let override_url = request.webhook_url.as_deref();

    match answer_batch(&state, &request).await {
        Ok(answers) => {
            state
                .webhooks
                .notify(
                    "document_processed",
                    json!({
                        "document_url": request.documents,
                        "questions_count": request.questions.len(),
                        "answers": answers,
                    }),
                    override_url,
                )
                .await;
            tracing::info!(
                document_url = %request.documents,
                questions = request.questions.len(),
                "Batch answered"
            );
            Ok(Json(BatchResponse { answers }))
        }
        Err(error) => {
            tracing::warn!(document_url = %request.documents, error = %error, "Batch failed");
            state
                .webhooks
                .notify(
                    "error",
                    json!({
                        "error": error.to_string(),
                        "document_url": request.documents,
                        "questions": request.questions,
                    }),
                    override_url,
                )
                .await;
            Err(error)
        }
    }
}

async fn answer_batch<S>(state: &AppState<S>, request: &BatchRequest) -> Result<Vec<String>, AppError>
where
    S: RagApi,
{
    let bytes = download_document(&state.downloader, &request.documents).await?;
    state.rag.ingest_pdf(bytes).await?;

    let mut answers = Vec::with_capacity(request.questions.len());
    for (question_index, question) in request.questions.iter().enumerate() {
        let answer = state.rag.answer(question).await?.answer;
        state
            .webhooks
            .notify(
                "query_answered",
                json!({
                    "question_index": question_index,
                    "question": question,
                    "answer": answer,
                    "document_url": request.documents,
                }),
                request.webhook_url.as_deref(),
            )
            .await;
        answers.push(answer);
    }
    Ok(answers)
}

async fn download_document(client: &Client, url: &str) -> Result<Vec<u8>, AppError> {
    let response = client.get(url).send().await.map_err(|error| {
        tracing::warn!(url, error = %error, "Document download failed");
        AppError::DownloadFailed
    })?;
    if response.status() != StatusCode::OK {
        tracing::warn!(url, status = %response.status(), "Document download rejected");
        return Err(AppError::DownloadFailed);
    }
    let bytes = response.bytes().await.map_err(|error| {
        tracing::warn!(url, error = %error, "Document body could not be read");
        AppError::DownloadFailed
    })?;
    tracing::debug!(url, bytes = bytes.len(), "Document downloaded");
    Ok(bytes.to_vec())
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(char::is_whitespace))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim());
    match token {
        Some(token) if !expected.is_empty() && token == expected => Ok(()),
        _ => {
            tracing::warn!("Rejected request with missing or invalid bearer token");
            Err(AppError::Unauthorized)
        }
    }
}

/// Request body for `POST /webhook/configure`.
#[derive(Deserialize)]
struct ConfigureRequest {
    url: String,
    #[serde(default)]
    events: Option<Vec<String>>,
    #[serde(default)]
    secret: Option<String>,
}

/// Point webhooks at a new target and send it a `webhook_configured` test event.
async fn configure_webhook<S>(
    State(state): State<AppState<S>>,
    Json(request): Json<ConfigureRequest>,
) -> Json<Value>
where
    S: RagApi,
{
    let events = state
        .webhooks
        .configure(request.url.clone(), request.events, request.secret)
        .await;
    let outcome = state
        .webhooks
        .send(
            "webhook_configured",
            json!({ "url": request.url, "events": events }),
            None,
        )
        .await;
    Json(json!({
        "status": "configured",
        "webhook_url": request.url,
        "events": events,
        "test_success": outcome.is_delivered(),
    }))
}

async fn webhook_status<S>(State(state): State<AppState<S>>) -> Json<WebhookStatus>
where
    S: RagApi,
{
    Json(state.webhooks.status().await)
}

async fn disable_webhook<S>(State(state): State<AppState<S>>) -> Json<Value>
where
    S: RagApi,
{
    state.webhooks.disable().await;
    Json(json!({ "status": "webhook_disabled" }))
}

/// Body of `POST /webhook/trigger`.
#[derive(Deserialize)]
struct TriggerRequest {
    event_type: String,
    #[serde(default)]
    data: Value,
}

/// Query string of `POST /webhook/trigger`.
#[derive(Deserialize)]
struct TriggerQuery {
    #[serde(default)]
    webhook_url: Option<String>,
}

/// Send an arbitrary event, bypassing the event filter.
async fn trigger_webhook<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<TriggerQuery>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<Value>, AppError>
where
    S: RagApi,
{
    let data = match request.data {
        Value::Null => json!({}),
        data @ Value::Object(_) => data,
        _ => {
            return Err(AppError::BadRequest(
                "`data` must be a JSON object".to_string(),
            ));
        }
    };
    let outcome = state
        .webhooks
        .send(&request.event_type, data, query.webhook_url.as_deref())
        .await;
    let webhook_url = match query.webhook_url {
        Some(url) => Some(url),
        None => state.webhooks.settings().await.url,
    };
    Ok(Json(json!({
        "event_type": request.event_type,
        "sent": outcome.is_delivered(),
        "webhook_url": webhook_url,
    })))
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(state.rag.metrics_snapshot())
}

enum AppError {
    Unauthorized,
    DownloadFailed,
    BadRequest(String),
    Pipeline(PipelineError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("Unauthorized"),
            Self::DownloadFailed => f.write_str("Failed to download PDF"),
            Self::BadRequest(detail) => f.write_str(detail),
            Self::Pipeline(error) => write!(f, "{error}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        match self {
            Self::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
            }
            Self::DownloadFailed => {
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": detail }))).into_response()
            }
            Self::BadRequest(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail })))
                    .into_response()
            }
            Self::Pipeline(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail, "kind": error.kind() })),
            )
                .into_response(),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}
