//! Companion receiver that records incoming webhook deliveries for inspection.

use crate::{timestamp::current_timestamp_rfc3339, webhook::SECRET_HEADER};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Port the receiver listens on unless told otherwise.
pub const DEFAULT_RECEIVER_PORT: u16 = 8001;

/// In-memory list of received webhook bodies, oldest first.
#[derive(Clone, Default)]
pub struct WebhookLog {
    entries: Arc<RwLock<Vec<Value>>>,
}

impl WebhookLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body, stamping it with `received_at`. Returns the stored value.
    pub async fn record(&self, mut body: Value) -> Value {
        if let Value::Object(map) = &mut body {
            map.insert("received_at".into(), Value::String(current_timestamp_rfc3339()));
        } else {
            body = json!({ "body": body, "received_at": current_timestamp_rfc3339() });
        }
        self.entries.write().await.push(body.clone());
        body
    }

    /// Snapshot of every stored body.
    pub async fn entries(&self) -> Vec<Value> {
        self.entries.read().await.clone()
    }

    /// Drop every stored body.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[derive(Clone)]
struct ReceiverState {
    log: WebhookLog,
    secret: Option<String>,
}

/// Build the receiver router. With `secret` set, deliveries carrying a different
/// `X-Webhook-Secret` are rejected with 401.
pub fn create_receiver_router(log: WebhookLog, secret: Option<String>) -> Router {
    Router::new()
        .route("/", get(describe))
        .route("/webhook", post(receive))
        .route("/webhooks", get(list))
        .route("/webhooks/clear", delete(clear))
        .with_state(ReceiverState { log, secret })
}

async fn describe() -> Json<Value> {
    Json(json!({
        "message": "Webhook receiver is running",
        "endpoints": {
            "POST /webhook": "Receive webhook notifications",
            "GET /webhooks": "View all received webhooks",
            "DELETE /webhooks/clear": "Clear webhook history",
        }
    }))
}

async fn receive(
    State(state): State<ReceiverState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(expected) = state.secret.as_deref() {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!("Rejected webhook with mismatched secret");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Invalid webhook secret" })),
            )
                .into_response();
        }
    }

    let stored = state.log.record(body).await;
    let event_type = stored.get("event_type").cloned().unwrap_or(Value::Null);
    tracing::info!(event_type = %event_type, "Webhook received");
    tracing::debug!(body = %stored, "Webhook body");
    Json(json!({ "status": "received", "event_type": event_type })).into_response()
}

async fn list(State(state): State<ReceiverState>) -> Json<Value> {
    let webhooks = state.log.entries().await;
    Json(json!({ "count": webhooks.len(), "webhooks": webhooks }))
}

async fn clear(State(state): State<ReceiverState>) -> Json<Value> {
    state.log.clear().await;
    tracing::info!("Webhook history cleared");
    Json(json!({ "status": "cleared", "count": 0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request},
    };
    use tower::ServiceExt;

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn post_webhook(body: Value, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn get_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn stores_listed_and_clears_webhooks() {
        let log = WebhookLog::new();
        let app = create_receiver_router(log.clone(), None);

        let (status, json) = call(
            &app,
            post_webhook(
                json!({"event_type": "document_processed", "data": {"answers": []}}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "received");
        assert_eq!(json["event_type"], "document_processed");

        let (_, json) = call(&app, get_request(Method::GET, "/webhooks")).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["webhooks"][0]["event_type"], "document_processed");
        assert!(json["webhooks"][0]["received_at"].is_string());

        let (_, json) = call(&app, get_request(Method::DELETE, "/webhooks/clear")).await;
        assert_eq!(json, json!({"status": "cleared", "count": 0}));
        assert!(log.entries().await.is_empty());
    }

    #[tokio::test]
    async fn mismatched_secret_is_rejected() {
        let log = WebhookLog::new();
        let app = create_receiver_router(log.clone(), Some("shared".into()));

        let (status, _) = call(&app, post_webhook(json!({"event_type": "error"}), Some("nope"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, post_webhook(json!({"event_type": "error"}), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(log.entries().await.is_empty());

        let (status, _) =
            call(&app, post_webhook(json!({"event_type": "error"}), Some("shared"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn root_describes_endpoints() {
        let app = create_receiver_router(WebhookLog::new(), None);
        let (status, json) = call(&app, get_request(Method::GET, "/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["endpoints"]["POST /webhook"].is_string());
    }
}
