//! Outbound webhook notifications.
//!
//! The notifier holds the active webhook target behind a lock scoped to the server instance and
//! delivers each event as a single JSON POST. Delivery is best effort: the outcome is logged and
//! returned, never retried or persisted.

use crate::{config::Config, timestamp::current_timestamp_rfc3339};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;

/// Header carrying the shared secret on every delivery.
pub const SECRET_HEADER: &str = "X-Webhook-Secret";
/// Event types forwarded by [`WebhookNotifier::notify`] unless reconfigured.
pub const DEFAULT_EVENTS: [&str; 3] = ["document_processed", "query_answered", "error"];

const USER_AGENT: &str = concat!("docqa/", env!("CARGO_PKG_VERSION"));
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);
const SECRET_PREVIEW_CHARS: usize = 10;

/// Errors raised while constructing the notifier.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The HTTP client could not be built.
    #[error("Failed to build webhook HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Active webhook configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSettings {
    /// Target URL; deliveries without an override are skipped while unset.
    pub url: Option<String>,
    /// Shared secret sent in [`SECRET_HEADER`].
    pub secret: String,
    /// Event types forwarded by [`WebhookNotifier::notify`].
    pub events: Vec<String>,
}

impl WebhookSettings {
    /// Seed settings from `WEBHOOK_URL` / `WEBHOOK_SECRET`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.webhook_url.clone(),
            secret: config.webhook_secret.clone(),
            events: default_events(),
        }
    }
}

/// Default list of forwarded event types.
pub fn default_events() -> Vec<String> {
    DEFAULT_EVENTS.iter().map(|event| event.to_string()).collect()
}

/// Body of every webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event name such as `document_processed`.
    pub event_type: String,
    /// UTC time the event was created, RFC 3339.
    pub timestamp: String,
    /// Event-specific JSON object.
    pub data: Value,
}

impl WebhookEvent {
    /// Stamp a new event with the current time.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: current_timestamp_rfc3339(),
            data,
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// No target was configured or the event type is filtered out.
    Skipped,
    /// The receiver answered 200.
    Delivered,
    /// Transport failure or any status other than 200.
    Failed,
}

impl DeliveryOutcome {
    /// Whether the receiver acknowledged the event.
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Public view of the webhook configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookStatus {
    /// Configured target, if any.
    pub webhook_url: Option<String>,
    /// First characters of the secret followed by `...`.
    pub webhook_secret: Option<String>,
    /// Whether a target is configured.
    pub configured: bool,
}

/// Sends webhook events to the configured or an explicitly supplied target.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    settings: Arc<RwLock<WebhookSettings>>,
}

impl WebhookNotifier {
    /// Construct a notifier with the given initial settings.
    pub fn new(settings: WebhookSettings) -> Result<Self, WebhookError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            settings: Arc::new(RwLock::new(settings)),
        })
    }

    /// Construct a notifier seeded from configuration.
    pub fn from_config(config: &Config) -> Result<Self, WebhookError> {
        Self::new(WebhookSettings::from_config(config))
    }

    /// Copy of the current settings.
    pub async fn settings(&self) -> WebhookSettings {
        self.settings.read().await.clone()
    }

    /// Point the notifier at `url`, optionally replacing the event list and secret.
    ///
    /// Returns the effective event list.
    pub async fn configure(
        &self,
        url: String,
        events: Option<Vec<String>>,
        secret: Option<String>,
    ) -> Vec<String> {
        let mut guard = self.settings.write().await;
        guard.url = Some(url);
        guard.events = events.unwrap_or_else(default_events);
        if let Some(secret) = secret.filter(|secret| !secret.is_empty()) {
            guard.secret = secret;
        }
        tracing::info!(url = ?guard.url, events = ?guard.events, "Webhook configured");
        guard.events.clone()
    }

    /// Clear the target URL. The secret and event list are kept.
    pub async fn disable(&self) {
        self.settings.write().await.url = None;
        tracing::info!("Webhook disabled");
    }

    /// Report the configuration without exposing the full secret.
    pub async fn status(&self) -> WebhookStatus {
        let guard = self.settings.read().await;
        let webhook_secret = (!guard.secret.is_empty()).then(|| {
            let preview: String = guard.secret.chars().take(SECRET_PREVIEW_CHARS).collect();
            format!("{preview}...")
        });
        WebhookStatus {
            webhook_url: guard.url.clone(),
            webhook_secret,
            configured: guard.url.is_some(),
        }
    }

    /// Deliver a pipeline event, honouring the configured event filter.
    ///
    /// An explicit `override_url` bypasses the filter.
    pub async fn notify(
        &self,
        event_type: &str,
        data: Value,
        override_url: Option<&str>,
    ) -> DeliveryOutcome {
        if override_url.is_none() {
            let guard = self.settings.read().await;
            if !guard.events.iter().any(|event| event == event_type) {
                tracing::debug!(event_type, "Webhook event filtered out");
                return DeliveryOutcome::Skipped;
            }
        }
        self.send(event_type, data, override_url).await
    }

    /// Deliver an event to `override_url`, falling back to the configured target.
    pub async fn send(
        &self,
        event_type: &str,
        data: Value,
        override_url: Option<&str>,
    ) -> DeliveryOutcome {
        let (target, secret) = {
            let guard = self.settings.read().await;
            let target = override_url
                .map(str::to_string)
                .or_else(|| guard.url.clone());
            (target, guard.secret.clone())
        };
        let Some(target) = target else {
            tracing::debug!(event_type, "No webhook target configured; skipping");
            return DeliveryOutcome::Skipped;
        };

        let event = WebhookEvent::new(event_type, data);
        let result = self
            .http
            .post(&target)
            .header(SECRET_HEADER, secret)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::info!(event_type, target = %target, "Webhook delivered");
                DeliveryOutcome::Delivered
            }
            Ok(response) => {
                tracing::warn!(
                    event_type,
                    target = %target,
                    status = %response.status(),
                    "Webhook receiver rejected event"
                );
                DeliveryOutcome::Failed
            }
            Err(error) => {
                tracing::warn!(event_type, target = %target, error = %error, "Webhook delivery failed");
                DeliveryOutcome::Failed
            }
        }
    }
}
