//! Best-effort outbound event notification.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

/// Event names dispatched by the worker.
pub mod event {
    pub const DUPLICATE_MERGED: &str = "duplicate.merged";
    pub const DUPLICATE_DETECTED: &str = "duplicate.detected";
    pub const JOB_COMPLETED: &str = "job.completed";
}

/// Fire-and-forget event sink. Implementations must swallow their own
/// failures; dispatching never affects the job outcome.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn dispatch_event(&self, event: &str, payload: serde_json::Value);
}

/// Posts events to a configured webhook as
/// `{event, timestamp, payload}`.
pub struct WebhookDispatcher {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EventDispatcher for WebhookDispatcher {
    async fn dispatch_event(&self, event: &str, payload: serde_json::Value) {
        let body = serde_json::json!({
            "event": event,
            "timestamp": Utc::now(),
            "payload": payload,
        });

        match self.http.post(&self.webhook_url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(event, "Dispatched webhook event");
            }
            Ok(resp) => {
                warn!(event, status = %resp.status(), "Webhook returned non-success");
            }
            Err(e) => {
                warn!(event, error = %e, "Failed to dispatch webhook event");
            }
        }
    }
}

/// Sink used when no webhook is configured.
pub struct NullDispatcher;

#[async_trait]
impl EventDispatcher for NullDispatcher {
    async fn dispatch_event(&self, event: &str, _payload: serde_json::Value) {
        debug!(event, "Event dropped (no webhook configured)");
    }
}
