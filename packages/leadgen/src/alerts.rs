//! Templated failure alerting.

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

/// Context rendered into a failure alert.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub job_id: Uuid,
    pub source: String,
    pub city: String,
    pub industry: String,
    pub error: String,
    pub duration_seconds: f64,
    pub environment: String,
    pub auto_merged_duplicates: i64,
    pub duplicate_candidates_created: i64,
}

impl AlertContext {
    /// Stable key the alerting backend uses to collapse repeats of the
    /// same job failure within one environment.
    pub fn dedup_key(&self) -> String {
        format!("{}:job:{}", self.environment, self.job_id)
    }
}

/// Alert sink. Send failures are logged by the caller, never raised.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn send_templated_alert(&self, template: &str, context: &AlertContext) -> Result<()>;
}

/// Posts rendered alerts to an incoming-webhook URL.
pub struct WebhookAlerter {
    webhook_url: String,
    http: reqwest::Client,
}

impl WebhookAlerter {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    fn render(template: &str, context: &AlertContext) -> String {
        match template {
            "scraping_job_failed" => format!(
                ":rotating_light: *Scraping job failed — {}*\n\
                 *Job:* `{}`\n\
                 *Source:* {}\n\
                 *City/Industry:* {} / {}\n\
                 *Duration:* {:.1}s\n\
                 *Dedup:* {} merged, {} candidates\n\n\
                 {}",
                context.environment,
                context.job_id,
                context.source,
                context.city,
                context.industry,
                context.duration_seconds,
                context.auto_merged_duplicates,
                context.duplicate_candidates_created,
                context.error,
            ),
            other => format!("[{}] job {}: {}", other, context.job_id, context.error),
        }
    }
}

#[async_trait]
impl Alerter for WebhookAlerter {
    async fn send_templated_alert(&self, template: &str, context: &AlertContext) -> Result<()> {
        let payload = serde_json::json!({
            "text": Self::render(template, context),
            "dedup_key": context.dedup_key(),
            "unfurl_links": false,
        });

        let resp = self.http.post(&self.webhook_url).json(&payload).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Alert webhook returned non-success");
            anyhow::bail!("alert webhook returned {status}");
        }

        Ok(())
    }
}

/// Alerter used when alerting is not configured.
pub struct NoopAlerter;

#[async_trait]
impl Alerter for NoopAlerter {
    async fn send_templated_alert(&self, _template: &str, _context: &AlertContext) -> Result<()> {
        Ok(())
    }
}
