//! Failure notifications for scheduled runs.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::error::{IngestionError, Result};

/// Receives a message when a scheduled run fails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Posts to a Slack incoming webhook.
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

/// Form body understood by Slack incoming webhooks.
fn slack_payload(message: &str) -> String {
    serde_json::json!({ "text": message }).to_string()
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .form(&[("payload", slack_payload(message))])
            .send()
            .await
            .map_err(|e| IngestionError::Notify(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IngestionError::Notify(format!(
                "webhook returned HTTP {}",
                response.status()
            )));
        }

        info!("Sent failure notification");
        Ok(())
    }
}

/// Logs the message instead of sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        error!(notification = %message, "Run failed");
        Ok(())
    }
}

/// `SlackNotifier` when a webhook is configured, otherwise `LogNotifier`.
pub fn notifier_from_webhook(webhook_url: Option<&str>) -> Box<dyn Notifier> {
    match webhook_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => Box::new(SlackNotifier::new(url)),
        None => Box::new(LogNotifier),
    }
}
