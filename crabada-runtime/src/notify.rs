//! Operator notifications.
//!
//! The dispatchers report successes, reverts and skips through a
//! [`Notifier`]. Delivery is best effort: a failing notifier is logged and
//! never aborts a run.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::error::BotError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), BotError>;
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), BotError> {
        tracing::info!(target: "crabada::notify", "{message}");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to a chat webhook (Slack, Discord-compatible, ...).
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<(), BotError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { text: message })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BotError::NotificationFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BotError::NotificationFailed(format!(
                "webhook answered {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Send and swallow failures.
pub async fn notify(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.send(message).await {
        tracing::warn!("notification not delivered: {e}");
    }
}
